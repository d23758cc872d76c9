// Interactive client input: command table and line resolution

use anyhow::Result;
use std::collections::HashMap;

/// What a resolved input line asks the client to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Leave the relay
    Exit,
    /// Post the line into the room
    Echo,
}

/// Mapping from command word to [`OpCode`], built once at startup
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: HashMap<String, OpCode>,
}

impl CommandTable {
    /// Create a table with no commands
    pub fn empty() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Register a command word; a word can only be registered once
    pub fn register(&mut self, word: &str, op: OpCode) -> Result<()> {
        if self.commands.contains_key(word) {
            anyhow::bail!("Command already registered: {}", word);
        }
        self.commands.insert(word.to_string(), op);
        Ok(())
    }

    /// Look up a single command word
    pub fn find(&self, word: &str) -> Option<OpCode> {
        self.commands.get(word).copied()
    }

    /// Resolve an input line by its last whitespace-delimited word.
    ///
    /// Returns the words before the command together with the command, or
    /// `None` when the last word is not a registered command.
    pub fn resolve<'a>(&self, line: &'a str) -> Option<(Vec<&'a str>, OpCode)> {
        let mut words: Vec<&str> = line.split_whitespace().collect();
        let word = words.pop()?;
        let op = self.find(word)?;
        Some((words, op))
    }
}

impl Default for CommandTable {
    /// `끝` / `exit` leave, `말` / `say` post
    fn default() -> Self {
        let mut commands = HashMap::new();
        commands.insert("끝".to_string(), OpCode::Exit);
        commands.insert("exit".to_string(), OpCode::Exit);
        commands.insert("말".to_string(), OpCode::Echo);
        commands.insert("say".to_string(), OpCode::Echo);
        Self { commands }
    }
}
