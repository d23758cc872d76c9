// Command handlers for the relay CLI

use crate::relay::cli::RelayCommand;
use crate::relay::client::{RelayClient, Subscription};
use crate::relay::config::RelayConfig;
use crate::relay::repl::{CommandTable, OpCode};
use crate::relay::server::RelayServer;
use anyhow::Result;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How often the interactive client re-presents its token
const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Execute a relay command
pub async fn execute_command(command: RelayCommand) -> Result<()> {
    match command {
        RelayCommand::Serve {
            addr,
            poll_interval_ms,
            delivery,
            secret,
        } => {
            let defaults = RelayConfig::default();
            let config = RelayConfig {
                addr,
                poll_interval: Duration::from_millis(poll_interval_ms),
                delivery,
                secret: secret.unwrap_or(defaults.secret),
            };
            handle_serve(config).await
        }
        RelayCommand::Client { addr, name } => handle_client(addr, name).await,
    }
}

async fn handle_serve(config: RelayConfig) -> Result<()> {
    if config.uses_default_secret() {
        tracing::warn!("Signing tokens with the compiled-in secret; set MUDRELAY_SECRET for shared deployments");
    }

    let server = RelayServer::bind(&config).await?;

    println!("✓ Relay listening on {}", server.local_addr()?);
    println!("  Poll interval: {} ms", config.poll_interval.as_millis());
    println!("  Delivery: {:?}", config.delivery);
    println!("\nPress Ctrl+C to stop the relay");

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.run(shutdown.clone()));

    tokio::signal::ctrl_c().await?;

    println!("\nStopping relay...");
    shutdown.cancel();
    task.await??;

    Ok(())
}

async fn handle_client(addr: SocketAddr, name: String) -> Result<()> {
    let mut client = RelayClient::connect(addr).await?;
    let reply = client.handshake(&name, "").await?;

    tracing::info!(method = "handshake", name = %reply.name, "Joined relay");

    let subscription = RelayClient::connect(addr).await?.subscribe(&reply.token).await?;

    println!("✓ Connected to {} as {}", addr, reply.name);
    println!("  End a line with '말' (or 'say') to post it, '끝' (or 'exit') to leave");

    let token = Arc::new(RwLock::new(reply.token));
    let client = Arc::new(Mutex::new(client));
    let cancel = CancellationToken::new();

    let receive_task = tokio::spawn(receive_frames(subscription, cancel.clone()));
    let refresh_task = tokio::spawn(refresh_token(
        client.clone(),
        name,
        token.clone(),
        cancel.clone(),
    ));

    let table = CommandTable::default();
    let result = run_repl(BufReader::new(tokio::io::stdin()), &table, &cancel, |text| {
        let client = client.clone();
        let token = token.clone();
        async move {
            let current = token.read().await.clone();
            if let Err(e) = client.lock().await.post(&current, &text).await {
                tracing::error!(method = "post", "Post failed: {:#}", e);
            }
        }
    })
    .await;

    if let Err(e) = receive_task.await {
        tracing::error!("Receive task failed: {}", e);
    }
    if let Err(e) = refresh_task.await {
        tracing::error!("Refresh task failed: {}", e);
    }

    result
}

/// Read command lines from `input` and hand every `Echo` line to `echo`.
///
/// Returns on `Exit`, end of input, a read error, or when `cancel` fires.
/// `cancel` is always cancelled on return so the companion tasks stop too.
async fn run_repl<R, F, Fut>(input: R, table: &CommandTable, cancel: &CancellationToken, mut echo: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut lines = input.lines();
    let mut result = Ok(());

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break, // EOF
                Err(e) => {
                    result = Err(anyhow::Error::new(e).context("Failed to read from stdin"));
                    break;
                }
            },
        };

        let Some((_, op)) = table.resolve(&line) else {
            println!("Unknown command: {}", line.trim());
            continue;
        };

        match op {
            OpCode::Exit => {
                println!("Leaving the relay.");
                break;
            }
            OpCode::Echo => echo(line.trim().to_string()).await,
        }
    }

    cancel.cancel();
    result
}

/// Print frames as they arrive until cancelled or the stream ends
async fn receive_frames(mut subscription: Subscription, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = subscription.close().await;
                break;
            }
            frame = subscription.next_frame() => match frame {
                Ok(Some(text)) => println!("{}", text),
                Ok(None) => {
                    println!("Stream closed by relay");
                    cancel.cancel();
                    break;
                }
                Err(e) => {
                    tracing::error!(method = "open_stream", "Stream failed: {:#}", e);
                    cancel.cancel();
                    break;
                }
            },
        }
    }
}

/// Periodically re-present the token and adopt whatever the relay returns
async fn refresh_token(
    client: Arc<Mutex<RelayClient>>,
    name: String,
    token: Arc<RwLock<String>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + TOKEN_REFRESH_INTERVAL, TOKEN_REFRESH_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let current = token.read().await.clone();
                let result = client.lock().await.handshake(&name, &current).await;

                match result {
                    Ok(reply) => {
                        if reply.token != current {
                            *token.write().await = reply.token;
                        }
                    }
                    Err(e) => {
                        tracing::error!(method = "handshake", "Token refresh failed: {:#}", e);
                    }
                }
            }
        }
    }
}
