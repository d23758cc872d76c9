// mudrelay binary

use mudrelay::logging::init_logging;
use mudrelay::relay::{execute_command, RelayCli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = RelayCli::parse_args();

    // Initialize logging
    init_logging(cli.log_profile)?;

    // Execute command
    if let Err(e) = execute_command(cli.command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
