mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Logging is initialized once the config is loaded (it picks the sink).
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("sma error: {:#}", err);
        std::process::exit(1);
    }
}
