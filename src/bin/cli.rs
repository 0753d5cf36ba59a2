use clap::Parser;
use log::error;
use qakit::ui::cli::cli_commands;
use qakit::utils::logging::init_logging;

fn main() {
    init_logging();
    let args = cli_commands::Args::parse();
    if let Err(e) = cli_commands::run_cli(args) {
        error!("CLI error: {}", e);
        std::process::exit(1);
    }
}
