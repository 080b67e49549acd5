use clap::Parser;
use colored::Colorize;
use dirsort::cli::{Cli, run_cli};
use dirsort::control::CancellationToken;
use dirsort::output::OutputFormatter;

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            // Second Ctrl+C - force exit
            std::process::exit(130);
        }
        eprintln!(
            "\n{}",
            "Received Ctrl+C, finishing current file...".yellow().bold()
        );
        handler_token.cancel();
    }) {
        log::warn!("Failed to set Ctrl+C handler: {e}");
    }

    if let Err(e) = run_cli(&cli, &cancel) {
        OutputFormatter::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
