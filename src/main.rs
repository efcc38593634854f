//! hookwise CLI entry point.

use clap::Parser;

use hookwise::cli::{print_error, Cli, Commands};
use hookwise::infrastructure::config::ConfigLoader;
use hookwise::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config errors surface from the command itself; logging falls back to defaults.
    let log_config = ConfigLoader::load()
        .map(|config| LogConfig::from(&config.logging))
        .unwrap_or_default();
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Init(args) => hookwise::cli::commands::init::execute(args, cli.json).await,
        Commands::Run(args) => hookwise::cli::commands::run::execute(args, cli.json).await,
        Commands::Trigger(args) => hookwise::cli::commands::trigger::execute(args, cli.json).await,
        Commands::Event(args) => hookwise::cli::commands::event::execute(args, cli.json).await,
        Commands::Bridge(args) => hookwise::cli::commands::bridge::execute(args, cli.json).await,
        Commands::Session(args) => hookwise::cli::commands::session::execute(args, cli.json).await,
        Commands::Task(args) => hookwise::cli::commands::task::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        print_error(&err, cli.json);
        std::process::exit(1);
    }
}
