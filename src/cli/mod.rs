//! Command-line interface.

pub mod commands;
pub mod context;
pub mod id_resolver;
pub mod output;

use clap::{Parser, Subcommand};

pub use output::print_error;

#[derive(Parser, Debug)]
#[command(name = "hookwise")]
#[command(about = "hookwise - turn events and mentions into agent tasks", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default configuration and create the database
    Init(commands::init::InitArgs),

    /// Run the trigger engine and mention bridge until interrupted
    Run(commands::run::RunArgs),

    /// Trigger management commands
    Trigger(commands::trigger::TriggerArgs),

    /// Feed events to the trigger engine
    Event(commands::event::EventArgs),

    /// Mention bridge commands
    Bridge(commands::bridge::BridgeArgs),

    /// Session mapping commands
    Session(commands::session::SessionArgs),

    /// Task queue commands
    Task(commands::task::TaskArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_trigger_add() {
        let cli = Cli::try_parse_from([
            "hookwise",
            "--json",
            "trigger",
            "add",
            "--name",
            "invoices",
            "--source",
            "gmail",
            "--action",
            "create-task",
            "--when",
            "subject contains invoice",
            "--prompt",
            "Handle it",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Trigger(_)));
    }

    #[test]
    fn test_event_fields_conflict_with_data() {
        let result = Cli::try_parse_from([
            "hookwise", "event", "emit", "--source", "gmail", "--field", "a=1", "--data", "{}",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_remote_emit_and_run_flags() {
        let cli = Cli::try_parse_from(["hookwise", "event", "emit", "--source", "gmail", "--remote"]).unwrap();
        let Commands::Event(args) = cli.command else {
            panic!("expected event command");
        };
        let commands::event::EventCommands::Emit { remote, .. } = args.command;
        assert!(remote);

        let cli = Cli::try_parse_from(["hookwise", "run", "--no-listener"]).unwrap();
        assert!(matches!(cli.command, Commands::Run(commands::run::RunArgs { no_listener: true })));
    }
}
