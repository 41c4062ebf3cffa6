mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, group::GroupSubcommand, job::JobSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sms",
    about = "Jira/Confluence automation for the service management system",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "SMS_CONFIG", default_value = "sms.yaml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server and job scheduler
    Serve,

    /// List and run scheduled jobs
    Job {
        #[command(subcommand)]
        subcommand: JobSubcommand,
    },

    /// Dispatch a saved webhook payload through the handlers
    Event {
        /// JSON file holding the webhook delivery
        file: PathBuf,
    },

    /// Resolve a custom field display name to its id
    Field {
        /// Field display name, e.g. "Review frequency"
        name: String,
    },

    /// Inspect and reconcile Jira groups
    Group {
        #[command(subcommand)]
        subcommand: GroupSubcommand,
    },

    /// Create and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve => cmd::serve::run(&cli.config),
        Commands::Job { subcommand } => cmd::job::run(&cli.config, subcommand, cli.json),
        Commands::Event { file } => cmd::event::run(&cli.config, &file, cli.json),
        Commands::Field { name } => cmd::field::run(&cli.config, &name, cli.json),
        Commands::Group { subcommand } => cmd::group::run(&cli.config, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
