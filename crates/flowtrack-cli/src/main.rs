mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{config, report, tracking};

#[derive(Parser)]
#[command(name = "flowtrack")]
#[command(about = "Focus tracking with automatic Pomodoro sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the tracker in the foreground until Ctrl-C or `flowtrack stop`
    Start {
        /// Append logs to flowtrack.log in the data directory
        #[arg(long)]
        log_file: bool,
    },
    /// Stop the running tracker
    Stop,
    /// Show the current session and activity
    Status {
        /// Also list the most recent classification decisions
        #[arg(short, long)]
        verbose: bool,
    },
    /// Tag subsequent activity with a focus task
    Task {
        /// Todo id to work on
        #[arg(conflicts_with = "clear", required_unless_present = "clear")]
        id: Option<i64>,
        /// Remove the current tag
        #[arg(long)]
        clear: bool,
    },
    /// Turn activity enrichment on or off
    Enrich {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// List recent Pomodoro sessions
    Sessions {
        /// How many days back to look
        #[arg(short, long, default_value_t = 1)]
        days: i64,
    },
    /// Show the most recent activity records
    Log {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// List focus tasks
    Todos {
        /// Include finished tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Start { log_file: true } => tracking::setup_file_logging()?,
        _ => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init(),
    }

    match cli.command {
        Commands::Start { .. } => tracking::start().await,
        Commands::Stop => tracking::stop().await,
        Commands::Status { verbose } => tracking::status(verbose).await,
        Commands::Task { id, .. } => tracking::set_task(id).await,
        Commands::Enrich { state } => tracking::set_enrichment(state == Toggle::On).await,
        Commands::Sessions { days } => report::sessions(days),
        Commands::Log { limit } => report::activity_log(limit),
        Commands::Todos { all } => report::todos(all),
        Commands::Config { action } => match action {
            ConfigAction::Path => config::path(),
            ConfigAction::Show => config::show(),
        },
    }
}
