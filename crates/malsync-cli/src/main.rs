use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "malsync")]
#[command(about = "malsync - keep your MyAnimeList in step with what Plex says you watched")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Episode,
    Movie,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how an agent GUID resolves to a MAL title and episode
    #[command(long_about = "Normalize an agent GUID (HAMA, MyAnimeList agent, ...) or a provider id, then resolve it against the mapping table and print the canonical event, the selected mapping and the MAL episode number.")]
    Inspect {
        /// Agent GUID, e.g. com.plexapp.agents.hama://tvdb-81797/21/186
        #[arg(long)]
        guid: String,

        /// Media kind of the item the GUID belongs to
        #[arg(long, value_enum, default_value = "episode")]
        kind: KindArg,

        /// Season index reported by the media server
        #[arg(long)]
        season: Option<u32>,

        /// Episode index reported by the media server
        #[arg(long)]
        episode: Option<u32>,

        /// Mapping table to use instead of the configured one
        #[arg(long, value_name = "PATH")]
        mappings: Option<PathBuf>,
    },
    /// Dry-run webhook payloads through the full pipeline
    #[command(long_about = "Run one or more Plex/Tautulli webhook payloads through the pipeline against an in-memory MAL list. Nothing is sent to MyAnimeList; the computed updates are printed instead.")]
    Process {
        /// JSON file with a webhook payload or an array of payloads
        #[arg(long, value_name = "FILE")]
        payload: PathBuf,

        /// JSON object of MAL id -> list snapshot used as the starting list
        #[arg(long, value_name = "FILE")]
        snapshots: Option<PathBuf>,

        /// Date used for start/finish dates (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Work with mapping tables
    Mappings {
        #[command(subcommand)]
        cmd: MappingsCommands,
    },
    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum MappingsCommands {
    /// Load the mapping table and report authoring problems
    #[command(long_about = "Load the configured mapping table (plus overrides), print row counts and list every lint warning. Exits with an error when the table cannot be loaded.")]
    Check {
        /// Mapping table to check instead of the configured one
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let context = commands::Context::load(cli.config.clone())?;
    logging::init_logging_with_config(cli.verbose, cli.quiet, &context.config.logging)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Inspect {
            guid,
            kind,
            season,
            episode,
            mappings,
        } => commands::inspect::run_inspect(&context, &guid, kind, season, episode, mappings, &output),
        Commands::Process {
            payload,
            snapshots,
            date,
        } => commands::process::run_process(&context, &payload, snapshots.as_deref(), date, &output).await,
        Commands::Mappings { cmd } => match cmd {
            MappingsCommands::Check { file } => commands::mappings::run_check(&context, file, &output),
        },
        Commands::Config { cmd } => commands::config::run_config(&context, cmd, &output),
    }
}
