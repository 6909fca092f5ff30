use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use commands::{clear, config, reset, status, sync, CommandStatus};
use sheet_sync_core::SyncError;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "sheetsync")]
#[command(about = "sheetsync - Mirror Last.fm scrobbles and YouTube playlists into Google Sheets")]
#[command(version)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Also write logs to a daily-rotated file (defaults to the sheetsync log directory)
    #[arg(long, value_name = "PATH", global = true, num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Service {
    Lastfm,
    Youtube,
    All,
}

impl Service {
    pub fn includes_lastfm(self) -> bool {
        matches!(self, Service::Lastfm | Service::All)
    }

    pub fn includes_youtube(self) -> bool {
        matches!(self, Service::Youtube | Service::All)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sync scrobbles and/or playlists into their spreadsheets
    #[command(long_about = "Fetch new Last.fm scrobbles and YouTube playlist changes and write them to Google Sheets. Interrupted or failed runs resume from the last checkpoint.")]
    Sync {
        /// Service to sync
        #[arg(value_enum, default_value = "all")]
        service: Service,

        /// Re-fetch Last.fm scrobbles from this date (YYYY-MM-DD), replacing rows on or after it
        #[arg(long, value_name = "DATE")]
        force_from: Option<NaiveDate>,

        /// Clear local state and the spreadsheet before syncing
        #[arg(long, action = ArgAction::SetTrue)]
        reset: bool,

        /// Only sync these YouTube playlists (ID or exact title, repeatable)
        #[arg(long = "playlist", value_name = "ID|TITLE")]
        playlists: Vec<String>,

        /// Skip the confirmation prompt for --reset
        #[arg(short, long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Show saved sync state
    Status,
    /// Remove local state and/or the remote spreadsheet
    #[command(long_about = "Delete saved sync state, caches and checkpoints (--local-only), the Google spreadsheet (--remote-only), or both. The next sync starts from scratch.")]
    Clear {
        #[arg(value_enum)]
        service: Service,

        /// Only remove local state files and caches
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "remote_only")]
        local_only: bool,

        /// Only delete the spreadsheet
        #[arg(long, action = ArgAction::SetTrue)]
        remote_only: bool,

        /// Do not ask for confirmation
        #[arg(short, long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Clear everything for a service, then run a fresh sync
    Reset {
        #[arg(value_enum)]
        service: Service,

        /// Do not ask for confirmation
        #[arg(short, long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Manage configuration and stored credentials
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    Show,

    /// Write a default config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },

    /// Store the Google OAuth refresh token
    #[command(long_about = "Store the Google OAuth refresh token used for YouTube and Sheets access. The token needs the youtube.readonly, spreadsheets and drive.file scopes.")]
    Google {
        /// Refresh token (if not provided, will prompt)
        #[arg(long)]
        refresh_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = cli
        .log_file
        .map(|path| path.unwrap_or_else(|| sheet_sync_config::PathManager::default().log_file()));
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    let result = match cli.command {
        Commands::Sync {
            service,
            force_from,
            reset,
            playlists,
            yes,
        } => {
            let request = sync::SyncRequest {
                service,
                force_from,
                reset,
                playlists,
                assume_yes: yes,
            };
            sync::run_sync(request, &output).await
        }
        Commands::Status => status::run_status(&output).map(|_| CommandStatus::Completed),
        Commands::Clear {
            service,
            local_only,
            remote_only,
            yes,
        } => {
            let scope = clear::ClearScope::from_flags(local_only, remote_only);
            clear::run_clear(service, scope, yes, &output)
                .await
                .map(|_| CommandStatus::Completed)
        }
        Commands::Reset { service, yes } => reset::run_reset(service, yes, &output).await,
        Commands::Config { cmd } => config::run_config(cmd, &output).map(|_| CommandStatus::Completed),
    };

    match result {
        Ok(CommandStatus::Completed) => Ok(ExitCode::SUCCESS),
        Ok(CommandStatus::Interrupted) => Ok(ExitCode::from(130)),
        Err(report) => {
            match report.downcast_ref::<SyncError>() {
                Some(SyncError::DailyQuotaExceeded { service, .. }) => {
                    output.error(format!("Daily {} quota exhausted. Try again tomorrow; progress has been saved.", service));
                }
                Some(err @ SyncError::RetryExhausted { .. }) => {
                    output.error(err.to_string());
                    output.error("Wait 15-30 minutes and try again. Progress has been saved.");
                }
                _ => output.error(format!("{:#}", report)),
            }
            tracing::debug!(error = ?report, "Command failed");
            Ok(ExitCode::FAILURE)
        }
    }
}
