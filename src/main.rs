mod handlers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dashboard_git_sync::logger;
use dashboard_git_sync::scm::BackendKind;
use dashboard_git_sync::settings::Settings;

use handlers::config::SettingsUpdate;

#[derive(Parser)]
#[command(name = "dashboard-git-sync")]
#[command(about = "Keep a folder of dashboards in sync with a remote git repository", long_about = None)]
#[command(version)]
struct Cli {
    /// Print machine-readable JSON instead of colored text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the dashboards repository from the saved settings
    Init,

    /// Show or change settings
    Config {
        /// Remote repository URL (empty string clears it)
        #[arg(long)]
        remote_url: Option<String>,

        /// Branch to sync
        #[arg(long)]
        branch: Option<String>,

        /// Folder that holds the dashboards
        #[arg(long)]
        dashboards_path: Option<PathBuf>,

        /// Dashboards to include in commits (comma-separated)
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<String>>,

        /// Commit every dashboard again
        #[arg(long)]
        clear_selection: bool,

        /// Username for HTTPS authentication
        #[arg(long)]
        username: Option<String>,

        /// Personal access token for HTTPS authentication
        #[arg(long)]
        token: Option<String>,

        /// Repository backend
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,

        /// Pull when `init` runs
        #[arg(long)]
        auto_pull: Option<bool>,

        /// Network timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// Switch to a branch, creating it when needed
    Checkout {
        branch: String,
    },

    /// Commit dashboard changes
    Commit {
        /// Commit message (default: timestamped)
        #[arg(short, long)]
        message: Option<String>,

        /// Ignore the dashboard selection and commit everything
        #[arg(long)]
        all: bool,
    },

    /// Fetch and merge the configured branch
    Pull,

    /// Push the configured branch, pulling once if the remote moved ahead
    Push,

    /// Create an annotated tag and push it
    Tag {
        /// Tag name prefix
        #[arg(long, default_value = "v")]
        prefix: String,

        /// Tag identifier (default: current UTC time)
        #[arg(long)]
        id: Option<String>,
    },

    /// List dashboards on the remote with their last change time
    RemoteList {
        /// Remote URL (default: configured remote)
        #[arg(long)]
        url: Option<String>,

        /// Branch (default: configured branch)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Copy dashboards from the remote into the local folder
    Download {
        /// Dashboard names
        #[arg(required = true)]
        names: Vec<String>,

        /// Remote URL (default: configured remote)
        #[arg(long)]
        url: Option<String>,

        /// Branch (default: configured branch)
        #[arg(long)]
        branch: Option<String>,

        /// Leave the copied dashboards uncommitted
        #[arg(long)]
        no_commit: bool,
    },

    /// Show repository and dashboard status
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logger::init_logger() {
        eprintln!("Warning: could not initialize log file: {e}");
    }
    if let Err(e) = logger::rotate_log_if_needed() {
        log::debug!("Log rotation skipped: {e}");
    }

    let settings = Settings::load()?;
    let json = cli.json;

    let success = match cli.command {
        Commands::Init => handlers::repo::handle_init(&settings, json)?,
        Commands::Config {
            remote_url,
            branch,
            dashboards_path,
            select,
            clear_selection,
            username,
            token,
            backend,
            auto_pull,
            timeout_secs,
            show,
        } => {
            let update = SettingsUpdate {
                remote_url,
                branch,
                dashboards_path,
                select,
                clear_selection,
                username,
                token,
                backend,
                auto_pull,
                timeout_secs,
            };
            handlers::config::handle_config(settings, update, show, json)?
        }
        Commands::Checkout { branch } => handlers::repo::handle_checkout(&settings, &branch, json)?,
        Commands::Commit { message, all } => {
            handlers::repo::handle_commit(&settings, message.as_deref(), all, json)?
        }
        Commands::Pull => handlers::repo::handle_pull(&settings, json)?,
        Commands::Push => handlers::repo::handle_push(&settings, json)?,
        Commands::Tag { prefix, id } => {
            handlers::repo::handle_tag(&settings, &prefix, id.as_deref(), json)?
        }
        Commands::RemoteList { url, branch } => handlers::remote::handle_remote_list(
            &settings,
            url.as_deref(),
            branch.as_deref(),
            json,
        )?,
        Commands::Download {
            names,
            url,
            branch,
            no_commit,
        } => handlers::remote::handle_download(
            &settings,
            &names,
            url.as_deref(),
            branch.as_deref(),
            !no_commit,
            json,
        )?,
        Commands::Status => handlers::repo::handle_status(&settings, json)?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
