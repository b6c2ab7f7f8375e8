use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskboard::config::TaskboardConfig;
use taskboard_common::ReorderPolicy;
use tracing::warn;

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Ordered task board server and sync client")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to taskboard.toml (default: .taskboard/taskboard.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Board database path. Overrides the config file and TASKBOARD_DB_PATH.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the board API server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind on all interfaces with permissive CORS
        #[arg(long)]
        dev: bool,

        /// Reorder policy for same-list moves: swap or shift
        #[arg(long)]
        policy: Option<ReorderPolicy>,
    },
    /// Create the board database and a default config file
    Init,
    /// Create or list boards
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },
    /// Renumber drifted positions on a board
    Repair {
        #[arg(long)]
        board: String,
    },
    /// Print a board's lists and cards
    Show {
        #[arg(long)]
        board: String,

        /// Read from a running server at this URL instead of the local database
        #[arg(long)]
        server: Option<String>,

        /// Read from the server configured in [sync].server_url
        #[arg(long, conflicts_with = "server")]
        remote: bool,
    },
    /// Follow a board on a running server, reprinting it on every change
    Watch {
        #[arg(long)]
        board: String,

        /// Server URL (default: [sync].server_url)
        #[arg(long)]
        server: Option<String>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum BoardCommands {
    /// Create a board
    Add {
        title: String,

        /// Board id (default: a random UUID)
        #[arg(long)]
        id: Option<String>,
    },
    /// List boards
    List,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default taskboard.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    taskboard::logging::init_tracing(cli.verbose);

    let mut config = TaskboardConfig::load(cli.config.as_deref())?;
    if let Some(db_path) = &cli.db_path {
        config.toml.server.db_path = db_path.clone();
    }
    if !matches!(cli.command, Commands::Config { .. }) {
        for warning in config.validate() {
            warn!(%warning, "configuration");
        }
    }

    let db_path = config.toml.server.db_path.clone();
    let policy = config.toml.board.reorder_policy;

    match cli.command {
        Commands::Serve {
            port,
            dev,
            policy: cli_policy,
        } => {
            let mut server = config.toml.server_config();
            if let Some(port) = port {
                server.port = port;
            }
            if let Some(cli_policy) = cli_policy {
                server.reorder_policy = cli_policy;
            }
            server.dev_mode |= dev;
            cmd::cmd_serve(server).await?;
        }
        Commands::Init => cmd::cmd_init(&config.config_path, &config.toml)?,
        Commands::Board { command } => match command {
            BoardCommands::Add { title, id } => {
                cmd::cmd_board_add(&db_path, policy, &title, id).await?
            }
            BoardCommands::List => cmd::cmd_board_list(&db_path, policy).await?,
        },
        Commands::Repair { board } => cmd::cmd_repair(&db_path, policy, &board).await?,
        Commands::Show {
            board,
            server,
            remote,
        } => {
            let server = match server {
                Some(url) => Some(url),
                None if remote => Some(config.toml.sync.server_url.clone()),
                None => None,
            };
            cmd::cmd_show(&db_path, policy, &board, server.as_deref()).await?;
        }
        Commands::Watch { board, server } => {
            let url = server.unwrap_or_else(|| config.toml.sync.server_url.clone());
            cmd::cmd_watch(&url, &board, policy, config.toml.sync.settings()).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
