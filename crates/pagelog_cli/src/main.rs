//! pagelog CLI
//!
//! # Commands
//!
//! - `serve` - Run the WebSocket server
//! - `pages` - List pages stored in a journal directory
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::pages::Selector;
use pagelog_core::ObjectId;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// pagelog server and tools.
#[derive(Parser)]
#[command(name = "pagelog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the WebSocket server
    Serve {
        /// Port to listen on; falls back to 3333 if not a number
        #[arg(long, env = "PORT")]
        port: Option<String>,

        /// Address to bind to
        #[arg(long, env = "PAGELOG_BIND", default_value = "0.0.0.0")]
        bind: IpAddr,

        /// Journal directory; runs in memory when absent
        #[arg(long, env = "PAGELOG_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Sync journals to disk after every insert
        #[arg(long)]
        sync: bool,

        /// Frames kept per session while its client is away
        #[arg(long)]
        max_pending_frames: Option<usize>,

        /// Request ids remembered per session
        #[arg(long)]
        dedup_window: Option<usize>,

        /// Largest page a listing request may return
        #[arg(long)]
        max_page_size: Option<u64>,
    },

    /// List pages stored in a journal directory (safe while a server runs)
    Pages {
        /// Journal directory
        #[arg(long, env = "PAGELOG_DATA_DIR")]
        data_dir: PathBuf,

        /// Pages to skip
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Maximum pages to show
        #[arg(long, default_value = "20")]
        limit: u64,

        /// Show only the page with this exact title
        #[arg(long, conflicts_with = "id")]
        title: Option<String>,

        /// Show only the page with this 24-character hex id
        #[arg(long)]
        id: Option<ObjectId>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            port,
            bind,
            data_dir,
            sync,
            max_pending_frames,
            dedup_window,
            max_page_size,
        } => {
            let options = commands::serve::ServeOptions {
                port: commands::serve::parse_port(port.as_deref()),
                bind,
                data_dir,
                sync_on_insert: sync,
                max_pending_frames,
                dedup_window,
                max_page_size,
            };
            commands::serve::run(options)?;
        }
        Commands::Pages {
            data_dir,
            offset,
            limit,
            title,
            id,
            format,
        } => {
            let selector = match (title.as_deref(), id) {
                (Some(title), _) => Selector::Title(title),
                (None, Some(id)) => Selector::Id(id),
                (None, None) => Selector::All,
            };
            commands::pages::run(&data_dir, offset, limit, selector, &format)?;
        }
        Commands::Version => {
            println!("pagelog v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
