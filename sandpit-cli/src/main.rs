//! # sandpit CLI
//!
//! Command-line interface and playground server for sandpit.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use sandpit_types::ExecutionMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sandpit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "sandpit.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new sandpit workspace
    Init {
        /// Target directory (defaults to current directory)
        path: Option<PathBuf>,
    },

    /// Assemble the executable document from the workspace
    Build {
        /// Execution mode (defaults to the configured mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Export the downloadable file for a mode
    Export {
        /// Execution mode (defaults to the configured mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Target directory (defaults to current directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Start the playground server
    Serve {
        /// Server port (overrides the configured port)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Copy, Clone, ValueEnum)]
pub enum ModeArg {
    Html,
    Js,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Html => ExecutionMode::Markup,
            ModeArg::Js => ExecutionMode::Script,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => commands::init_project(path.as_deref()),
        Commands::Build { mode, output } => {
            commands::build_document(&cli.config, mode.map(Into::into), output.as_deref())
        }
        Commands::Export { mode, output } => {
            commands::export_download(&cli.config, mode.map(Into::into), output.as_deref())
                .map(|_| ())
        }
        Commands::Serve { port } => commands::serve(&cli.config, port).await,
    }
}
