mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runway_core::FrameworkRegistry;

#[derive(Parser)]
#[command(name = "runway", about = "Build container images for runway tasks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the task image, remotely by default
    Build {
        /// Task definition file
        #[arg(long, short = 'f', default_value = commands::DEFAULT_DEFINITION)]
        file: PathBuf,
        /// Build with the local container engine
        #[arg(long)]
        local: bool,
    },
    /// Print the synthesized Dockerfile and generated files
    Recipe {
        /// Task definition file
        #[arg(long, short = 'f', default_value = commands::DEFAULT_DEFINITION)]
        file: PathBuf,
    },
    /// Write the build context archive without building
    Archive {
        /// Task definition file
        #[arg(long, short = 'f', default_value = commands::DEFAULT_DEFINITION)]
        file: PathBuf,
        /// Output path for the gzip tarball
        #[arg(long, short = 'o', default_value = "context.tar.gz")]
        output: PathBuf,
    },
    /// Inspect framework adapters
    Frameworks {
        #[command(subcommand)]
        action: FrameworksAction,
    },
}

#[derive(Subcommand)]
enum FrameworksAction {
    /// List registered frameworks
    List,
    /// List the commands a framework project exposes
    Commands {
        /// Framework name
        name: String,
        /// Project root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let frameworks = FrameworkRegistry::with_defaults();

    match cli.command {
        Commands::Build { file, local } => commands::build(&file, local, &frameworks).await?,
        Commands::Recipe { file } => commands::recipe(&file)?,
        Commands::Archive { file, output } => commands::archive(&file, &output).await?,
        Commands::Frameworks { action } => match action {
            FrameworksAction::List => commands::frameworks_list(&frameworks),
            FrameworksAction::Commands { name, root } => {
                commands::frameworks_commands(&frameworks, &name, &root)?
            }
        },
    }

    Ok(())
}
