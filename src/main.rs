use batchstore::cli::{self, CliError};
use batchstore::config::resolve_config_path;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "batchstore")]
#[command(about = "Pack small payloads into batch objects on an object store", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack files into one batch and upload it
    Pack {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Extra object tag, as key=value
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Skip the metadata object
        #[arg(long)]
        no_metadata: bool,
    },
    /// Download one payload by location
    Fetch {
        #[arg(long)]
        object: String,
        #[arg(long)]
        offset: u64,
        #[arg(long)]
        length: u64,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the index stored with a batch
    Index { object: String },
    /// Delete a batch and its metadata object
    Delete { object: String },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so fetched payloads can be piped from stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batchstore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config_path = resolve_config_path(cli.config.as_deref());
    let config_path = config_path.as_deref();

    match cli.command {
        Commands::Pack {
            files,
            tags,
            no_metadata,
        } => {
            let cancel = cli::ctrl_c_token();
            cli::pack::run(config_path, &files, &tags, no_metadata, &cancel).await
        }
        Commands::Fetch {
            object,
            offset,
            length,
            out,
        } => {
            let cancel = cli::ctrl_c_token();
            cli::fetch::fetch(config_path, &object, offset, length, out.as_ref(), &cancel).await
        }
        Commands::Index { object } => {
            let cancel = cli::ctrl_c_token();
            cli::fetch::index(config_path, &object, &cancel).await
        }
        Commands::Delete { object } => {
            let cancel = cli::ctrl_c_token();
            cli::fetch::delete(config_path, &object, &cancel).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => cli::config::init(stdout),
        },
    }
}
