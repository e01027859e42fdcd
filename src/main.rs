use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ontomap::{server, tbox};

/// An interactive workbench for mapping tabular data onto an ontology.
#[derive(Parser)]
#[command(name = "ontomap")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server with the bundled frontend
    Serve {
        /// Directory with the built frontend assets
        #[arg(long, default_value = "frontend/dist")]
        static_dir: PathBuf,

        /// Directory for generated output files
        #[arg(short, long, default_value = "data")]
        output: PathBuf,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
    /// Parse an ontology file and print a summary
    Parse {
        /// Input ontology file (.ttl, .rdf, .owl, .xml)
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            static_dir,
            output,
            port,
        } => {
            server::serve(&static_dir, &output, port).await?;
        }
        Commands::Parse { input } => {
            let content = fs::read(&input)?;
            let filename = input.file_name().map(|n| n.to_string_lossy().into_owned());
            let response = tbox::parse_tbox(&content, filename.as_deref())?;
            println!(
                "{}: {} data properties, {} classes, {} object properties",
                input.display(),
                response.properties.len(),
                response.classes.len(),
                response.object_properties.len()
            );
            for property in &response.properties {
                println!("  {}", property.display_label());
            }
        }
    }

    Ok(())
}
