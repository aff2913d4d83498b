use clap::{Parser, Subcommand};
use jumpflow::config::RedirectConfig;
use jumpflow::definition::loader::load_definition_from_yaml;
use jumpflow::navigator::{next_from, next_set_from};
use jumpflow::scenario::Scenario;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the activity reached by the first outgoing transition of a node
    Next {
        /// Path to the process definition YAML file
        #[arg(long, short)]
        definition: PathBuf,

        #[arg(long, short)]
        node: String,
    },

    /// Print every destination of the first listed node found in the definition
    NextSet {
        #[arg(long, short)]
        definition: PathBuf,

        /// Comma-joined node ids
        #[arg(long, short)]
        nodes: String,
    },

    /// Build an in-memory instance from a scenario file and redirect its tasks
    Move {
        #[arg(long, short)]
        scenario: PathBuf,

        /// Redirect config YAML; defaults apply when omitted
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| anyhow!("Path is not valid UTF-8: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Next { definition, node } => {
            let definition = load_definition_from_yaml(path_str(&definition)?)?;
            match next_from(&node, &definition.activities) {
                Some(activity) => println!("{}", activity.id),
                None => println!("none"),
            }
        }

        Commands::NextSet { definition, nodes } => {
            let definition = load_definition_from_yaml(path_str(&definition)?)?;
            let next: Vec<&str> = next_set_from(&nodes, &definition.activities)
                .into_iter()
                .map(|a| a.id.as_str())
                .collect();
            println!("{}", serde_json::to_string(&next)?);
        }

        Commands::Move { scenario, config } => {
            let config = match config {
                Some(path) => RedirectConfig::from_yaml_file(path_str(&path)?)?,
                None => RedirectConfig::default(),
            };
            let scenario = Scenario::from_yaml_file(path_str(&scenario)?)?;
            info!("Redirecting {} -> {}", scenario.source, scenario.target);

            let report = scenario.run(config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
