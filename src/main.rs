use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use treestore::{logging, Action, Config, Path, StoreContext, Value};

/// Replay actions into a state tree
#[derive(Parser, Debug)]
#[command(name = "treestore")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON-lines action log and print the resulting tree
    Apply {
        /// One `{"type": ..., "payload": ...}` object per line
        actions: PathBuf,

        /// Config file (default: the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON file with the initial tree
        #[arg(short, long)]
        initial: Option<PathBuf>,

        /// Print only the value at this path
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Print the resolved segments of a path as a JSON array
    Resolve { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Apply {
            actions,
            config,
            initial,
            path,
        } => apply(&actions, config, initial, path),
        Command::Resolve { path } => {
            let resolved = Path::parse(&path).resolve();
            println!("{}", serde_json::to_string(resolved.segments())?);
            Ok(())
        }
    }
}

fn apply(actions: &std::path::Path, config: Option<PathBuf>, initial: Option<PathBuf>, path: Option<String>) -> Result<()> {
    let config = match config {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    logging::init_tracing(&config.logging);

    let initial = match initial {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read initial state '{}'", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse initial state '{}'", path.display()))?;
            Value::from(json)
        }
        None => Value::Null,
    };

    let context = StoreContext::new(config, initial)?;
    let store = context.store();

    let file = fs::File::open(actions)
        .with_context(|| format!("Failed to open action log '{}'", actions.display()))?;
    let mut replayed = 0usize;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let number = index + 1;
        let line = line.with_context(|| format!("Failed to read line {}", number))?;
        if line.trim().is_empty() {
            continue;
        }
        let json: serde_json::Value =
            serde_json::from_str(&line).with_context(|| format!("Line {}: invalid JSON", number))?;
        let action = Action::from_json(&json).with_context(|| format!("Line {}", number))?;
        store
            .dispatch(action)
            .with_context(|| format!("Line {}: dispatch failed", number))?;
        replayed += 1;
    }
    tracing::info!(replayed, "Action log replayed");

    let output = match path {
        Some(path) => store
            .peek_key(Path::parse(&path))
            .map(|value| value.to_json())
            .unwrap_or(serde_json::Value::Null),
        None => store.peek().to_json(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    store.complete();
    Ok(())
}
