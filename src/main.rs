//! # filekv - command line front end
//!
//! Thin wrapper running one store operation per invocation and printing the
//! result as JSON on stdout.
//!
//! # Configuration Priority
//! 1. Command line flags (highest priority)
//! 2. `FILEKV_*` environment variables
//! 3. Configuration file (filekv.toml)
//! 4. Default values (lowest priority)
//!
//! Logging is controlled by `RUST_LOG`, e.g. `RUST_LOG=debug filekv keys`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use filekv::{parse_amount, Config, Ensured, SearchOptions, Store};

#[derive(Parser, Debug)]
#[command(name = "filekv", version, about = "Key-value store kept in a single JSON file")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "filekv.toml")]
    config: PathBuf,

    /// Store file to operate on (overrides the configuration)
    #[arg(long)]
    path: Option<String>,

    /// Write indented JSON, `--pretty false` forces compact (overrides the configuration)
    #[arg(long)]
    pretty: Option<bool>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the store file if needed and mark it initialized
    Init,
    /// Set KEY to a JSON value
    Set { key: String, value: String },
    /// Print the value stored under KEY
    Get { key: String },
    /// Print entries whose key matches
    Find {
        /// Match keys starting with this prefix
        #[arg(long, conflicts_with = "contains")]
        prefix: Option<String>,
        /// Match keys containing this text
        #[arg(long)]
        contains: Option<String>,
        /// Print every match instead of the first
        #[arg(long)]
        all: bool,
    },
    /// Append a JSON value (or concatenate a JSON array) to the array at KEY
    Push { key: String, value: String },
    /// Add AMOUNT (default 1) to the number at KEY
    Add { key: String, amount: Option<String> },
    /// Subtract AMOUNT (default 1) from the number at KEY
    Subtract { key: String, amount: Option<String> },
    /// Remove KEY
    Delete { key: String },
    /// Empty the store; it must be initialized again afterwards
    Clear,
    /// List keys
    Keys,
    /// List values
    Values,
    /// List key/value entries
    All,
    /// Print whether KEY holds a value
    Has { key: String },
    /// Set KEY to VALUE unless it already holds a value
    Ensure { key: String, value: Option<String> },
    /// Remove elements of the array at KEY equal to a JSON value
    Filter {
        key: String,
        #[arg(long)]
        exclude: String,
    },
    /// Print the number of keys
    Count,
}

fn main() -> Result<()> {
    // Initialize logging - use RUST_LOG environment variable to control verbosity
    env_logger::init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    if let Some(path) = cli.path {
        config.path = path;
    }
    if let Some(pretty) = cli.pretty {
        config.pretty = pretty;
    }
    debug!("Using configuration {:?}", config);

    let store = Store::from_config(&config);
    run(&store, cli.command)
}

fn run(store: &Store, command: Command) -> Result<()> {
    match command {
        Command::Init => print(&store.init()?),
        Command::Set { key, value } => print(&store.set(&key, parse_json(&value)?)?),
        Command::Get { key } => print(&store.get(&key)?),
        Command::Find {
            prefix,
            contains,
            all,
        } => {
            let matches = move |key: &str, _: &Value| match (&prefix, &contains) {
                (Some(prefix), _) => key.starts_with(prefix.as_str()),
                (None, Some(text)) => key.contains(text.as_str()),
                (None, None) => true,
            };
            print(&store.find(&SearchOptions::new(matches, all))?)
        }
        Command::Push { key, value } => print(&store.push(&key, parse_json(&value)?)?),
        Command::Add { key, amount } => {
            print(&store.add(&key, amount.as_deref().map(parse_amount))?)
        }
        Command::Subtract { key, amount } => {
            print(&store.subtract(&key, amount.as_deref().map(parse_amount))?)
        }
        Command::Delete { key } => print(&store.delete(&key)?),
        Command::Clear => print(&store.clear()?),
        Command::Keys => print(&store.keys()?),
        Command::Values => print(&store.values()?),
        Command::All => print(&store.all()?),
        Command::Has { key } => print(&store.has(&key)?),
        Command::Ensure { key, value } => {
            let value = value.as_deref().map(parse_json).transpose()?;
            match store.ensure(&key, value)? {
                Ensured::Present => print(&true),
                Ensured::Inserted(doc) => print(&doc),
            }
        }
        Command::Filter { key, exclude } => {
            let excluded = parse_json(&exclude)?;
            let keep = move |item: &Value| *item != excluded;
            print(&store.filter(&key, &SearchOptions::all(keep))?)
        }
        Command::Count => print(&store.count()?),
    }
}

/// Parse a JSON argument, treating anything that is not valid JSON as a
/// plain string so `filekv set name ada` works without extra quoting.
fn parse_json(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_parse_json_falls_back_to_string() {
        assert_eq!(parse_json("42").unwrap(), json!(42));
        assert_eq!(parse_json("[1,\"a\"]").unwrap(), json!([1, "a"]));
        assert_eq!(parse_json("ada").unwrap(), json!("ada"));
        assert_eq!(parse_json("\"quoted\"").unwrap(), json!("quoted"));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["filekv", "--path", "x.json", "add", "counter", "5"]);
        assert_eq!(cli.path.as_deref(), Some("x.json"));
        assert!(matches!(
            cli.command,
            Command::Add { ref key, amount: Some(ref amount) } if key == "counter" && amount == "5"
        ));

        let cli = Cli::parse_from(["filekv", "find", "--prefix", "user:", "--all"]);
        assert!(matches!(cli.command, Command::Find { all: true, .. }));

        assert!(Cli::try_parse_from(["filekv", "find", "--prefix", "a", "--contains", "b"]).is_err());

        // Pretty output can be switched either way, or left to the configuration
        let cli = Cli::parse_from(["filekv", "--pretty", "false", "keys"]);
        assert_eq!(cli.pretty, Some(false));
        let cli = Cli::parse_from(["filekv", "--pretty", "true", "keys"]);
        assert_eq!(cli.pretty, Some(true));
        let cli = Cli::parse_from(["filekv", "keys"]);
        assert_eq!(cli.pretty, None);
    }

    #[test]
    fn test_run_against_file_store() {
        let temp_dir = tempdir().unwrap();
        let store = Store::new(temp_dir.path().join("cli.json"));

        run(&store, Command::Init).unwrap();
        run(
            &store,
            Command::Set {
                key: "tags".into(),
                value: "[\"a\",\"b\",\"a\"]".into(),
            },
        )
        .unwrap();
        run(
            &store,
            Command::Filter {
                key: "tags".into(),
                exclude: "a".into(),
            },
        )
        .unwrap();
        assert_eq!(store.get("tags").unwrap(), json!(["b"]));

        run(
            &store,
            Command::Set {
                key: "n".into(),
                value: "1".into(),
            },
        )
        .unwrap();
        run(
            &store,
            Command::Subtract {
                key: "n".into(),
                amount: Some("3".into()),
            },
        )
        .unwrap();
        assert_eq!(store.get("n").unwrap(), json!(-2));

        assert!(run(&store, Command::Get { key: "missing".into() }).is_err());
    }
}
