//! `layerconf`: inspect, query, check and watch layered configuration.
//!
//! # Layering
//!
//! ```text
//!   --set KEY=VALUE      highest
//!   <PREFIX>_* env vars
//!   --dotenv FILE
//!   --file FILE
//!                        lowest
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use layerconf::config::{Rule, Rules};
use layerconf::lifecycle::shutdown_signal;
use layerconf::observability::logging;
use layerconf::{Config, Source, SourceError, Table, Value};

#[derive(Parser)]
#[command(name = "layerconf")]
#[command(about = "Inspect and watch layered configuration", long_about = None)]
struct Cli {
    /// YAML, JSON or TOML file
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// KEY=VALUE file layered above --file
    #[arg(long, global = true)]
    dotenv: Option<PathBuf>,

    /// Environment variable prefix, e.g. APP for APP_SERVER_PORT
    #[arg(short, long, global = true)]
    env_prefix: Option<String>,

    /// Override a key, highest precedence. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged configuration as JSON
    Show {
        /// Nest keys instead of printing dotted keys
        #[arg(long)]
        tree: bool,
    },
    /// Print a single value
    Get { key: String },
    /// Validate keys against rule expressions
    Check {
        /// KEY=EXPR, e.g. server.port=required,min=1,max=65535
        #[arg(long = "rule", value_name = "KEY=EXPR", required = true)]
        rules: Vec<String>,
    },
    /// Reload on file changes and print each new snapshot
    Watch {
        #[arg(long, default_value_t = 500)]
        debounce_ms: u64,
    },
}

/// `--set` pairs as a source.
struct Overrides(Vec<(String, String)>);

impl Source for Overrides {
    fn name(&self) -> String {
        "overrides".to_string()
    }

    fn load(&self) -> Result<Table, SourceError> {
        Ok(self
            .0
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect())
    }
}

fn split_pair(pair: &str) -> Result<(String, String), String> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {pair:?}")),
    }
}

fn build_config(cli: &Cli) -> Result<Config, String> {
    let mut builder = Config::builder();
    if let Some(path) = &cli.file {
        builder = builder.with_file(path);
    }
    if let Some(path) = &cli.dotenv {
        builder = builder.with_dotenv(path);
    }
    if let Some(prefix) = &cli.env_prefix {
        builder = builder.with_env_prefix(prefix.clone());
    }
    if !cli.overrides.is_empty() {
        let pairs = cli
            .overrides
            .iter()
            .map(|pair| split_pair(pair))
            .collect::<Result<Vec<_>, _>>()?;
        builder = builder.with_source(Overrides(pairs));
    }
    Ok(builder.build())
}

fn print_json(config: &Config, tree: bool) -> Result<(), serde_json::Error> {
    let rendered = if tree {
        serde_json::to_string_pretty(&config.tree())?
    } else {
        serde_json::to_string_pretty(&*config.current())?
    };
    println!("{rendered}");
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(build_config(&cli)?);
    config.reload()?;

    match cli.command {
        Commands::Show { tree } => print_json(&config, tree)?,
        Commands::Get { key } => match config.value(&key) {
            Some(value) => println!("{value}"),
            None => return Err(layerconf::ConfigError::KeyNotFound { key }.into()),
        },
        Commands::Check { rules } => {
            let mut set = Rules::new();
            for pair in &rules {
                let (key, expression) = split_pair(pair)?;
                set.insert(key, Rule::parse(&expression));
            }
            config.validate(&set)?;
            println!("ok: {} rule(s) passed", set.len());
        }
        Commands::Watch { debounce_ms } => {
            config.on_change(|c| {
                if let Err(e) = print_json(c, false) {
                    tracing::error!(error = %e, "Failed to render configuration");
                }
            });
            let mut reload = config.watch(Duration::from_millis(debounce_ms))?;
            print_json(&config, false)?;

            tracing::info!(path = ?reload.path(), "Watching for changes");
            shutdown_signal().await;
            reload.stop();
            reload.join().await;
            tracing::info!("Shutdown complete");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
