use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::{json, Value};

use signal_filter::filter::{CombinationPolicy, ConfigLoader, Filter, FilterHandle, Signal};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Filter a batch of signals read from a file
    Run {
        /// Path to the filter configuration (YAML or JSON)
        #[arg(short, long)]
        config: String,

        /// Signals as a JSON array or one JSON value per line
        #[arg(short, long)]
        input: String,

        /// Override the configured operator (any | all)
        #[arg(short, long)]
        operator: Option<CombinationPolicy>,
    },
    /// Compile a configuration and report its conditions
    Check {
        /// Path to the filter configuration
        #[arg(short, long)]
        config: String,
    },
    /// Serve the filter over HTTP
    Serve {
        /// Path to the filter configuration
        #[arg(short, long)]
        config: String,

        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            config,
            input,
            operator,
        } => {
            let mut config = ConfigLoader::load(&config)
                .with_context(|| format!("Failed to load config from {}", config))?;
            if let Some(operator) = operator {
                config.operator = operator;
            }
            let filter = Filter::new(config)?;

            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read signals from {}", input))?;
            let signals = read_signals(&content)?;
            log::info!("Loaded {} signals from {}", signals.len(), input);

            let mut emit = |batch: Vec<Signal>, output: &str| {
                println!("{}", json!({ "output": output, "signals": batch }));
            };
            let summary = filter.process_signals(signals, &mut emit);
            eprintln!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Check { config } => {
            let config = ConfigLoader::load(&config)
                .with_context(|| format!("Failed to load config from {}", config))?;
            let filter = Filter::new(config)?;

            println!(
                "OK: {} conditions, operator {}",
                filter.conditions().len(),
                filter.operator()
            );
            for condition in filter.conditions().iter() {
                println!("  #{} {}", condition.index(), condition.source());
            }
        }
        Commands::Serve { config, port } => {
            let config = ConfigLoader::load(&config)
                .with_context(|| format!("Failed to load config from {}", config))?;
            let handle = FilterHandle::new(config)?;

            signal_filter::server::serve(handle, port)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    Ok(())
}

/// Accept either a JSON array of signals or JSON lines
fn read_signals(content: &str) -> anyhow::Result<Vec<Signal>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed).context("Invalid JSON array")?;
        return Ok(values.into_iter().map(Signal::from).collect());
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<Value>(line)
                .map(Signal::from)
                .with_context(|| format!("Invalid JSON on line {}", n + 1))
        })
        .collect()
}
