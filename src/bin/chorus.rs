use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::time::Duration;

use chorus_core::config::SimulationConfig;
use chorus_core::sim::{hop_count_gradient, Simulator};
use chorus_core::vm::RoundContext;
use chorus_core::{ExecutionContext, Value};

#[derive(Parser)]
#[command(name = "chorus")]
#[command(about = "Aggregate-computing interpreter demo driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hop-count gradient demo on a simulated device network
    Simulate {
        /// TOML config file; CHORUS_* env vars override it
        #[arg(long)]
        config: Option<String>,

        /// Override the configured device count
        #[arg(long)]
        devices: Option<usize>,

        /// Override the configured round count
        #[arg(long)]
        rounds: Option<u32>,
    },
    /// Dump the demo program tree before and after one round
    Render,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            devices,
            rounds,
        } => {
            let mut config = SimulationConfig::load(config.as_deref())?;
            if let Some(devices) = devices {
                config.devices = devices;
            }
            if let Some(rounds) = rounds {
                config.rounds = rounds;
            }
            simulate(&config)
        }
        Commands::Render => render(),
    }
}

fn simulate(config: &SimulationConfig) -> Result<()> {
    let program = hop_count_gradient();
    let mut sim = Simulator::new(
        &program,
        config.devices,
        Duration::from_secs_f64(config.delta_time_secs),
        config.seed,
    );
    // Device 0 is the gradient source.
    sim.seed_environments(|index, env| {
        env.put("source", Value::Bool(index == 0));
    });
    sim.run(config.rounds)?;

    let results: BTreeMap<String, Option<Value>> = sim
        .results()
        .into_iter()
        .map(|(device, value)| (device.to_string(), value))
        .collect();
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn render() -> Result<()> {
    let mut program = hop_count_gradient();
    println!("before evaluation:\n{program}\n");

    let mut ctx = RoundContext::isolated(0);
    ctx.env_put("source", Value::Bool(true))?;
    ctx.begin_round(Duration::from_millis(500), chrono::Utc::now());
    program.eval(&mut ctx)?;
    ctx.commit_round();
    println!("after one round:\n{program}");
    Ok(())
}
