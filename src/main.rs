use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::StreamExt;

use reconcile_kit::beat::Beat;
use reconcile_kit::merge::{POD_SPEC, POD_SPEC_TAG};
use reconcile_kit::{config, net, observability};

#[derive(Parser)]
#[command(name = "reconcile-kit", about = "reconcile-kit - sync and merge tooling for controllers")]
struct Cli {
	/// Extra settings file layered over the system and user files
	#[arg(long, global = true, env = "RKIT_CONFIG")]
	config: Option<PathBuf>,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Merge a desired pod spec into a current one and print the result
	MergePodSpec {
		/// JSON file holding the current pod spec
		current: PathBuf,
		/// JSON file holding the desired pod spec
		desired: PathBuf,
		/// Print compact JSON
		#[arg(long)]
		compact: bool,
	},
	/// Suggest a free-looking port, private range by default
	SuggestPort {
		#[arg(long, default_value_t = *net::PRIVATE_PORTS.start())]
		start: u16,
		#[arg(long, default_value_t = *net::PRIVATE_PORTS.end())]
		stop: u16,
		/// Ports never suggested (repeat or comma separate)
		#[arg(long, value_delimiter = ',')]
		exclude: Vec<u16>,
	},
	/// Print beat ticks, one per configured interval
	Beat {
		/// Number of ticks printed before exiting
		#[arg(long, default_value_t = 1)]
		ticks: usize,
		/// Overrides the configured beat interval
		#[arg(long)]
		interval_secs: Option<u64>,
	},
	/// Validate and print the effective settings
	ShowConfig,
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
	let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
	serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let settings = match &cli.config {
		Some(path) => config::load_from(path)?,
		None => config::load()?,
	};
	let _observability = observability::init_observability(&settings)?;

	match cli.command {
		Commands::MergePodSpec {
			current,
			desired,
			compact,
		} => {
			let mut dst = read_json(&current)?;
			let src = read_json(&desired)?;
			POD_SPEC
				.merge(&POD_SPEC_TAG, &mut dst, &src)
				.context("merging pod specs")?;
			let out = if compact {
				serde_json::to_string(&dst)?
			} else {
				serde_json::to_string_pretty(&dst)?
			};
			println!("{}", out);
		}
		Commands::SuggestPort { start, stop, exclude } => {
			match net::random_port_in_range_excluding(start..=stop, &exclude) {
				Some(port) => println!("{}", port),
				None => anyhow::bail!("no port available in {}..={}", start, stop),
			}
		}
		Commands::Beat { ticks, interval_secs } => {
			let interval = interval_secs.map(Duration::from_secs).unwrap_or_else(|| settings.beat_interval());
			let (beat, stream) = Beat::new(interval)?;
			let (stop, shutdown) = watch::channel(false);
			let handle = beat.start(shutdown);

			let mut stream = stream.take(ticks);
			while let Some(tick) = stream.next().await {
				println!("{}", tick.at.to_rfc3339());
			}
			drop(stream);
			stop.send(true).ok();
			handle.await?;
		}
		Commands::ShowConfig => {
			settings.limiter().validate().context("invalid limiter settings")?;
			println!("{}", serde_json::to_string_pretty(&settings)?);
		}
	}

	Ok(())
}
