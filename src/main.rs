mod app;
mod renderer;
mod simulate;

use anyhow::{Context, Result, bail};
use app::App;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vrt_experiment::{DirectorySink, ExperimentConfig};
use vrt_timing::{HighPrecisionTimer, ManualClock};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    headless: bool,
    fast: bool,
    seed: Option<u64>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => args.config = Some(raw.next().context("--config needs a path")?.into()),
            "--out" => args.out_dir = Some(raw.next().context("--out needs a directory")?.into()),
            "--seed" => {
                let value = raw.next().context("--seed needs a number")?;
                args.seed = Some(value.parse().with_context(|| format!("bad seed {value:?}"))?);
            }
            "--headless" => args.headless = true,
            "--fast" => args.fast = true,
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => ExperimentConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    let out_dir = args.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    if args.headless {
        let results = if args.fast {
            simulate::run_headless(config, ManualClock::new(), &out_dir, args.seed)?
        } else {
            simulate::run_headless(config, HighPrecisionTimer::new(), &out_dir, args.seed)?
        };
        info!(pid = results.participant_id, "Headless session complete");
        return Ok(());
    }

    App::new(config, DirectorySink::new(out_dir))?.run()
}
