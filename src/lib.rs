pub mod cli;
pub mod convert;
pub mod delimiter;
pub mod detect;
pub mod error;
pub mod format;
pub mod inference;
pub mod options;
pub mod report;
pub mod sampler;

use std::{env, sync::OnceLock, time::Instant};

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use log::{LevelFilter, error, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("qcparser", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Detect(args) => run_operation("detect", || detect::execute(&args)),
        Commands::Convert(args) => run_operation("convert", || convert::execute(&args)),
        Commands::Version => {
            println!("qcparser {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };
    if let Err(err) = &result {
        error::emit_error_envelope(err);
    }
    result
}

fn run_operation<F>(name: &str, op: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let start_clock = Utc::now();
    let start_instant = Instant::now();
    let result = op();
    let end_clock = Utc::now();
    let duration_secs = start_instant.elapsed().as_secs_f64();
    let start_str = start_clock.to_rfc3339_opts(SecondsFormat::Millis, true);
    let end_str = end_clock.to_rfc3339_opts(SecondsFormat::Millis, true);

    match &result {
        Ok(_) => info!(
            "Operation '{name}' completed (status=ok)\nstart: {start_str}\nend: {end_str}\nduration_secs: {duration_secs:.3}"
        ),
        Err(err) => error!(
            "Operation '{name}' failed (status=error)\nstart: {start_str}\nend: {end_str}\nduration_secs: {duration_secs:.3}\nerror: {err:?}"
        ),
    }

    result
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
