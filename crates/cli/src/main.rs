//! ffwrap: run one ffmpeg encode and log its progress.
//!
//! ```bash
//! ffwrap -i input.mov -s video_codec=libx264 --raw -y output.mp4
//! ```

mod args;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ffwrap_core::{
    load_config_or_default, metrics, CommandAssembler, CommandTable, ProgressRecord, Toolkit,
};

use args::{split_raw, Args};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = load_config_or_default(args.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    if let Some(strategy) = args.strategy {
        config.progress.strategy = strategy.into();
    }

    let mut toolkit = Toolkit::new(config).context("Configuration validation failed")?;
    toolkit
        .validate()
        .await
        .context("ffmpeg binary is not usable")?;
    info!(
        ffmpeg = %toolkit.config().ffmpeg.binary.display(),
        strategy = toolkit.config().progress.strategy.as_str(),
        "Configuration loaded"
    );

    // Output options
    let table = CommandTable::default();
    let mut assembler = CommandAssembler::new(&table);
    for (name, value) in &args.options {
        assembler.set(name.as_str(), value.as_str());
    }
    for raw in &args.raw {
        let (flag, value) = split_raw(raw);
        assembler.add_command(flag, value);
    }
    let output_commands = assembler.assemble().context("Invalid output options")?;

    let handler = toolkit
        .progress_handler(args.expected_duration.map(Duration::from_secs_f64))
        .await
        .context("Failed to create progress handler")?;
    info!("Using {} progress", handler.name());

    let mut process = toolkit.process();
    for input in &args.inputs {
        process.add_input(input);
    }
    process.add_output(&args.output, output_commands);
    process.attach(handler, Some(Box::new(log_progress)))?;

    process
        .execute(args.blocking)
        .await
        .context("Failed to run ffmpeg")?;

    let reports = process
        .complete_process()
        .await
        .context("ffmpeg did not produce valid output")?;
    info!(
        runtime_ms = process.runtime().as_millis() as u64,
        outputs = reports.len(),
        "Encode finished"
    );
    println!("{}", serde_json::to_string_pretty(&reports)?);

    if args.metrics {
        print_metrics()?;
    }
    Ok(())
}

fn log_progress(record: &ProgressRecord) {
    info!(
        status = %record.status,
        percentage = record.percentage,
        frame = record.frame,
        fps = record.fps,
        run_time = record.run_time,
        "Progress"
    );
    if let Some(ref message) = record.error_message {
        error!("ffmpeg: {}", message);
    }
}

fn print_metrics() -> Result<()> {
    let registry = Registry::new();
    metrics::register_metrics(&registry).context("Failed to register metrics")?;
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    print!("{}", String::from_utf8_lossy(&buffer));
    Ok(())
}
