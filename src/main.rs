//! `iconfont-build`: builds every configured icon collection into fonts.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use iconfont_builder::{BuildConfig, BuildOutcome, CancellationToken, IconFontPipeline};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Icon font build step
///
/// Examples:
///   iconfont-build                              # Build everything in iconfont.json
///   iconfont-build --config icons/fonts.json    # Use another config file
///   iconfont-build --collection outline --clean # Rebuild one collection from scratch
#[derive(Parser, Debug)]
#[clap(
    name = "iconfont-build",
    version,
    about = "Builds SVG icon collections into SVG, TTF, EOT, WOFF and WOFF2 fonts"
)]
struct CliArgs {
    /// JSON build configuration.
    #[clap(long, short = 'c', default_value = "iconfont.json")]
    config: PathBuf,

    /// Only build the named collection. Repeatable.
    #[clap(long = "collection", value_name = "NAME")]
    collections: Vec<String>,

    /// Remove each collection's output directory before building.
    #[clap(long)]
    clean: bool,

    /// Log at debug level unless RUST_LOG is set.
    #[clap(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Returns whether every selected collection built.
async fn run(args: CliArgs) -> anyhow::Result<bool> {
    let mut config = BuildConfig::load(&args.config)
        .await
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    config.clean_output |= args.clean;
    let selected = config.select(&args.collections)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling builds");
                cancel.cancel();
            }
        });
    }

    let mut ok = true;
    let mut jobs = Vec::with_capacity(selected.len());
    for collection in selected {
        match collection.load_job().await {
            Ok(job) => jobs.push(job),
            Err(err) => {
                error!("{err}");
                ok = false;
            }
        }
    }

    let pipeline = IconFontPipeline::new(config.pipeline_config());
    let summary = pipeline.build_all(jobs, &cancel).await;
    for report in &summary.reports {
        match &report.result {
            Ok(BuildOutcome::Built(built)) => info!(
                collection = %report.collection,
                glyphs = built.glyphs.len(),
                skipped = built.skipped.len(),
                dir = %built.output_dir.display(),
                "done"
            ),
            Ok(BuildOutcome::Empty { .. }) => {
                info!(collection = %report.collection, "no icons, nothing written")
            }
            Err(err) => error!("{err}"),
        }
    }

    Ok(ok && summary.is_success())
}
