use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use lci_matrix::async_io::fingerprint_directory_async;
use lci_matrix::{
    CorrectionTable, JsonDirectorySource, MemoryStore, Pipeline, PipelineConfig, verify_manifest,
};
use log::{error, info, warn};

const USAGE: &str = "usage: lci-pipeline <leontief|sut> <config.json> <source-dir> [corrections.json]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Leontief,
    Sut,
}

struct Args {
    mode: Mode,
    config: PathBuf,
    source_dir: PathBuf,
    corrections: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let mode = match args.next().as_deref() {
        Some("leontief") => Mode::Leontief,
        Some("sut") => Mode::Sut,
        _ => bail!(USAGE),
    };
    let (Some(config), Some(source_dir)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };
    Ok(Args {
        mode,
        config: config.into(),
        source_dir: source_dir.into(),
        corrections: args.next().map(PathBuf::from),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let start = Instant::now();

    let config = PipelineConfig::from_json_file(&args.config)
        .with_context(|| format!("loading configuration {}", args.config.display()))?;
    let corrections = match &args.corrections {
        Some(path) => CorrectionTable::from_json_file(path)
            .with_context(|| format!("loading corrections {}", path.display()))?,
        None => {
            warn!("No correction table given; CAS fixes and synonyms are not applied");
            CorrectionTable::default()
        }
    };

    let fingerprint = fingerprint_directory_async(&args.source_dir).await?;
    info!("Source fingerprint: {fingerprint}");

    let out_dir = config.out_dir.clone();
    let mode = args.mode;
    let source = JsonDirectorySource::new(&args.source_dir).with_fingerprint(fingerprint);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut pipeline = Pipeline::new(config, corrections, MemoryStore::new())?;
        match mode {
            Mode::Leontief => pipeline.run_leontief(&source).map(|out| {
                info!("A is {:?}, F is {:?}", out.system.a.shape(), out.system.f.shape());
                out.report.warnings.len()
            }),
            Mode::Sut => pipeline.run_sut(&source).map(|out| {
                info!("V is {:?}, U is {:?}", out.system.v.shape(), out.system.u.shape());
                out.report.warnings.len()
            }),
        }
    })
    .await?;

    let warnings = match outcome {
        Ok(n) => n,
        Err(e) if e.is_unresolved_flows() => {
            error!("Run aborted, no matrices written: {e}");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let mismatched = verify_manifest(&out_dir)?;
    if !mismatched.is_empty() {
        bail!("artifacts changed after writing: {}", mismatched.join(", "));
    }
    info!(
        "Finished in {:?} with {warnings} warning(s); artifacts in {}",
        start.elapsed(),
        out_dir.display()
    );
    Ok(())
}
