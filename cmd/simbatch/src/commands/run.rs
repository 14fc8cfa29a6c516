//! Run command implementation.

use crate::builtins;
use crate::model_file::ModelFile;
use anyhow::{Context, Result};
use serde::Serialize;
use simbatch_graph::{Batch, Client, ComputationContext, Model};
use std::ops::Range;
use std::sync::Arc;
use tracing::info;

/// One batch plus its output fingerprint.
#[derive(Debug, Serialize)]
struct Report<'a> {
    fingerprint: String,
    #[serde(flatten)]
    batch: &'a Batch,
}

/// Runs the run command.
pub async fn run(
    model_path: &str,
    target: &str,
    batches: Range<u64>,
    seed: Option<u64>,
    batch_size: Option<usize>,
    format: &str,
) -> Result<()> {
    info!("Loading model: {}", model_path);
    let file = ModelFile::load(model_path)?;

    let mut config = file.context;
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(batch_size) = batch_size {
        config = config.with_batch_size(batch_size);
    }
    if config.seed.is_none() {
        info!("No master seed given; batches are not reproducible");
    }

    let context = ComputationContext::new(config).with_context(|| "Invalid computation context")?;
    let model = Model::from_spec(&file.model, &builtins::registry(), Arc::new(context))
        .with_context(|| format!("Failed to build model '{}'", file.model.name))?;

    info!(
        "Computing '{}' for batches {}..{}",
        target, batches.start, batches.end
    );
    let results = Client::new()
        .compute_batches(Arc::new(model), target, batches)
        .await
        .with_context(|| format!("Failed to compute '{target}'"))?;

    println!("{}", render(&results, format)?);
    info!("Computed {} batch(es)", results.len());
    Ok(())
}

fn render(batches: &[Batch], format: &str) -> Result<String> {
    let reports: Vec<Report<'_>> = batches
        .iter()
        .map(|batch| Report {
            fingerprint: format!("{:016x}", batch.fingerprint()),
            batch,
        })
        .collect();

    match format.to_lowercase().as_str() {
        "json" => serde_json::to_string_pretty(&reports).with_context(|| "Failed to render JSON"),
        "yaml" | "yml" => serde_yaml::to_string(&reports).with_context(|| "Failed to render YAML"),
        _ => anyhow::bail!("Unknown output format: {format}. Use 'json' or 'yaml'."),
    }
}
