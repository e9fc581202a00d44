use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use tracing::{debug, error, info, warn};

use crate::annotate::{annotate_groups, GROUPS_KEY};
use crate::common::write_string_to_file;
use crate::errors::{CaptionError, CaptionResult};
use crate::layers::{build_layer_meta_map, LayerMetaMap, LayersDocument};
use crate::plan::{Job, RunPlan};
use crate::tree::build_tree_lines;

/// What a processed job wrote.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub output_path: PathBuf,
    /// `None` when the tree listing could not be written.
    pub tree_path: Option<PathBuf>,
    pub indexed_layers: usize,
    pub tree_lines: usize,
}

/// Loads a JSON file, keeping object key order.
pub fn read_json(path: &Path) -> CaptionResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|source| CaptionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CaptionError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Injects captions into a map document in place and returns the tree
/// listing of its groups.
///
/// A document without a `groups` array is left as it is and renders no lines.
pub fn inject_captions(map_document: &mut Value, index: &LayerMetaMap) -> Vec<String> {
    match map_document.get_mut(GROUPS_KEY) {
        Some(Value::Array(groups)) => {
            annotate_groups(groups, index);
            build_tree_lines(groups)
        }
        _ => {
            debug!("Map document has no groups to annotate");
            Vec::new()
        }
    }
}

/// Runs one job end to end: read both inputs, annotate, write the JSON
/// output and then the tree listing.
///
/// Input and JSON output failures are fatal. A tree listing that cannot be
/// written only produces a warning.
pub fn process_job(plan: &RunPlan, job: &Job) -> CaptionResult<JobReport> {
    info!(
        "Injecting captions from {} into {}",
        job.layers_path.display(),
        job.map_path.display()
    );

    let mut map_document = read_json(&plan.resolve(&job.map_path))?;
    let layers_document = read_json(&plan.resolve(&job.layers_path))?;
    let index = build_layer_meta_map(&LayersDocument::from_value(&layers_document));

    let lines = inject_captions(&mut map_document, &index);
    debug!("Rendered {} tree lines", lines.len());

    let json = serde_json::to_string_pretty(&map_document)?;
    let output_path = plan.resolve(&job.output_path);
    write_string_to_file(&output_path, &json).map_err(|source| CaptionError::Write {
        path: output_path.clone(),
        source,
    })?;
    println!("Wrote {}", job.output_path.display());

    let tree_path = job.tree_path();
    let tree_written = match write_string_to_file(&plan.resolve(&tree_path), &lines.join("\n")) {
        Ok(()) => {
            println!("Wrote {}", tree_path.display());
            Some(tree_path)
        }
        Err(e) => {
            warn!("Failed to write tree file {}: {}", tree_path.display(), e);
            None
        }
    };

    Ok(JobReport {
        output_path,
        tree_path: tree_written,
        indexed_layers: index.len(),
        tree_lines: lines.len(),
    })
}

/// Processes every job in order. The first failure aborts the run.
pub fn run_plan(plan: &RunPlan) -> CaptionResult<Vec<JobReport>> {
    info!("Running {} job(s)", plan.jobs.len());
    plan.jobs.iter().map(|job| process_job(plan, job)).collect()
}

/// Re-runs the plan whenever one of its input files is modified.
///
/// Blocks until the watcher shuts down. Failed re-runs are logged and the
/// watch continues.
pub fn watch_for_changes(plan: &RunPlan) -> CaptionResult<()> {
    info!("Watching for changes");

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
    for file in plan.input_files() {
        debug!("Watching {}", file.display());
        watcher.watch(&file, RecursiveMode::NonRecursive)?;
    }

    while let Ok(event) = rx.recv() {
        match event {
            Ok(event) => {
                if let EventKind::Modify(_) = event.kind {
                    debug!("File modified {:?}", event.paths);
                    info!("Change detected, re-running");
                    if let Err(e) = run_plan(plan) {
                        error!("Run failed: {}", e);
                    }
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        }
    }

    Ok(())
}
