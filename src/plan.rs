//! ## Structure
//! A run plan is the explicit configuration handed to the pipeline.
//!
//! ```text
//! RunPlan
//!   ├── base_dir: PathBuf        (relative paths resolve against it)
//!   └── jobs: Vec<Job>
//!       ├── map_path
//!       ├── layers_path
//!       └── output_path          (tree listing path derives from it)
//! ```
//!
//! On disk a plan is YAML:
//!
//! ```text
//! PlanFile
//!   ├── outdir: Option<String>
//!   └── jobs: Vec<PlanJob>
//!       ├── map: String
//!       ├── layers: String
//!       └── output: Option<String>
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

use crate::errors::{CaptionError, CaptionResult};

const BATCH_OUTPUT_SUFFIX: &str = ".captions.json";
const TREE_SUFFIX: &str = ".tree.txt";

fn json_suffix() -> &'static Regex {
    static JSON_SUFFIX: OnceLock<Regex> = OnceLock::new();
    JSON_SUFFIX.get_or_init(|| Regex::new(r"(?i)\.json$").expect("valid suffix pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub map_path: PathBuf,
    pub layers_path: PathBuf,
    pub output_path: PathBuf,
}

impl Job {
    pub fn new(
        map_path: impl Into<PathBuf>,
        layers_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Job {
            map_path: map_path.into(),
            layers_path: layers_path.into(),
            output_path: output_path.into(),
        }
    }

    /// A batch job writes `<map base name>.captions.json`.
    pub fn from_batch_pair(pair: &BatchPair, outdir: Option<&str>) -> Self {
        Job::new(
            &pair.map_path,
            &pair.layers_path,
            batch_output_path(&pair.map_path, outdir),
        )
    }

    pub fn tree_path(&self) -> PathBuf {
        tree_path(&self.output_path)
    }
}

/// One `MAP:LAYERS` token of a batch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPair {
    pub map_path: String,
    pub layers_path: String,
}

impl BatchPair {
    /// Splits on `:` and uses the first two fields; both must be non-empty.
    pub fn parse(token: &str) -> Option<Self> {
        let mut fields = token.split(':');
        let map_path = fields.next().filter(|s| !s.is_empty())?;
        let layers_path = fields.next().filter(|s| !s.is_empty())?;
        Some(BatchPair {
            map_path: map_path.to_string(),
            layers_path: layers_path.to_string(),
        })
    }

    /// Parses every token, warning about and skipping unusable ones.
    pub fn parse_all<S: AsRef<str>>(tokens: &[S]) -> Vec<Self> {
        tokens
            .iter()
            .filter_map(|token| {
                let token = token.as_ref();
                let pair = BatchPair::parse(token);
                if pair.is_none() {
                    warn!("Skipping batch token '{}': expected MAP:LAYERS", token);
                }
                pair
            })
            .collect()
    }
}

/// Output path for a batch pair.
///
/// The file is named after the map file's last path segment (`/` or `\`
/// separated) without its `.json` extension. It goes into `outdir` when given,
/// otherwise next to the map file.
pub fn batch_output_path(map_path: &str, outdir: Option<&str>) -> String {
    let normalized = map_path.replace('\\', "/");
    let file_name = normalized.rsplit('/').next().unwrap_or_default();
    let base_name = json_suffix().replace(file_name, "");

    let dir = match outdir.filter(|dir| !dir.is_empty()) {
        Some(dir) => dir,
        None => map_path
            .rfind('/')
            .map(|idx| &map_path[..=idx])
            .unwrap_or_default(),
    };

    let output_name = format!("{}{}", base_name, BATCH_OUTPUT_SUFFIX);
    if dir.is_empty() {
        output_name
    } else if dir.ends_with('/') || dir.ends_with('\\') {
        format!("{}{}", dir, output_name)
    } else {
        format!("{}/{}", dir, output_name)
    }
}

/// Tree listing path next to a JSON output: a `.json` suffix becomes
/// `.tree.txt`, any other name gets `.tree.txt` appended.
pub fn tree_path(output_path: &Path) -> PathBuf {
    let output = output_path.to_string_lossy();
    if json_suffix().is_match(&output) {
        PathBuf::from(json_suffix().replace(&output, TREE_SUFFIX).into_owned())
    } else {
        PathBuf::from(format!("{}{}", output, TREE_SUFFIX))
    }
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub base_dir: PathBuf,
    pub jobs: Vec<Job>,
}

impl RunPlan {
    pub fn single(base_dir: impl Into<PathBuf>, job: Job) -> Self {
        RunPlan {
            base_dir: base_dir.into(),
            jobs: vec![job],
        }
    }

    pub fn batch(base_dir: impl Into<PathBuf>, pairs: &[BatchPair], outdir: Option<&str>) -> Self {
        RunPlan {
            base_dir: base_dir.into(),
            jobs: pairs
                .iter()
                .map(|pair| Job::from_batch_pair(pair, outdir))
                .collect(),
        }
    }

    /// Loads a YAML plan; its paths are relative to the plan file.
    pub fn from_yaml_file(path: &Path) -> CaptionResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CaptionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let plan_file: PlanFile =
            serde_yaml::from_str(&content).map_err(|e| CaptionError::PlanFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if plan_file.jobs.is_empty() {
            return Err(CaptionError::PlanFile {
                path: path.to_path_buf(),
                reason: "plan has no jobs".to_string(),
            });
        }

        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(plan_file.into_run_plan(base_dir))
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Every input file of every job, resolved and without duplicates.
    pub fn input_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::new();
        for job in &self.jobs {
            for path in [&job.map_path, &job.layers_path] {
                let resolved = self.resolve(path);
                if !files.contains(&resolved) {
                    files.push(resolved);
                }
            }
        }
        files
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PlanFile {
    #[serde(default)]
    pub outdir: Option<String>,
    pub jobs: Vec<PlanJob>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlanJob {
    pub map: String,
    pub layers: String,
    #[serde(default)]
    pub output: Option<String>,
}

impl PlanFile {
    pub fn into_run_plan(self, base_dir: PathBuf) -> RunPlan {
        let outdir = self.outdir;
        let jobs = self
            .jobs
            .into_iter()
            .map(|job| {
                let output = job
                    .output
                    .unwrap_or_else(|| batch_output_path(&job.map, outdir.as_deref()));
                Job::new(job.map, job.layers, output)
            })
            .collect();
        RunPlan { base_dir, jobs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_pair_parsing() {
        assert_eq!(
            BatchPair::parse("maps/map_1.json:layers.json"),
            Some(BatchPair {
                map_path: "maps/map_1.json".to_string(),
                layers_path: "layers.json".to_string(),
            })
        );
        assert_eq!(
            BatchPair::parse("a.json:b.json:ignored").map(|p| p.layers_path),
            Some("b.json".to_string())
        );
        assert_eq!(BatchPair::parse("map.json"), None);
        assert_eq!(BatchPair::parse(":layers.json"), None);
        assert_eq!(BatchPair::parse("map.json:"), None);
    }

    #[test]
    fn test_parse_all_skips_bad_tokens() {
        let pairs = BatchPair::parse_all(&["a.json:l.json", "junk", "b.json:l.json"]);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].map_path, "b.json");
    }

    #[test]
    fn test_batch_output_next_to_map() {
        assert_eq!(
            batch_output_path("maps/map_1.json", None),
            "maps/map_1.captions.json"
        );
        assert_eq!(batch_output_path("map_1.JSON", None), "map_1.captions.json");
        assert_eq!(batch_output_path("data/map_2", Some("")), "data/map_2.captions.json");
    }

    #[test]
    fn test_batch_output_in_outdir() {
        assert_eq!(
            batch_output_path("maps/map_1.json", Some("out")),
            "out/map_1.captions.json"
        );
        assert_eq!(
            batch_output_path("maps/map_1.json", Some("out/")),
            "out/map_1.captions.json"
        );
        assert_eq!(
            batch_output_path(r"maps\win\map_3.json", Some(r"out\")),
            r"out\map_3.captions.json"
        );
    }

    #[test]
    fn test_tree_path() {
        assert_eq!(tree_path(Path::new("out/map.json")), PathBuf::from("out/map.tree.txt"));
        assert_eq!(tree_path(Path::new("MAP.Json")), PathBuf::from("MAP.tree.txt"));
        assert_eq!(tree_path(Path::new("out/map")), PathBuf::from("out/map.tree.txt"));
        assert_eq!(
            tree_path(Path::new("out/map.captions.json")),
            PathBuf::from("out/map.captions.tree.txt")
        );
    }

    #[test]
    fn test_batch_run_plan() {
        let pairs = BatchPair::parse_all(&["maps/a.json:layers.json", "b.json:layers.json"]);
        let plan = RunPlan::batch("/work", &pairs, None);
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.jobs[0].output_path, PathBuf::from("maps/a.captions.json"));
        assert_eq!(plan.jobs[1].output_path, PathBuf::from("b.captions.json"));
        assert_eq!(
            plan.resolve(&plan.jobs[0].map_path),
            PathBuf::from("/work/maps/a.json")
        );
        assert_eq!(plan.input_files().len(), 3);
    }

    #[test]
    fn test_plan_file_deserialization() {
        let yaml_str = r#"
outdir: out
jobs:
  - map: maps/map_1.json
    layers: layers.json
  - map: maps/map_2.json
    layers: layers.json
    output: custom/map_2.json
"#;

        let plan_file: PlanFile = serde_yaml::from_str(yaml_str).unwrap();
        let plan = plan_file.into_run_plan(PathBuf::from("project"));
        assert_eq!(plan.jobs[0].output_path, PathBuf::from("out/map_1.captions.json"));
        assert_eq!(plan.jobs[1].output_path, PathBuf::from("custom/map_2.json"));
        assert_eq!(plan.jobs[1].tree_path(), PathBuf::from("custom/map_2.tree.txt"));
    }

    #[test]
    fn test_plan_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plan_path = dir.path().join("plan.yaml");
        std::fs::write(&plan_path, "jobs:\n  - map: m.json\n    layers: l.json\n").unwrap();

        let plan = RunPlan::from_yaml_file(&plan_path).expect("plan loads");
        assert_eq!(plan.base_dir, dir.path());
        assert_eq!(plan.resolve(&plan.jobs[0].map_path), dir.path().join("m.json"));
    }

    #[test]
    fn test_plan_file_without_jobs_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plan_path = dir.path().join("plan.yaml");
        std::fs::write(&plan_path, "jobs: []\n").unwrap();

        let err = RunPlan::from_yaml_file(&plan_path).unwrap_err();
        assert!(matches!(err, CaptionError::PlanFile { .. }));
    }
}
