//! Pipeline configuration
//!
//! Everything a single run needs is supplied up front and never mutated
//! while the run is in flight.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;

/// File name of the materialized script inside a workspace run directory
pub const SCRIPT_FILE: &str = "script.py";

/// File name of the materialized dependency manifest
pub const MANIFEST_FILE: &str = "requirements.txt";

/// File name of the captured output log
pub const LOG_FILE: &str = "output.txt";

/// Configuration of one pipeline run
///
/// Paths are used as given. The environment root is owned exclusively by
/// the run for its whole duration; two configurations sharing a root must
/// not run at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Logical identifier, used for tracing and default layouts
    pub run_id: String,

    /// Source text of the script to execute
    pub script: String,

    /// Dependency manifest text, one package per line
    pub manifest: String,

    /// Base runtime executable used to create the environment
    pub base_runtime: PathBuf,

    /// Root directory of the isolated environment
    pub env_root: PathBuf,

    /// Where the script is written before execution
    pub script_path: PathBuf,

    /// Where the manifest is written before installation
    pub manifest_path: PathBuf,

    /// Append-only log collecting output of every process stage
    pub log_path: PathBuf,
}

impl PipelineConfig {
    /// Creates a configuration using the conventional workspace layout
    ///
    /// The environment root is `<workspace>/<run_id>` and the script,
    /// manifest and log live inside it, so teardown removes them as well.
    ///
    /// # Arguments
    /// * `run_id` - Run identifier, also the directory name under `workspace`
    /// * `base_runtime` - Base runtime executable
    /// * `workspace` - Parent directory for run environments
    /// * `script` - Script source text
    /// * `manifest` - Dependency manifest text
    pub fn in_workspace(
        run_id: impl Into<String>,
        base_runtime: impl Into<PathBuf>,
        workspace: impl AsRef<Path>,
        script: impl Into<String>,
        manifest: impl Into<String>,
    ) -> Self {
        let run_id = run_id.into();
        let env_root = workspace.as_ref().join(&run_id);

        Self {
            script_path: env_root.join(SCRIPT_FILE),
            manifest_path: env_root.join(MANIFEST_FILE),
            log_path: env_root.join(LOG_FILE),
            run_id,
            script: script.into(),
            manifest: manifest.into(),
            base_runtime: base_runtime.into(),
            env_root,
        }
    }

    /// Generates a fresh run identifier
    pub fn generate_run_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Loads a configuration from a JSON pipeline definition
    ///
    /// The definition is validated before it is returned.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    ///
    /// Requires a run id usable as one directory name, every path set, an
    /// environment root that is neither a filesystem root nor climbs out
    /// through `..`, and the script, manifest, log and environment root to
    /// be pairwise distinct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run_id.trim().is_empty() {
            return Err(ConfigError::Empty("run_id"));
        }

        if !is_single_name(&self.run_id) {
            return Err(ConfigError::InvalidRunId(self.run_id.clone()));
        }

        let paths = [
            ("env_root", &self.env_root),
            ("script_path", &self.script_path),
            ("manifest_path", &self.manifest_path),
            ("log_path", &self.log_path),
        ];

        if self.base_runtime.as_os_str().is_empty() {
            return Err(ConfigError::Empty("base_runtime"));
        }

        for (name, path) in &paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Empty(*name));
            }
        }

        if !is_removable_root(&self.env_root) {
            return Err(ConfigError::UnsafeEnvRoot(self.env_root.clone()));
        }

        for (i, (first, a)) in paths.iter().enumerate() {
            for (second, b) in &paths[i + 1..] {
                if a == b {
                    return Err(ConfigError::Overlap {
                        first: *first,
                        second: *second,
                        path: a.to_path_buf(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Whether the captured log is removed together with the environment
    pub fn log_inside_env(&self) -> bool {
        self.log_path.starts_with(&self.env_root)
    }
}

/// Exactly one normal path component: no separators, `.`, `..` or root
fn is_single_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn is_removable_root(path: &Path) -> bool {
    let mut named = false;
    for component in path.components() {
        match component {
            Component::ParentDir => return false,
            Component::Normal(_) => named = true,
            _ => {}
        }
    }
    named
}
