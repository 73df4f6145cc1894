use std::path::{Path, PathBuf};

use aggkit_core::Bin;
use aggkit_udf::catalog::{AGG_PACKAGE, SELECT_AGG_RECORDS};
use serde::{Deserialize, Serialize};

use crate::error::ExampleError;

/// Current config version. Bump this when the file shape changes.
pub const CURRENT_VERSION: u32 = 1;

/// Settings for one run of the example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleConfig {
    /// Schema version. Missing or 0 means a pre-versioned file.
    pub config_version: u32,
    pub namespace: String,
    pub set: String,
    /// Directory holding `<package>.lua`.
    pub udf_dir: PathBuf,
    pub package: String,
    pub function: String,
    pub index: String,
    pub key_prefix: String,
    /// Bin the index and the query filter are on.
    pub filter_bin: String,
    /// Bin the results are grouped by.
    pub group_bin: String,
    pub record_count: usize,
    pub filter_value: i64,
    /// Inclusive range `filter_bin` values are drawn from.
    pub filter_range: (i64, i64),
    /// Inclusive range `group_bin` values are drawn from.
    pub group_range: (i64, i64),
    pub seed: Option<u64>,
    pub nodes: usize,
    /// Truncate the set before writing.
    pub truncate: bool,
}

impl Default for ExampleConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            namespace: "test".into(),
            set: "demoset".into(),
            udf_dir: PathBuf::from("udf"),
            package: AGG_PACKAGE.into(),
            function: SELECT_AGG_RECORDS.into(),
            index: "aggindex".into(),
            key_prefix: "aggkey".into(),
            filter_bin: "test_id".into(),
            group_bin: "group_id".into(),
            record_count: 100,
            filter_value: 102,
            filter_range: (100, 105),
            group_range: (1, 3),
            seed: None,
            nodes: 2,
            truncate: false,
        }
    }
}

/// `<config_dir>/aggkit/config.json`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("aggkit").join("config.json"))
}

impl ExampleConfig {
    /// Load from `explicit` if given, else from the default path when that
    /// file exists, else fall back to the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ExampleError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ExampleError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExampleError::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let json: serde_json::Value = serde_json::from_str(&contents)?;
        let on_disk_version = json
            .get("config_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        if on_disk_version > u64::from(CURRENT_VERSION) {
            return Err(ExampleError::Config(format!(
                "config_version {on_disk_version} is newer than this build supports ({CURRENT_VERSION})"
            )));
        }

        let mut config: ExampleConfig = serde_json::from_value(json)?;
        config.config_version = CURRENT_VERSION;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn package_path(&self) -> PathBuf {
        self.udf_dir.join(format!("{}.lua", self.package))
    }

    pub fn validate(&self) -> Result<(), ExampleError> {
        let invalid = |msg: String| Err(ExampleError::Config(msg));

        for (what, value) in [
            ("namespace", &self.namespace),
            ("set", &self.set),
            ("package", &self.package),
            ("function", &self.function),
            ("index", &self.index),
            ("key_prefix", &self.key_prefix),
        ] {
            if value.is_empty() {
                return invalid(format!("{what} is empty"));
            }
        }
        for bin in [&self.filter_bin, &self.group_bin] {
            Bin::validate_name(bin).map_err(|e| ExampleError::Config(e.to_string()))?;
        }
        if self.record_count == 0 {
            return invalid("record_count must be at least 1".into());
        }
        if self.nodes == 0 {
            return invalid("nodes must be at least 1".into());
        }
        for (what, (lo, hi)) in [
            ("filter_range", self.filter_range),
            ("group_range", self.group_range),
        ] {
            if lo > hi {
                return invalid(format!("{what} [{lo}, {hi}] is inverted"));
            }
        }
        let (lo, hi) = self.filter_range;
        if !(lo..=hi).contains(&self.filter_value) {
            return invalid(format!(
                "filter_value {} is outside filter_range [{lo}, {hi}]",
                self.filter_value
            ));
        }
        Ok(())
    }
}
