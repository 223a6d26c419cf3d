//! Configuration types for migx-rs.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! behaviour of the plain command line. Flags given on the command line take
//! precedence over values loaded here.

use serde::Deserialize;

/// Default location of the ImageNet class-index to name map.
pub const DEFAULT_LABELS_URL: &str = "https://s3.amazonaws.com/outcome-blog/imagenet/labels.json";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Compiled-graph engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Bench runner configuration.
    #[serde(default)]
    pub bench: BenchConfig,

    /// Validation runner configuration.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Label table configuration.
    #[serde(default)]
    pub labels: LabelsConfig,
}

/// Compiled-graph engine configuration.
#[derive(Debug, Default, Deserialize)]
pub struct EngineConfig {
    /// Execution target (`gpu` or `cpu`). Unset means the build's default.
    #[serde(default)]
    pub target: Option<String>,
}

/// Bench runner configuration.
#[derive(Debug, Deserialize)]
pub struct BenchConfig {
    /// Name of the compiled graph's input parameter.
    #[serde(default = "default_bench_input")]
    pub input_name: String,

    /// Feed tensor of the TensorFlow session.
    #[serde(default = "default_tf_input")]
    pub tf_input: String,

    /// Fetch tensor of the TensorFlow session.
    #[serde(default = "default_tf_output")]
    pub tf_output: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            input_name: default_bench_input(),
            tf_input: default_tf_input(),
            tf_output: default_tf_output(),
        }
    }
}

/// Validation runner configuration.
#[derive(Debug, Deserialize)]
pub struct ValidationConfig {
    /// Name of the compiled graph's input parameter.
    #[serde(default = "default_validation_input")]
    pub input_name: String,

    /// Manifest of `filename label` lines.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Number of records between progress log lines.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            input_name: default_validation_input(),
            manifest: default_manifest(),
            progress_every: default_progress_every(),
        }
    }
}

/// Label table configuration.
#[derive(Debug, Deserialize)]
pub struct LabelsConfig {
    /// Remote JSON label map.
    #[serde(default = "default_labels_url")]
    pub url: String,

    /// Local JSON label map, used instead of `url` when set.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            url: default_labels_url(),
            path: None,
        }
    }
}

fn default_bench_input() -> String {
    "input".to_string()
}

fn default_tf_input() -> String {
    "import/input:0".to_string()
}

fn default_tf_output() -> String {
    "import/MobilenetV2/Predictions/Reshape_1:0".to_string()
}

fn default_validation_input() -> String {
    "0".to_string()
}

fn default_manifest() -> String {
    "val.txt".to_string()
}

fn default_progress_every() -> usize {
    1000
}

fn default_labels_url() -> String {
    DEFAULT_LABELS_URL.to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> crate::error::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        if config.validation.progress_every == 0 {
            return Err(crate::error::MigxError::config(
                "validation.progress_every must be at least 1",
            ));
        }
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&std::path::Path>) -> crate::error::Result<Self> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_command_line_behaviour() {
        let config = Config::default();
        assert_eq!(config.bench.input_name, "input");
        assert_eq!(config.validation.input_name, "0");
        assert_eq!(config.validation.manifest, "val.txt");
        assert_eq!(config.labels.url, DEFAULT_LABELS_URL);
        assert!(config.labels.path.is_none());
        assert!(config.engine.target.is_none());
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = r#"
engine:
  target: cpu
validation:
  manifest: /data/imagenet/val.txt
labels:
  path: labels.json
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.engine.target.as_deref(), Some("cpu"));
        assert_eq!(config.validation.manifest, "/data/imagenet/val.txt");
        assert_eq!(config.validation.input_name, "0");
        assert_eq!(config.validation.progress_every, 1000);
        assert_eq!(config.labels.path.as_deref(), Some("labels.json"));
        assert_eq!(config.bench.tf_output, "import/MobilenetV2/Predictions/Reshape_1:0");
    }

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config.bench.tf_input, "import/input:0");
    }

    #[test]
    fn zero_progress_interval_is_rejected() {
        let err = Config::from_yaml_str("validation:\n  progress_every: 0\n").unwrap_err();
        assert!(err.to_string().contains("progress_every"));
    }
}
