//! Configuration resolution for the CLI.
//!
//! Unique responsibility: merge every configuration source into one immutable
//! [`RunpodConfig`] value before any command runs.
//!
//! Overlay order (last-applied source wins per key):
//! 1. Built-in defaults
//! 2. YAML config file (`--config-file`)
//! 3. Environment (`RUNPOD_GRAPHQL_URL`, `RUNPOD_API_KEY`, via `.env` if present)
//! 4. Explicit CLI flags
//!
//! Keys are dotted paths (`machine.gpu_count`) mapping onto nested YAML
//! mappings. The known schema is the flattened serialization of
//! [`RunpodConfig::default()`], so the schema can never drift from the struct.
//! Under `--strict`, a source naming a key outside that schema fails
//! resolution instead of being ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fmt, fs, io};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Default GraphQL endpoint for the RunPod API.
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.runpod.io/graphql";

/// Environment variable overriding the GraphQL endpoint URL.
pub const ENV_GRAPHQL_URL: &str = "RUNPOD_GRAPHQL_URL";

/// Environment variable overriding the API key.
pub const ENV_API_KEY: &str = "RUNPOD_API_KEY";

// ============================================================================
// Configuration types
// ============================================================================

/// Cloud tier a pod is scheduled on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudType {
    /// Community cloud (cheaper, shared hosts).
    #[default]
    Community,
    /// Secure cloud (dedicated, vetted hosts).
    Secure,
}

impl fmt::Display for CloudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Community => f.write_str("COMMUNITY"),
            Self::Secure => f.write_str("SECURE"),
        }
    }
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// GraphQL endpoint URL.
    pub url: String,
    /// API key sent as the bearer credential. Required by every command.
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GRAPHQL_URL.to_string(),
            api_key: None,
        }
    }
}

/// Machine shape requested when creating a pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Pod name. Derived from the GPU type when unset.
    pub pod_name: Option<String>,
    /// Container image to run.
    pub image_name: Option<String>,
    /// GPU type id (e.g. "NVIDIA GeForce RTX 3080 Ti").
    pub gpu_type_id: Option<String>,
    /// Number of GPUs to attach.
    pub gpu_count: u32,
    /// Container disk size in GB.
    pub container_disk_size: u32,
    /// Persistent volume size in GB.
    pub volume_size: u32,
    /// Mount path of the persistent volume.
    pub volume_path: String,
    /// Minimum vCPU count.
    pub min_vcpu_count: u32,
    /// Minimum RAM in GB.
    pub min_memory_in_gb: u32,
    /// Arguments passed to docker (e.g. `bash -c "sleep infinity"`).
    pub docker_args: Option<String>,
    /// RunPod template id to create from instead of a raw image.
    pub template_id: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            pod_name: None,
            image_name: None,
            gpu_type_id: None,
            gpu_count: 1,
            container_disk_size: 10,
            volume_size: 20,
            volume_path: "/workspace".to_string(),
            min_vcpu_count: 1,
            min_memory_in_gb: 1,
            docker_args: None,
            template_id: None,
        }
    }
}

/// Fully resolved configuration. Immutable once produced by [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunpodConfig {
    /// Remote API settings.
    pub api: ApiConfig,
    /// Machine shape for pod creation.
    pub machine: MachineConfig,
    /// Cloud tier for pod creation.
    pub cloud_type: CloudType,
    /// Operate on spot (interruptible) capacity.
    pub spot: bool,
    /// Maximum bid per GPU in $/hr, for spot operations.
    pub max_bid: Option<f64>,
}

impl RunpodConfig {
    /// Get the API key, failing if no source provided one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingValue`] when the key is unset or blank.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingValue(
                "api.api_key (flag --api-key, env RUNPOD_API_KEY, or config file)",
            ))
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the configuration from defaults, an optional YAML file, the
/// process environment, and explicit flag overrides, in that order.
///
/// In local dev this also loads `.env` from the current directory; a missing
/// `.env` is not an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a value has the
/// wrong type, or (under `strict`) a key falls outside the known schema.
pub fn resolve(
    file: Option<&Path>,
    overrides: &[(String, Value)],
    strict: bool,
) -> Result<RunpodConfig, ConfigError> {
    let _ = dotenvy::dotenv();

    let mut env_overrides = Vec::new();
    if let Ok(url) = env::var(ENV_GRAPHQL_URL) {
        env_overrides.push(("api.url".to_string(), Value::String(url)));
    }
    if let Ok(key) = env::var(ENV_API_KEY) {
        env_overrides.push(("api.api_key".to_string(), Value::String(key)));
    }

    resolve_layered(file, &env_overrides, overrides, strict)
}

/// Pure layering core of [`resolve`]; the environment arrives as data.
fn resolve_layered(
    file: Option<&Path>,
    env_overrides: &[(String, Value)],
    flag_overrides: &[(String, Value)],
    strict: bool,
) -> Result<RunpodConfig, ConfigError> {
    let defaults = serde_yaml::to_value(RunpodConfig::default())?;
    let mut merged: BTreeMap<String, Value> = flatten(&defaults)?.into_iter().collect();

    if let Some(path) = file {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // An empty config file is a valid (if pointless) one.
        let doc: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(&text)?
        };
        for (key, value) in flatten(&doc)? {
            apply(&mut merged, key, value, strict)?;
        }
    }

    for (key, value) in env_overrides {
        apply(&mut merged, key.clone(), value.clone(), strict)?;
    }
    for (key, value) in flag_overrides {
        apply(&mut merged, key.clone(), value.clone(), strict)?;
    }

    serde_yaml::from_value(unflatten(&merged)).map_err(ConfigError::Yaml)
}

/// Overlay one key onto the merged map. Keys outside the default schema are
/// rejected under strict mode and dropped otherwise.
fn apply(
    merged: &mut BTreeMap<String, Value>,
    key: String,
    value: Value,
    strict: bool,
) -> Result<(), ConfigError> {
    if merged.contains_key(&key) {
        merged.insert(key, value);
        Ok(())
    } else if strict {
        Err(ConfigError::UnknownKey(key))
    } else {
        Ok(())
    }
}

/// Flatten a YAML document into dotted-key leaves. `null` documents (empty
/// files) flatten to nothing.
fn flatten(doc: &Value) -> Result<Vec<(String, Value)>, ConfigError> {
    let mut out = Vec::new();
    match doc {
        Value::Null => {}
        Value::Mapping(map) => flatten_mapping("", map, &mut out)?,
        _ => return Err(ConfigError::NotAMapping),
    }
    Ok(out)
}

fn flatten_mapping(
    prefix: &str,
    map: &Mapping,
    out: &mut Vec<(String, Value)>,
) -> Result<(), ConfigError> {
    for (key, value) in map {
        let Some(name) = key.as_str() else {
            return Err(ConfigError::InvalidKey(format!("{key:?}")));
        };
        let dotted = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            Value::Mapping(child) => flatten_mapping(&dotted, child, out)?,
            leaf => out.push((dotted, leaf.clone())),
        }
    }
    Ok(())
}

/// Rebuild the nested document from dotted-key leaves.
fn unflatten(flat: &BTreeMap<String, Value>) -> Value {
    let mut root = Mapping::new();
    for (key, value) in flat {
        insert_dotted(&mut root, key, value.clone());
    }
    Value::Mapping(root)
}

fn insert_dotted(map: &mut Mapping, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            map.insert(Value::String(key.to_string()), value);
        }
        Some((head, rest)) => {
            let head_key = Value::String(head.to_string());
            if !matches!(map.get(&head_key), Some(Value::Mapping(_))) {
                map.insert(head_key.clone(), Value::Mapping(Mapping::new()));
            }
            if let Some(Value::Mapping(child)) = map.get_mut(&head_key) {
                insert_dotted(child, rest, value);
            }
        }
    }
}

// ============================================================================
// Error type
// ============================================================================

/// Error type for configuration resolution.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Config file could not be parsed, or a value has the wrong type.
    Yaml(serde_yaml::Error),
    /// A key outside the known schema was set under strict mode.
    UnknownKey(String),
    /// A mapping key is not a string.
    InvalidKey(String),
    /// Config file root is not a key/value mapping.
    NotAMapping,
    /// A required value was not provided by any source.
    MissingValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config file {}: {source}", path.display())
            }
            Self::Yaml(e) => write!(f, "invalid config: {e}"),
            Self::UnknownKey(key) => write!(f, "unknown config key: {key}"),
            Self::InvalidKey(key) => {
                write!(f, "invalid config key {key}: keys must be strings")
            }
            Self::NotAMapping => f.write_str("config file root is not a mapping"),
            Self::MissingValue(key) => write!(f, "missing required config value: {key}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
