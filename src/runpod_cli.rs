//! Command-line surface and dispatch.
//!
//! Unique responsibility: define the argument schema and map each parsed
//! command onto exactly one remote operation.
//!
//! Every command flag is translated into a dotted-key override and layered
//! through the configuration resolver, so precedence (defaults < file <
//! environment < flags) holds for command flags exactly as it does for the
//! global ones. Dispatch then performs a single client call and returns the
//! rendered output; printing and exit codes belong to the binary.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_yaml::Value;
use tracing::info;

use crate::runpod_client::{DeployPodInput, RunpodClient, RunpodClientError};
use crate::runpod_config::{self, CloudType, ConfigError, RunpodConfig};
use crate::runpod_output;

/// Command-line client for RunPod GPU pods.
#[derive(Parser, Debug)]
#[command(
    name = "runpod-cli",
    version,
    about = "Manage RunPod GPU pods: create, start, stop, destroy & list"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to a YAML config file layered over the built-in defaults
    #[arg(long, value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    /// Override the GraphQL endpoint URL
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Override the API key
    #[arg(long, value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// Reject config keys that are not part of the known schema
    #[arg(long, global = true)]
    pub strict: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Pod lifecycle subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stop a running pod, preserving its storage
    Stop {
        /// Pod id to stop
        pod_id: String,
    },

    /// Destroy a pod and its storage
    #[command(visible_alias = "terminate")]
    Destroy {
        /// Pod id to destroy
        pod_id: String,
    },

    /// Start a stopped pod
    #[command(visible_aliases = ["run", "resume"])]
    Start {
        /// Pod id to start
        pod_id: String,

        /// Resume as a spot (interruptible) instance
        #[arg(long)]
        spot: bool,

        /// Maximum bid per GPU in $/hr (spot only)
        #[arg(long, value_name = "BID")]
        max_bid: Option<f64>,

        /// Number of GPUs to attach on start
        #[arg(long, value_name = "N")]
        gpu_count: Option<u32>,
    },

    /// Create a new pod
    Create {
        /// Pod name
        #[arg(long, value_name = "NAME")]
        pod_name: Option<String>,

        /// Container image to run
        #[arg(long, value_name = "IMAGE")]
        image_name: Option<String>,

        /// GPU type to use, e.g. "NVIDIA GeForce RTX 3080 Ti"
        #[arg(long, value_name = "GPU_TYPE")]
        gpu_type_id: Option<String>,

        /// Number of GPUs to attach
        #[arg(long, value_name = "N")]
        gpu_count: Option<u32>,

        /// Container disk size in GB
        #[arg(long, value_name = "GB")]
        container_disk_size: Option<u32>,

        /// Persistent volume size in GB
        #[arg(long, value_name = "GB")]
        volume_size: Option<u32>,

        /// Mount path of the persistent volume
        #[arg(long, value_name = "PATH")]
        volume_path: Option<String>,

        /// Arguments passed to docker, e.g. `bash -c "sleep infinity"`
        #[arg(long, value_name = "ARGS")]
        docker_args: Option<String>,

        /// Template id to create from instead of a raw image
        #[arg(long, value_name = "ID")]
        template_id: Option<String>,

        /// Cloud tier to schedule on
        #[arg(long, value_enum, value_name = "TIER")]
        cloud_type: Option<CloudType>,

        /// Create as a spot (interruptible) instance
        #[arg(long)]
        spot: bool,

        /// Maximum bid per GPU in $/hr (spot only)
        #[arg(long, value_name = "BID")]
        max_bid: Option<f64>,
    },

    /// List pods
    List,
}

impl Cli {
    /// Resolve configuration, execute the selected command, and return its
    /// rendered output.
    ///
    /// # Errors
    ///
    /// Returns a [`CliError`] when configuration resolution fails or the
    /// remote operation does.
    pub async fn run(self) -> Result<String, CliError> {
        let overrides = self.overrides();
        let config = runpod_config::resolve(self.config_file.as_deref(), &overrides, self.strict)?;
        let api_key = config.require_api_key()?.to_string();
        let client = RunpodClient::new(config.api.url.clone(), api_key)?;

        match &self.command {
            Commands::List => {
                let pods = client.list_pods().await?;
                info!("found {} pods", pods.len());
                Ok(runpod_output::pod_table(&pods))
            }
            Commands::Stop { pod_id } => {
                let update = client.stop_pod(pod_id).await?;
                info!("stopped pod {pod_id}");
                Ok(runpod_output::status_table(&update))
            }
            Commands::Destroy { pod_id } => {
                client.terminate_pod(pod_id).await?;
                info!("terminated pod {pod_id}");
                Ok(runpod_output::terminated_message(pod_id))
            }
            Commands::Start { pod_id, .. } => {
                let update = if config.spot {
                    let bid = require_max_bid(&config)?;
                    client
                        .bid_resume_pod(pod_id, config.machine.gpu_count, bid)
                        .await?
                } else {
                    client.resume_pod(pod_id, config.machine.gpu_count).await?
                };
                info!("started pod {pod_id}");
                Ok(runpod_output::status_table(&update))
            }
            Commands::Create { .. } => {
                let input = deploy_input(&config)?;
                let pod = if config.spot {
                    client.deploy_spot(input).await?
                } else {
                    client.deploy_on_demand(input).await?
                };
                info!("created pod {}", pod.id);
                Ok(runpod_output::pod_table(std::slice::from_ref(&pod)))
            }
        }
    }

    /// Translate command-line flags into dotted-key configuration overrides.
    ///
    /// Boolean flags only override when present, matching the file-beats-
    /// default, flag-beats-file precedence for switches that default to off.
    #[must_use]
    pub fn overrides(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        push_string(&mut out, "api.url", self.api_url.as_ref());
        push_string(&mut out, "api.api_key", self.api_key.as_ref());

        match &self.command {
            Commands::Start {
                spot,
                max_bid,
                gpu_count,
                ..
            } => {
                if *spot {
                    out.push(("spot".to_string(), Value::Bool(true)));
                }
                push_f64(&mut out, "max_bid", *max_bid);
                push_u32(&mut out, "machine.gpu_count", *gpu_count);
            }
            Commands::Create {
                pod_name,
                image_name,
                gpu_type_id,
                gpu_count,
                container_disk_size,
                volume_size,
                volume_path,
                docker_args,
                template_id,
                cloud_type,
                spot,
                max_bid,
            } => {
                push_string(&mut out, "machine.pod_name", pod_name.as_ref());
                push_string(&mut out, "machine.image_name", image_name.as_ref());
                push_string(&mut out, "machine.gpu_type_id", gpu_type_id.as_ref());
                push_u32(&mut out, "machine.gpu_count", *gpu_count);
                push_u32(&mut out, "machine.container_disk_size", *container_disk_size);
                push_u32(&mut out, "machine.volume_size", *volume_size);
                push_string(&mut out, "machine.volume_path", volume_path.as_ref());
                push_string(&mut out, "machine.docker_args", docker_args.as_ref());
                push_string(&mut out, "machine.template_id", template_id.as_ref());
                if let Some(tier) = cloud_type {
                    out.push(("cloud_type".to_string(), Value::String(tier.to_string())));
                }
                if *spot {
                    out.push(("spot".to_string(), Value::Bool(true)));
                }
                push_f64(&mut out, "max_bid", *max_bid);
            }
            Commands::Stop { .. } | Commands::Destroy { .. } | Commands::List => {}
        }

        out
    }
}

fn push_string(out: &mut Vec<(String, Value)>, key: &str, value: Option<&String>) {
    if let Some(v) = value {
        out.push((key.to_string(), Value::String(v.clone())));
    }
}

fn push_u32(out: &mut Vec<(String, Value)>, key: &str, value: Option<u32>) {
    if let Some(v) = value {
        out.push((key.to_string(), Value::from(u64::from(v))));
    }
}

fn push_f64(out: &mut Vec<(String, Value)>, key: &str, value: Option<f64>) {
    if let Some(v) = value {
        out.push((key.to_string(), Value::from(v)));
    }
}

/// Build the deploy mutation input from the resolved configuration.
fn deploy_input(config: &RunpodConfig) -> Result<DeployPodInput, ConfigError> {
    let machine = &config.machine;

    let gpu_type_id = machine
        .gpu_type_id
        .clone()
        .ok_or(ConfigError::MissingValue("machine.gpu_type_id"))?;
    if machine.image_name.is_none() && machine.template_id.is_none() {
        return Err(ConfigError::MissingValue(
            "machine.image_name (or machine.template_id)",
        ));
    }

    // No extra list call just to invent a suffix; duplicate names are fine
    // on the server side.
    let name = machine
        .pod_name
        .clone()
        .unwrap_or_else(|| gpu_type_id.replace(' ', "_"));

    let bid_per_gpu = if config.spot {
        Some(require_max_bid(config)?)
    } else {
        None
    };

    Ok(DeployPodInput {
        cloudType: config.cloud_type.to_string(),
        gpuCount: machine.gpu_count,
        volumeInGb: machine.volume_size,
        containerDiskInGb: machine.container_disk_size,
        minVcpuCount: machine.min_vcpu_count,
        minMemoryInGb: machine.min_memory_in_gb,
        gpuTypeId: gpu_type_id,
        name,
        imageName: machine.image_name.clone(),
        dockerArgs: machine.docker_args.clone(),
        volumeMountPath: machine.volume_path.clone(),
        templateId: machine.template_id.clone(),
        bidPerGpu: bid_per_gpu,
    })
}

fn require_max_bid(config: &RunpodConfig) -> Result<f64, ConfigError> {
    config
        .max_bid
        .ok_or(ConfigError::MissingValue("max_bid (required for --spot)"))
}

// ============================================================================
// Error type
// ============================================================================

/// Error surfaced by a CLI run: either configuration resolution failed or
/// the remote operation did.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be resolved.
    Config(ConfigError),
    /// The remote operation failed.
    Remote(RunpodClientError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::Remote(e) => write!(f, "remote operation failed: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Remote(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RunpodClientError> for CliError {
    fn from(value: RunpodClientError) -> Self {
        Self::Remote(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
