// ABOUTME: Configuration types and parsing for outrider.yaml.
// ABOUTME: Handles YAML parsing, variable expansion, and resolution into an immutable run config.

mod auth;
pub mod env;
mod target;

pub use auth::{AuthBundle, AuthLayer};
pub use target::{
    DEFAULT_PORT, DEFAULT_USER, SshOptions, Target, TargetSpec, TransportOptions,
    TransportSection,
};

use crate::actions::{ActionError, ActionRegistry, ActionSpec, ResolvedAction};
use crate::backend::{RuntimeConfig, RuntimeType};
use crate::error::{Error, Result};
use crate::ssh::{SshConfig, expand_home};
use crate::types::{Concurrency, ImageName};
use env::Variables;
use nonempty::NonEmpty;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use target::TargetEntry;

pub const DEFAULT_OUTPUT_TAR: &str = "images.tar";
pub const DEFAULT_REMOTE_TAR: &str = "/tmp/images.tar";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSection {
    #[serde(rename = "type", default)]
    pub kind: Option<RuntimeType>,
    #[serde(default)]
    pub options: RuntimeOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeOptions {
    #[serde(default)]
    pub socket: Option<String>,
}

/// The configuration file as written, after variable expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub runtime: RuntimeSection,

    #[serde(default)]
    pub transport: TransportSection,

    #[serde(default, deserialize_with = "deserialize_targets")]
    pub targets: Vec<TargetSpec>,

    #[serde(default)]
    pub post_instructions: Option<ActionSpec>,

    #[serde(default = "default_output_tar")]
    pub output_tar: PathBuf,

    #[serde(default = "default_remote_tar")]
    pub remote_tar_path: String,

    #[serde(default)]
    pub skip_if_exists: bool,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "deserialize_string_or_list")]
    pub env_file: Vec<String>,
}

fn default_output_tar() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_TAR)
}

fn default_remote_tar() -> String {
    DEFAULT_REMOTE_TAR.to_string()
}

/// Variable sources read before the rest of the document is expanded.
#[derive(Debug, Default, Deserialize)]
struct EnvSection {
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_string_or_list")]
    env_file: Vec<String>,
}

impl Config {
    /// Parse with the process environment as the lowest variable layer.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with(yaml, env::process_env())
    }

    /// Parse with an explicit base variable layer.
    pub fn from_yaml_with(yaml: &str, base: Variables) -> Result<Self> {
        let mut doc: Value = serde_yaml::from_str(yaml)?;
        if doc.is_null() {
            doc = Value::Mapping(Default::default());
        }

        let section: EnvSection = serde_yaml::from_value(doc.clone())?;
        let mut layers = vec![base];
        for file in &section.env_file {
            layers.push(env::load_env_file(&expand_home(file))?);
        }
        layers.push(section.env);
        let vars = env::layered(layers);

        env::expand_document(&mut doc, &vars)?;
        serde_yaml::from_value(doc).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ConfigNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let config = Self::from_yaml(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate and resolve into the immutable form the pipeline consumes.
    pub fn resolve(self, opts: &ResolveOptions) -> Result<ResolvedConfig> {
        if self.transport.kind != "ssh" {
            return Err(Error::InvalidConfig(format!(
                "unsupported transport type: {}",
                self.transport.kind
            )));
        }

        let images = self
            .images
            .iter()
            .map(|name| ImageName::parse(name))
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        if images.is_empty() {
            return Err(Error::InvalidConfig("no images specified".to_string()));
        }

        let ssh_config = match &self.transport.options.ssh_config {
            Some(path) => SshConfig::load(&expand_home(path))?,
            None => SshConfig::load_default(),
        };

        let targets: Vec<Target> = self
            .targets
            .into_iter()
            .map(|spec| {
                let settings = ssh_config.lookup(&spec.host);
                spec.resolve(&self.transport.options, settings, opts.skip_host_verification)
            })
            .collect();
        let targets = NonEmpty::from_vec(targets)
            .ok_or_else(|| Error::InvalidConfig("no targets specified".to_string()))?;

        let registry = ActionRegistry::new();
        let mut seen = HashSet::new();
        for target in &targets {
            registry
                .resolve(self.post_instructions.as_ref(), target.post_placement.as_ref())
                .map_err(|source| Error::InvalidAction {
                    target: target.name.clone(),
                    source,
                })?;
            if !seen.insert(target.session_key()) {
                tracing::warn!("Target {} is listed more than once", target.session_key());
            }
        }

        let options = &self.transport.options;
        Ok(ResolvedConfig {
            images: images.into_iter().collect(),
            targets,
            output_path: self.output_tar,
            remote_path: self.remote_tar_path,
            post_placement: self.post_instructions,
            no_cache: opts.no_cache,
            skip_if_exists: self.skip_if_exists || opts.skip_if_exists,
            host_verification_disabled: opts.skip_host_verification,
            command_timeout: options.command_timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT),
            known_hosts_path: options.known_hosts.as_deref().map(expand_home),
            concurrency: opts
                .max_concurrent_uploads
                .map(Concurrency::clamped)
                .unwrap_or_default(),
            runtime: RuntimeConfig {
                runtime: self.runtime.kind,
                socket: self.runtime.options.socket,
            },
        })
    }
}

/// Settings supplied from the command line.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub skip_host_verification: bool,
    pub max_concurrent_uploads: Option<usize>,
    pub no_cache: bool,
    pub skip_if_exists: bool,
}

/// Fully validated configuration for one run. Read-only once built.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Deduplicated and sorted.
    pub images: Vec<ImageName>,
    pub targets: NonEmpty<Target>,
    pub output_path: PathBuf,
    pub remote_path: String,
    pub post_placement: Option<ActionSpec>,
    pub no_cache: bool,
    pub skip_if_exists: bool,
    pub host_verification_disabled: bool,
    pub command_timeout: Duration,
    pub known_hosts_path: Option<PathBuf>,
    pub concurrency: Concurrency,
    pub runtime: RuntimeConfig,
}

impl ResolvedConfig {
    pub fn image_names(&self) -> Vec<String> {
        self.images.iter().map(|i| i.to_string()).collect()
    }

    /// The post-placement action `target` runs, if any.
    pub fn action_for(
        &self,
        registry: &ActionRegistry,
        target: &Target,
    ) -> std::result::Result<Option<ResolvedAction>, ActionError> {
        registry.resolve(self.post_placement.as_ref(), target.post_placement.as_ref())
    }
}

fn deserialize_targets<'de, D>(deserializer: D) -> std::result::Result<Vec<TargetSpec>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries: Vec<TargetEntry> = Vec::deserialize(deserializer)?;
    entries
        .into_iter()
        .map(TargetEntry::into_spec)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

fn deserialize_string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}
