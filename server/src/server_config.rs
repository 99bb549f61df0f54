use config::{Config, ConfigError};
use serde::Deserialize;
use std::{env, path::Path, path::PathBuf, result::Result};
use url::Url;

use crate::prompt::claude::DEFAULT_SYSTEM_PROMPT;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Only keys under this prefix are accepted by the object-created trigger.
    pub folder_prefix: String,
    pub list_page_size: usize,
    pub missing_subject_placeholder: String,
    pub empty_body_placeholder: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            folder_prefix: "emails/job-offers/".to_string(),
            list_page_size: 1000,
            missing_subject_placeholder: "No Subject".to_string(),
            empty_body_placeholder: "No content available.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub endpoint: Url,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub api_version: String,
    pub system_prompt: Option<String>,
}

impl SummarizerConfig {
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("https://api.anthropic.com/v1/messages").unwrap(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 1024,
            timeout_secs: 99,
            api_version: "2023-06-01".to_string(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub enabled: bool,
    pub port: u16,
    /// argv template, `{cidr}` and `{port}` are substituted
    pub open_command: Vec<String>,
    pub close_command: Vec<String>,
    pub command_timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 27017,
            open_command: vec![],
            close_command: vec![],
            command_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    pub lookup_url: Url,
    pub timeout_secs: u64,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            lookup_url: Url::parse("https://api.ipify.org").unwrap(),
            timeout_secs: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContinuationConfig {
    /// Defaults to this server's own batch route.
    pub endpoint: Option<Url>,
    pub timeout_secs: u64,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/objects"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    ingest: IngestConfig,
    filter: FilterConfig,
    summarizer: SummarizerConfig,
    gate: GateConfig,
    address: AddressConfig,
    store: StoreConfig,
    continuation: ContinuationConfig,
    storage: StorageConfig,
}

/// Credentials and locations supplied through the environment.
#[derive(Clone)]
pub struct EnvConfig {
    pub claude_api_key: String,
    pub mongodb_uri: String,
    pub mongodb_db_name: String,
    pub mongodb_collection_name: String,
    pub s3_bucket_name: Option<String>,
    pub s3_folder_name: Option<String>,
    pub port: u16,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(p) => p
                .parse::<u16>()
                .map_err(|e| ConfigError::Message(format!("PORT is invalid: {e}")))?,
            Err(_) => 5006,
        };

        Ok(Self {
            claude_api_key: required_var("CLAUDE_API_KEY")?,
            mongodb_uri: required_var("MONGODB_URI")?,
            mongodb_db_name: required_var("MONGODB_DB_NAME")?,
            mongodb_collection_name: required_var("MONGODB_COLLECTION_NAME")?,
            s3_bucket_name: env::var("S3_BUCKET_NAME").ok(),
            s3_folder_name: env::var("S3_FOLDER_NAME").ok(),
            port,
        })
    }
}

// Secrets never reach the logs.
impl std::fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvConfig")
            .field("claude_api_key", &"<redacted>")
            .field("mongodb_uri", &"<redacted>")
            .field("mongodb_db_name", &self.mongodb_db_name)
            .field("mongodb_collection_name", &self.mongodb_collection_name)
            .field("s3_bucket_name", &self.s3_bucket_name)
            .field("s3_folder_name", &self.s3_folder_name)
            .field("port", &self.port)
            .finish()
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::NotFound(name.to_string()))
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ingest: IngestConfig,
    pub filter: FilterConfig,
    pub summarizer: SummarizerConfig,
    pub gate: GateConfig,
    pub address: AddressConfig,
    pub store: StoreConfig,
    pub continuation: ContinuationConfig,
    pub storage: StorageConfig,
    pub env: EnvConfig,
}

impl ServerConfig {
    /// Reads `config.toml` from `APP_DIR`, or from the workspace `config/` directory
    /// during development, and combines it with the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let root = match env::var("APP_DIR") {
            Ok(dir) => dir,
            Err(_) => {
                let dir = env::var("CARGO_MANIFEST_DIR").map_err(|_| {
                    ConfigError::NotFound("CARGO_MANIFEST_DIR or APP_DIR".to_string())
                })?;
                let parent = Path::new(&dir)
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or(dir);
                format!("{}/config", parent)
            }
        };

        Self::from_file(&format!("{root}/config.toml"), EnvConfig::from_env()?)
    }

    pub fn from_file(path: &str, env: EnvConfig) -> Result<Self, ConfigError> {
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(path))
            .build()?
            .try_deserialize()?;

        Ok(Self::from_parts(cfg_file, env))
    }

    fn from_parts(cfg_file: ConfigFile, env: EnvConfig) -> Self {
        let ConfigFile {
            ingest,
            filter,
            summarizer,
            gate,
            address,
            store,
            continuation,
            storage,
        } = cfg_file;

        ServerConfig {
            ingest,
            filter,
            summarizer,
            gate,
            address,
            store,
            continuation,
            storage,
            env,
        }
    }

    /// Where the batch driver sends its follow-up invocation.
    pub fn continuation_endpoint(&self) -> Result<Url, url::ParseError> {
        match &self.continuation.endpoint {
            Some(url) => Ok(url.clone()),
            None => Url::parse(&format!("http://127.0.0.1:{}/invoke/batch", self.env.port)),
        }
    }
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\n{:?}\n\nFilter keywords:\n{}\n\nSummarizer: {} ({}, max_tokens={}, timeout={}s)\n\nGate: {:?}\n\nAddress lookup: {:?}\n\nStore: {:?}\n\nContinuation: {:?}\n\nStorage: {:?}\n\nEnv: {:?}",
            self.ingest,
            self.filter.keywords.join(", "),
            self.summarizer.endpoint,
            self.summarizer.model,
            self.summarizer.max_tokens,
            self.summarizer.timeout_secs,
            self.gate,
            self.address,
            self.store,
            self.continuation,
            self.storage,
            self.env,
        )
    }
}
