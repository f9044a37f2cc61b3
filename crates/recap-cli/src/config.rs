use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_VERSION: u32 = 1;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Transcript languages tried in order when none is requested.
pub const DEFAULT_LANGUAGES: [&str; 25] = [
    "en", "es", "zh-Hans", "zh-Hant", "hi", "ar", "pt", "bn", "ru", "ja", "de", "fr", "ko", "it",
    "tr", "vi", "pl", "uk", "nl", "th", "id", "ml", "ta", "te", "mr",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory not found; set HOME or RECAP_HOME")]
    HomeMissing,
    #[error("config io error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ConfigPaths {
    pub fn from_home() -> Result<Self, ConfigError> {
        if let Ok(base) = std::env::var("RECAP_HOME") {
            if !base.trim().is_empty() {
                return Ok(Self::from_base(PathBuf::from(base)));
            }
        }
        let home = std::env::var("HOME").map_err(|_| ConfigError::HomeMissing)?;
        Ok(Self::from_base(PathBuf::from(home).join(".recap")))
    }

    pub fn from_base(base_dir: PathBuf) -> Self {
        let config_path = base_dir.join("config.toml");
        Self {
            base_dir,
            config_path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub model: ModelConfig,
    pub generation: GenerationSection,
    pub transport: TransportConfig,
    pub retry: RetryConfig,
    pub summary: SummaryConfig,
    pub output: OutputConfig,
    pub transcript: TranscriptConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            model: ModelConfig::default(),
            generation: GenerationSection::default(),
            transport: TransportConfig::default(),
            retry: RetryConfig::default(),
            summary: SummaryConfig::default(),
            output: OutputConfig::default(),
            transcript: TranscriptConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub id: String,
    pub region: String,
    /// Base URL override; empty means the regional runtime endpoint.
    pub endpoint: String,
    pub api_key: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: "amazon.nova-lite-v1:0".to_string(),
            region: "us-east-1".to_string(),
            endpoint: String::new(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout_secs: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u32,
    pub max_delay_ms: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub use_ai: bool,
    pub max_key_points: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            use_ai: true,
            max_key_points: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// `youtube` fetches captions over the network; `files` reads `dir`.
    pub source: String,
    pub dir: String,
    pub languages: Vec<String>,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            source: "youtube".to_string(),
            dir: "transcripts".to_string(),
            languages: DEFAULT_LANGUAGES.iter().map(|lang| lang.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn load_or_create(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        ensure_dirs(paths)?;
        if paths.config_path.exists() {
            return Self::load(paths);
        }

        let config = Self::default();
        Self::write(paths, &config)?;
        Ok(config)
    }

    pub fn load(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        ensure_dirs(paths)?;
        let content = fs::read_to_string(&paths.config_path)?;
        let raw: toml::Value = toml::from_str(&content)?;
        let file_version = raw
            .get("version")
            .and_then(|value| value.as_integer())
            .unwrap_or(0) as u32;

        let mut config: Config = toml::from_str(&content)?;
        let mut migrated = false;

        if file_version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
            migrated = true;
        } else if file_version > CONFIG_VERSION {
            tracing::warn!(
                file_version,
                supported = CONFIG_VERSION,
                "config version is newer than supported; proceeding"
            );
        }

        warn_if_loose_permissions(&paths.config_path)?;

        if migrated {
            Self::write(paths, &config)?;
        }

        Ok(config)
    }

    pub fn write(paths: &ConfigPaths, config: &Config) -> Result<(), ConfigError> {
        ensure_dirs(paths)?;
        let content = toml::to_string_pretty(config)?;
        write_atomic(&paths.config_path, content.as_bytes())?;
        Ok(())
    }

    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        if !redacted.model.api_key.trim().is_empty() {
            redacted.model.api_key = "<redacted>".to_string();
        }
        redacted
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.id.trim().is_empty() {
            return Err(ConfigError::Validation("model.id must not be empty".into()));
        }
        if self.model.region.trim().is_empty() && self.model.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "model.region or model.endpoint must be set".into(),
            ));
        }
        let endpoint = self.model.endpoint.trim();
        if !endpoint.is_empty()
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "model.endpoint must be an http(s) url (got {endpoint})"
            )));
        }

        if !(0.0..=1.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Validation(
                "generation.temperature must be between 0 and 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(ConfigError::Validation(
                "generation.top_p must be between 0 and 1".into(),
            ));
        }
        if self.generation.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "generation.max_tokens must be greater than 0".into(),
            ));
        }

        if self.transport.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "transport.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Validation(
                "retry.base_delay_ms must be <= retry.max_delay_ms".into(),
            ));
        }

        if self.summary.max_key_points == 0 {
            return Err(ConfigError::Validation(
                "summary.max_key_points must be greater than 0".into(),
            ));
        }
        if self.output.dir.trim().is_empty() {
            return Err(ConfigError::Validation("output.dir must not be empty".into()));
        }
        if !matches!(self.transcript.source.as_str(), "youtube" | "files") {
            return Err(ConfigError::Validation(format!(
                "transcript.source must be youtube or files (got {})",
                self.transcript.source
            )));
        }
        if self.transcript.languages.is_empty() {
            return Err(ConfigError::Validation(
                "transcript.languages must include at least one language".into(),
            ));
        }
        for language in &self.transcript.languages {
            if language.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "transcript.languages entries must not be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

fn ensure_dirs(paths: &ConfigPaths) -> Result<(), ConfigError> {
    fs::create_dir_all(&paths.base_dir)?;
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("config path missing parent directory"))?;
    let tmp_path = parent.join("config.toml.tmp");
    fs::write(&tmp_path, contents)?;
    set_strict_permissions(&tmp_path)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn set_strict_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perm)?;
    }
    Ok(())
}

fn warn_if_loose_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path)?;
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                "config file is group/world readable; set permissions to 0600"
            );
        }
    }
    Ok(())
}
