use crate::error::{RelayError, Result};
use crate::types::JobKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local map; state is lost on restart.
    Memory,
    /// Persistent redb file.
    Redb {
        #[serde(default = "default_redb_path")]
        path: String,
    },
}

fn default_redb_path() -> String {
    "wxrelay.redb".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_backend")]
    pub backend: CacheBackend,
    /// Upper bound for a single cache operation.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
    /// Attempts per operation before surfacing `CacheUnavailable`.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Attempts to open the store at startup.
    #[serde(default = "default_open_attempts")]
    pub open_attempts: u32,
}

fn default_backend() -> CacheBackend {
    CacheBackend::Redb {
        path: default_redb_path(),
    }
}

fn default_op_timeout_ms() -> u64 {
    5_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_open_attempts() -> u32 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            op_timeout_ms: default_op_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            open_attempts: default_open_attempts(),
        }
    }
}

impl CacheConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// JobConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub url: String,
    /// Fixed universe of codes this job relays, in output order.
    pub tracked_codes: Vec<String>,
    /// When set, `serve` triggers the job on this interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

pub const SIGNAL_CODES: &[&str] = &[
    "wcold",
    "wfirer",
    "wfirey",
    "wfntsa",
    "wfrost",
    "whot",
    "whota",
    "rrain",
    "wl",
    "rhinf",
    "wraina",
    "wrainb",
    "wrainr",
    "tc1",
    "tc3",
    "tc10",
    "tcpre8up",
    "tc8ne",
    "tc8nw",
    "tc8se",
    "tc8sw",
    "tc9",
    "wts",
    "wtips",
    "wmsgnl_monsoon",
    "wtm",
];

pub const BULLETIN_CODES: &[&str] = &["MHEAD_C", "MHEAD_E"];

fn default_signals() -> JobConfig {
    JobConfig {
        url: "http://localhost:8080/minds/ssb?site=prod".to_string(),
        tracked_codes: SIGNAL_CODES.iter().map(|s| s.to_string()).collect(),
        interval_secs: None,
    }
}

fn default_bulletins() -> JobConfig {
    JobConfig {
        url: "http://localhost:8080/adminConsole/rest/bulletin/BulletinService/findStoppableSnapshotWithDetails".to_string(),
        tracked_codes: BULLETIN_CODES.iter().map(|s| s.to_string()).collect(),
        interval_secs: None,
    }
}

// ---------------------------------------------------------------------------
// WebhookConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: String,
    /// Prefix joined with a signal's icon name to build the thumbnail URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Timeout applied to every outbound HTTP request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Zone of the naive timestamps the sources emit.
    #[serde(default = "default_source_offset")]
    pub source_utc_offset_hours: i32,
    #[serde(default = "default_signals")]
    pub signals: JobConfig,
    #[serde(default = "default_bulletins")]
    pub bulletins: JobConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_version() -> u32 {
    1
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_source_offset() -> i32 {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            http_timeout_secs: default_http_timeout_secs(),
            source_utc_offset_hours: default_source_offset(),
            signals: default_signals(),
            bulletins: default_bulletins(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl Config {
    pub fn job(&self, kind: JobKind) -> &JobConfig {
        match kind {
            JobKind::Signals => &self.signals,
            JobKind::Bulletins => &self.bulletins,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RelayError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.webhook.url.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "webhook.url is empty; every dispatch will fail".to_string(),
            });
        }

        for kind in JobKind::all() {
            let job = self.job(*kind);
            if job.url.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{kind}.url is empty"),
                });
            }
            if job.tracked_codes.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{kind}.tracked_codes is empty; the job will never dispatch"),
                });
            }
            let mut seen = HashSet::new();
            for code in &job.tracked_codes {
                if code.contains(':') {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("{kind} code '{code}' must not contain ':'"),
                    });
                }
                if !seen.insert(code.to_ascii_lowercase()) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!("{kind} code '{code}' is listed more than once"),
                    });
                }
            }
            if job.interval_secs == Some(0) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{kind}.interval_secs must be greater than zero"),
                });
            }
        }

        let signal_codes: HashSet<String> = self
            .signals
            .tracked_codes
            .iter()
            .map(|c| c.to_ascii_lowercase())
            .collect();
        for code in &self.bulletins.tracked_codes {
            if signal_codes.contains(&code.to_ascii_lowercase()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("code '{code}' is tracked by both jobs"),
                });
            }
        }

        if self.cache.retry_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "cache.retry_attempts must be at least 1".to_string(),
            });
        }
        if self.http_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "http_timeout_secs must be greater than zero".to_string(),
            });
        }
        if !(-12..=14).contains(&self.source_utc_offset_hours) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "source_utc_offset_hours={} is outside -12..=14",
                    self.source_utc_offset_hours
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
