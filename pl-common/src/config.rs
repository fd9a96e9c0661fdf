//! Configuration loading
//!
//! Resolution priority, highest first:
//! 1. Command-line argument
//! 2. Environment variable (both handled by each binary's clap `Args`)
//! 3. TOML config file
//! 4. Compiled default
//!
//! A missing or malformed config file never stops startup: it is logged and
//! the compiled defaults are used instead.

use crate::partner::PARTNER_TABLE;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "partner-list";

/// Default bucket for partner images
pub const DEFAULT_IMAGES_BUCKET: &str = "partner-images";

/// Default bucket for partner audio recordings
pub const DEFAULT_AUDIO_BUCKET: &str = "partner-audio";

/// Platform defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub bind_addr: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./partner_list_data"));

        Self {
            data_dir,
            log_level: "info".to_string(),
            bind_addr: "127.0.0.1".to_string(),
        }
    }
}

/// Which collaborator implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted Supabase-compatible project
    Supabase,
    /// SQLite + local files + in-process accounts
    #[default]
    Local,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" | "hosted" => Ok(BackendKind::Supabase),
            "local" => Ok(BackendKind::Local),
            other => Err(Error::Config(format!(
                "unknown backend kind {:?} (expected \"supabase\" or \"local\")",
                other
            ))),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[backend]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Hosted project URL
    pub url: Option<String>,
    /// Hosted project public (anon) key
    pub anon_key: Option<String>,
    pub images_bucket: String,
    pub audio_bucket: String,
    pub table: String,
    /// Root of the local backend's database and storage
    pub data_dir: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: None,
            anon_key: None,
            images_bucket: DEFAULT_IMAGES_BUCKET.to_string(),
            audio_bucket: DEFAULT_AUDIO_BUCKET.to_string(),
            table: PARTNER_TABLE.to_string(),
            data_dir: None,
        }
    }
}

impl BackendConfig {
    /// Effective local data directory
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| CompiledDefaults::for_current_platform().data_dir)
    }

    /// Apply command-line/environment overrides on top of file values
    pub fn with_overrides(mut self, overrides: BackendOverrides) -> Self {
        if let Some(kind) = overrides.kind {
            self.kind = kind;
        }
        if overrides.url.is_some() {
            self.url = overrides.url;
        }
        if overrides.anon_key.is_some() {
            self.anon_key = overrides.anon_key;
        }
        if overrides.data_dir.is_some() {
            self.data_dir = overrides.data_dir;
        }
        self
    }

    /// Check that the selected backend has what it needs
    pub fn validate(&self) -> Result<()> {
        if self.kind == BackendKind::Supabase {
            if self.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                return Err(Error::Config("hosted backend requires backend.url".to_string()));
            }
            if self.anon_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err(Error::Config("hosted backend requires backend.anon_key".to_string()));
            }
        }
        for (key, value) in [
            ("images_bucket", &self.images_bucket),
            ("audio_bucket", &self.audio_bucket),
            ("table", &self.table),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("backend.{} must not be empty", key)));
            }
        }
        Ok(())
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct BackendOverrides {
    pub kind: Option<BackendKind>,
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Contents of `config.toml`
///
/// ```toml
/// bind_addr = "127.0.0.1"
/// port = 5780
/// # Address clients use to reach this process (local storage URLs)
/// public_base = "http://partners.lan:5780"
///
/// [logging]
/// level = "debug"
///
/// [backend]
/// kind = "supabase"
/// url = "https://example.supabase.co"
/// anon_key = "..."
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub public_base: Option<String>,
    pub logging: LoggingConfig,
    pub backend: BackendConfig,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("invalid config file: {}", e)))
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load the config file, falling back to defaults
    ///
    /// Uses `explicit` when given, otherwise the platform location from
    /// [`default_config_path`]. Missing or invalid files are not fatal; the
    /// returned [`ConfigSource`] says what happened so the caller can log it
    /// once tracing is up.
    pub fn load_or_default(explicit: Option<&Path>) -> (Self, ConfigSource) {
        let path = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return (Self::default(), ConfigSource::Defaults),
        };

        match Self::from_file(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(e) => (
                Self::default(),
                ConfigSource::Ignored {
                    path,
                    reason: e.to_string(),
                },
            ),
        }
    }

    /// Effective bind address
    pub fn bind_addr_or_default(&self) -> String {
        self.bind_addr
            .clone()
            .unwrap_or_else(|| CompiledDefaults::for_current_platform().bind_addr)
    }
}

/// Socket address from a bind host and port
///
/// Accepts IPv4 and IPv6 hosts, the latter with or without brackets.
pub fn socket_addr(bind_addr: &str, port: u16) -> Result<SocketAddr> {
    let host = bind_addr.trim();
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    let ip: IpAddr = host
        .parse()
        .map_err(|_| Error::Config(format!("invalid bind address: {}", bind_addr)))?;
    Ok(SocketAddr::new(ip, port))
}

/// Base URL written into local storage addresses
///
/// An explicit `configured` value wins. Otherwise the bound address is used,
/// with an unspecified address (`0.0.0.0`, `::`) replaced by loopback.
pub fn public_base_url(configured: Option<&str>, addr: SocketAddr) -> String {
    if let Some(base) = configured.map(str::trim).filter(|b| !b.is_empty()) {
        return base.trim_end_matches('/').to_string();
    }

    let mut reachable = addr;
    if addr.ip().is_unspecified() {
        reachable.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    format!("http://{}", reachable)
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// No config file found
    Defaults,
    /// File found but unusable; defaults used
    Ignored { path: PathBuf, reason: String },
}

impl ConfigSource {
    /// Log the outcome (call after tracing is initialised)
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config file {}", path.display()),
            ConfigSource::Defaults => info!("No config file found, using compiled defaults"),
            ConfigSource::Ignored { path, reason } => {
                warn!("Ignoring config file {}: {} (using compiled defaults)", path.display(), reason)
            }
        }
    }
}

/// Platform config file location, if one exists
///
/// Linux checks `~/.config/partner-list/config.toml` then
/// `/etc/partner-list/config.toml`; other platforms check the user config
/// directory only.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Some(path);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
