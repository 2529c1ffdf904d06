//! Server-side configuration.
//!
//! Reads a TOML file such as:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//!
//! [storage]
//! data_dir = "/var/lib/placement"
//! busy_timeout_ms = 5000
//!
//! [ledger]
//! record_exhaustion = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use allocation::LedgerConfig;
use placement_core::ServiceConfig;

/// Directory searched when `-c` names a context instead of a file.
const CONFIG_DIR: &str = "/etc/placement";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,

    pub storage: StorageSection,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    /// Listen address; the `--listen` flag wins when given.
    #[serde(default)]
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub data_dir: String,

    /// Defaults to `{data_dir}/data.sqlite`.
    #[serde(default)]
    pub sqlite_path: Option<String>,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            sqlite_path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl ServerConfig {
    /// A bare name resolves to `/etc/placement/<name>.toml`; anything with a
    /// `/` or `.` is used as a path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            Path::new(CONFIG_DIR).join(format!("{name_or_path}.toml"))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: ServerConfig = toml::from_str(content)?;
        config.verify()?;
        Ok(config)
    }

    fn verify(&self) -> anyhow::Result<()> {
        if self.storage.data_dir.trim().is_empty() {
            anyhow::bail!("Storage data_dir is empty in configuration.");
        }
        if self.storage.busy_timeout_ms == 0 {
            anyhow::bail!("Storage busy_timeout_ms must be greater than 0.");
        }
        Ok(())
    }

    /// Storage settings for the shared service layer. `listen` is the
    /// CLI override, if any.
    pub fn service_config(&self, listen: Option<&str>) -> ServiceConfig {
        let defaults = ServiceConfig::default();
        ServiceConfig {
            data_dir: Some(PathBuf::from(&self.storage.data_dir)),
            sqlite_path: self.storage.sqlite_path.as_ref().map(PathBuf::from),
            busy_timeout: Duration::from_millis(self.storage.busy_timeout_ms),
            listen: listen
                .map(str::to_string)
                .or_else(|| self.server.listen.clone())
                .unwrap_or(defaults.listen),
        }
    }
}
