use std::path::{Path, PathBuf};

use clap::ValueEnum;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

use crate::app::Mode;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub default_mode: Mode,

    pub transport_config: Option<String>,
}

fn default_out_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("epubcast")
        .to_string_lossy()
        .to_string()
}

fn default_user_agent() -> String {
    format!("epubcast/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            default_mode: Mode::default(),
            transport_config: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read the config at `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("epubcast")
            .join("config.toml")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportKind {
    #[default]
    Smtp,
    Sendmail,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    #[default]
    Tls,
    Starttls,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub security: SmtpSecurity,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendmailConfig {
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub dir: PathBuf,
}

/// Mail transport settings, read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    pub from: String,
    pub smtp: Option<SmtpConfig>,
    pub sendmail: Option<SendmailConfig>,
    pub file: Option<FileConfig>,
}

impl TransportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read transport config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AppError::Config(format!("invalid transport config: {}", e)))
    }

    /// Check that everything `kind` needs is present and well-formed.
    pub fn validate(&self, kind: TransportKind) -> Result<()> {
        self.from_mailbox()?;

        match kind {
            TransportKind::Smtp => {
                let smtp = self
                    .smtp
                    .as_ref()
                    .ok_or_else(|| AppError::Config("transport 'smtp' needs an \"smtp\" block".to_string()))?;
                if smtp.host.trim().is_empty() {
                    return Err(AppError::Config("smtp.host must not be empty".to_string()));
                }
                if smtp.username.is_some() != smtp.password.is_some() {
                    return Err(AppError::Config(
                        "smtp.username and smtp.password must be given together".to_string(),
                    ));
                }
            }
            TransportKind::Sendmail => {}
            TransportKind::File => {
                if self.file.is_none() {
                    return Err(AppError::Config("transport 'file' needs a \"file\" block".to_string()));
                }
            }
        }

        Ok(())
    }

    pub fn from_mailbox(&self) -> Result<Mailbox> {
        self.from
            .parse()
            .map_err(|e| AppError::Config(format!("invalid from address '{}': {}", self.from, e)))
    }
}
