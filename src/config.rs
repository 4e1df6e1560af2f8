//! Configuration layer: typed settings with layered precedence (file → env →
//! CLI). The env names `DEFAULT_FROM_EMAIL` and `EMAIL_SUBJECT_PREFIX` are
//! honored for deployments that already set them.

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::EmailError;

const DEFAULT_CONFIG_BASENAME: &str = "config/missive";
const DEFAULT_ENV_PREFIX: &str = "MISSIVE";
const DEFAULT_TEMPLATE_DIR: &str = "templates";
const DEFAULT_ASSET_DIR: &str = "templates/email";
const DEFAULT_PREVIEW_PREFIX: &str = "email-draft";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub mail: MailSettings,
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub suppression: SuppressionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MailSettings {
    /// Sender used when a request carries no explicit from address.
    #[serde(default)]
    pub default_from: Option<String>,
    /// Prefix prepended (with a trailing space) to every resolved subject.
    #[serde(default)]
    pub subject_prefix: Option<String>,
    /// Transport URL: `smtp://`/`smtps://` for live delivery or `file://dir`
    /// to write messages to disk during development.
    #[serde(default)]
    pub transport_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetSettings {
    /// Directory containing the template tree (`email/{name}/subject.txt`…).
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Local asset prefix for chrome and body images.
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
    /// First path segment of the preview image route.
    #[serde(default = "default_preview_prefix")]
    pub preview_prefix: String,
    /// Deployment stylesheet; the bundled one is used when unset.
    #[serde(default)]
    pub stylesheet: Option<PathBuf>,
    /// Chrome override fragments; built-in chrome is used when unset.
    #[serde(default)]
    pub header_file: Option<PathBuf>,
    #[serde(default)]
    pub footer_file: Option<PathBuf>,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            template_dir: default_template_dir(),
            asset_dir: default_asset_dir(),
            preview_prefix: default_preview_prefix(),
            stylesheet: None,
            header_file: None,
            footer_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SuppressionSettings {
    /// Newline-delimited suppression file; an empty registry is used when
    /// unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}

fn default_template_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TEMPLATE_DIR)
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ASSET_DIR)
}

fn default_preview_prefix() -> String {
    DEFAULT_PREVIEW_PREFIX.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Load settings with layered precedence: the default config file, an
/// optional explicit config file, then `MISSIVE_*` environment variables
/// (`__` separates sections, e.g. `MISSIVE_MAIL__DEFAULT_FROM`). The legacy
/// `DEFAULT_FROM_EMAIL` and `EMAIL_SUBJECT_PREFIX` env names fill their
/// fields when nothing else set them.
pub fn load(config_file: Option<&PathBuf>) -> Result<Settings, EmailError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path.clone()).required(true));
    }

    let config = builder
        .add_source(Environment::with_prefix(DEFAULT_ENV_PREFIX).separator("__"))
        .build()
        .map_err(|err| EmailError::configuration(err.to_string()))?;

    let mut settings: Settings = config
        .try_deserialize()
        .map_err(|err| EmailError::configuration(err.to_string()))?;

    if settings.mail.default_from.is_none() {
        settings.mail.default_from = env_nonempty("DEFAULT_FROM_EMAIL");
    }
    if settings.mail.subject_prefix.is_none() {
        settings.mail.subject_prefix = env_nonempty("EMAIL_SUBJECT_PREFIX");
    }

    Ok(settings)
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
