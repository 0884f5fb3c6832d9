use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::auth::Credentials;
use crate::error::{Result, TrackerError};
use crate::fields::FieldMap;

pub const DEFAULT_USER_AGENT: &str = "bts-sync";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// How to launch the out-of-process helper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperCommand {
    pub interpreter: Option<PathBuf>,
    pub helper: PathBuf,
    pub credentials_file: Option<PathBuf>,
    pub custom_fields_file: Option<PathBuf>,
}

impl HelperCommand {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: None,
            helper: helper.into(),
            credentials_file: None,
            custom_fields_file: None,
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    pub fn with_custom_fields_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_fields_file = Some(path.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TransportKind {
    #[default]
    Http,
    Process(HelperCommand),
}

/// Process-lifetime tracker configuration. Built once, never mutated afterwards.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub base_url: Option<String>,
    pub credentials: Option<Credentials>,
    pub field_map: FieldMap,
    pub transport: TransportKind,
    pub user_agent: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credentials: None,
            field_map: FieldMap::default(),
            transport: TransportKind::Http,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    pub fn with_connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = duration;
        self
    }

    /// Configured base URL, or a configuration error when none was set.
    pub fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(TrackerError::not_configured)
    }

    /// Base URL normalized to end with `/` so relative paths append to it.
    pub fn api_root(&self) -> Result<Url> {
        let base = self.base_url()?;
        let base = format!("{}/", base.trim_end_matches('/'));
        Url::parse(&base).map_err(|err| {
            TrackerError::Configuration(format!("invalid tracker API URL {base:?}: {err}"))
        })
    }

    /// Builds the configuration from a settings document, reading the files it references.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut config = TrackerConfig::new();
        config.base_url = settings.api_url.clone();
        if let Some(path) = &settings.credentials {
            config.credentials = Some(Credentials::from_file(path)?);
        }
        if let Some(path) = &settings.custom_fields {
            config.field_map = FieldMap::from_file(path)?;
        }
        if let Some(secs) = settings.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let TransportSettings::Process {
            interpreter,
            helper,
        } = &settings.transport
        {
            config.transport = TransportKind::Process(HelperCommand {
                interpreter: interpreter.clone(),
                helper: helper.clone(),
                credentials_file: settings.credentials.clone(),
                custom_fields_file: settings.custom_fields.clone(),
            });
        }
        Ok(config)
    }
}

/// On-disk setup document.
///
/// ```json
/// {
///   "api_url": "https://jira.example.com/rest/api/2/",
///   "credentials": "credentials.json",
///   "custom_fields": "custom_fields.json",
///   "transport": { "kind": "process", "interpreter": "/usr/bin/env", "helper": "bts-helper" }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub api_url: Option<String>,
    pub credentials: Option<PathBuf>,
    pub custom_fields: Option<PathBuf>,
    pub transport: TransportSettings,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportSettings {
    #[default]
    Http,
    Process {
        #[serde(default)]
        interpreter: Option<PathBuf>,
        helper: PathBuf,
    },
}

impl Settings {
    /// Loads settings; relative paths inside are taken relative to the settings file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            TrackerError::Configuration(format!("cannot read settings {}: {err}", path.display()))
        })?;
        let mut settings: Settings = serde_json::from_str(&content).map_err(|err| {
            TrackerError::Configuration(format!("invalid settings {}: {err}", path.display()))
        })?;
        if let Some(dir) = path.parent() {
            settings.resolve_relative_to(dir);
        }
        Ok(settings)
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        };
        self.credentials.iter_mut().for_each(resolve);
        self.custom_fields.iter_mut().for_each(resolve);
        if let TransportSettings::Process { helper, .. } = &mut self.transport {
            resolve(helper);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        env::temp_dir().join(format!("bts-config-{name}-{nanos}"))
    }

    #[test]
    fn missing_base_url_fails_lazily() {
        let config = TrackerConfig::new();
        let err = config.api_root().unwrap_err();
        assert!(matches!(err, TrackerError::Configuration(_)));
    }

    #[test]
    fn api_root_gains_trailing_slash() {
        let config = TrackerConfig::new().with_base_url("https://jira.example.com/rest/api/2");
        assert_eq!(
            config.api_root().unwrap().as_str(),
            "https://jira.example.com/rest/api/2/"
        );
    }

    #[test]
    fn settings_load_referenced_files_once() {
        let dir = unique_dir("settings");
        fs::create_dir_all(&dir).expect("create temp directory");
        fs::write(
            dir.join("credentials.json"),
            r#"{"username": "bot", "password": "secret"}"#,
        )
        .unwrap();
        fs::write(
            dir.join("custom_fields.json"),
            r#"{"severity": "customfield_10010"}"#,
        )
        .unwrap();
        fs::write(
            dir.join("settings.json"),
            r#"{
                "api_url": "https://jira.example.com/rest/api/2/",
                "credentials": "credentials.json",
                "custom_fields": "custom_fields.json",
                "transport": {"kind": "process", "interpreter": "/bin/sh", "helper": "helper.sh"}
            }"#,
        )
        .unwrap();

        let settings = Settings::from_file(&dir.join("settings.json")).unwrap();
        let config = TrackerConfig::from_settings(&settings).unwrap();

        assert_eq!(config.credentials, Some(Credentials::new("bot", "secret")));
        assert_eq!(config.field_map.native_name("severity"), "customfield_10010");
        match &config.transport {
            TransportKind::Process(command) => {
                assert_eq!(command.helper, dir.join("helper.sh"));
                assert_eq!(command.interpreter.as_deref(), Some(Path::new("/bin/sh")));
                assert_eq!(command.credentials_file, Some(dir.join("credentials.json")));
            }
            other => panic!("unexpected transport {other:?}"),
        }

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn empty_settings_default_to_http_without_url() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        let config = TrackerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.transport, TransportKind::Http);
        assert!(config.base_url().is_err());
    }
}
