//! Turns the helper's command-line flags into a tracker configuration.

use bts_api::{Credentials, FieldMap, Result, TrackerConfig, TransportKind};

use crate::cli::Cli;

/// User agent sent by the helper, so tracker logs tell it apart from in-process clients.
pub const HELPER_USER_AGENT: &str = concat!("bts-helper/", env!("CARGO_PKG_VERSION"));

/// Builds the configuration for one helper run.
///
/// The helper always talks HTTP itself; referenced files are read once, here.
pub fn tracker_config(cli: &Cli) -> Result<TrackerConfig> {
    let mut config = TrackerConfig::new()
        .with_base_url(cli.api_url.clone())
        .with_transport(TransportKind::Http)
        .with_user_agent(HELPER_USER_AGENT);
    if let Some(path) = &cli.credentials {
        config = config.with_credentials(Credentials::from_file(path)?);
    }
    if let Some(path) = &cli.custom_fields {
        config = config.with_field_map(FieldMap::from_file(path)?);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::tracker_config;
    use crate::cli::Cli;
    use bts_api::TrackerError;
    use clap::Parser;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let dir = env::temp_dir().join(format!("bts-helper-tests-{name}-{nanos}"));
        fs::create_dir_all(&dir).expect("create temp directory");
        dir
    }

    #[test]
    fn reads_credentials_and_custom_fields() {
        let dir = unique_dir("config");
        let credentials = dir.join("credentials.json");
        let custom_fields = dir.join("custom_fields.json");
        fs::write(&credentials, r#"{"username": "bot", "password": "secret"}"#).unwrap();
        fs::write(&custom_fields, r#"{"severity": "customfield_10010"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "bts-helper",
            "--api-url",
            "https://jira.example.com/rest/api/2",
            "--credentials",
            credentials.to_str().unwrap(),
            "--custom-fields",
            custom_fields.to_str().unwrap(),
        ])
        .unwrap();
        let config = tracker_config(&cli).unwrap();

        assert_eq!(config.base_url().unwrap(), "https://jira.example.com/rest/api/2");
        assert_eq!(config.credentials.as_ref().unwrap().username, "bot");
        assert_eq!(config.field_map.native_name("severity"), "customfield_10010");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unreadable_credentials_are_a_configuration_error() {
        let dir = unique_dir("missing");
        let missing = dir.join("nope.json");
        let cli = Cli::try_parse_from([
            "bts-helper",
            "--api-url",
            "http://localhost",
            "--credentials",
            missing.to_str().unwrap(),
        ])
        .unwrap();

        let err = tracker_config(&cli).unwrap_err();
        assert!(matches!(err, TrackerError::Configuration(_)));

        let _ = fs::remove_dir_all(dir);
    }
}
