//! Connection configuration
//!
//! Resolution order per field: command-line flag, environment variable,
//! TOML config file, built-in default. Flags and variables are handled by
//! clap; the file only fills what both left empty.

use adt_core::{AdtError, AdtResult, ConnectionProfile, Secret};
use clap::Args;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Connection settings from flags and environment
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// SAP host, optionally with scheme and port
    #[arg(long, env = "SAP_HOST", global = true)]
    pub host: Option<String>,

    /// Port appended to the host when it carries none
    #[arg(long, env = "SAP_PORT", global = true)]
    pub port: Option<u16>,

    /// SAP client (mandant)
    #[arg(long, env = "SAP_CLIENT", global = true)]
    pub client: Option<String>,

    /// Logon user
    #[arg(short, long, env = "SAP_USERNAME", global = true)]
    pub username: Option<String>,

    /// Logon password
    #[arg(long, env = "SAP_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Logon language
    #[arg(long, env = "SAP_LANGUAGE", global = true)]
    pub language: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, global = true)]
    pub insecure: bool,
}

/// Contents of the TOML config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// SAP host
    pub host: Option<String>,
    /// Port appended to the host
    pub port: Option<u16>,
    /// SAP client
    pub client: Option<String>,
    /// Logon user
    pub username: Option<String>,
    /// Logon password
    pub password: Option<String>,
    /// Logon language
    pub language: Option<String>,
    /// Accept self-signed TLS certificates
    pub allow_self_signed: bool,
    /// Connectivity probe timeout in seconds
    pub connect_timeout_secs: Option<u64>,
    /// Request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load and parse a config file
    ///
    /// # Errors
    /// - `AdtError::Config` if the file is unreadable or malformed
    pub fn load(path: &Path) -> AdtResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AdtError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| AdtError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

/// Merge flags, environment and file into a validated profile
///
/// # Errors
/// - `AdtError::Config` naming the flag and variable of a missing value
pub fn resolve(args: &ConnectionArgs, file: &FileConfig) -> AdtResult<ConnectionProfile> {
    let host = required(args.host.as_ref().or(file.host.as_ref()), "--host", "SAP_HOST")?;
    let username = required(
        args.username.as_ref().or(file.username.as_ref()),
        "--username",
        "SAP_USERNAME",
    )?;
    let password = required(
        args.password.as_ref().or(file.password.as_ref()),
        "--password",
        "SAP_PASSWORD",
    )?;

    let host = match args.port.or(file.port) {
        Some(port) if !has_port(host) => format!("{}:{port}", host.trim_end_matches('/')),
        _ => host.to_string(),
    };

    let mut profile = ConnectionProfile::new(host, username, Secret::new(password))
        .with_self_signed(args.insecure || file.allow_self_signed);
    if let Some(client) = args.client.as_ref().or(file.client.as_ref()) {
        profile = profile.with_client(client);
    }
    if let Some(language) = args.language.as_ref().or(file.language.as_ref()) {
        profile = profile.with_language(language);
    }
    if let Some(secs) = file.connect_timeout_secs {
        profile = profile.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = file.request_timeout_secs {
        profile = profile.with_request_timeout(Duration::from_secs(secs));
    }

    profile.validate()?;
    Ok(profile)
}

fn required<'a>(value: Option<&'a String>, flag: &str, var: &str) -> AdtResult<&'a str> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AdtError::Config(format!("missing {flag} (or set {var})")))
}

/// Whether the authority part already names a port
fn has_port(host: &str) -> bool {
    let rest = host.split_once("://").map_or(host, |(_, rest)| rest);
    let authority = rest.split('/').next().unwrap_or(rest);
    authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn args(host: &str, user: &str, password: &str) -> ConnectionArgs {
        ConnectionArgs {
            host: Some(host.to_string()),
            username: Some(user.to_string()),
            password: Some(password.to_string()),
            ..ConnectionArgs::default()
        }
    }

    #[test]
    fn port_is_appended_once() {
        let mut a = args("erp.local", "DEV", "pw");
        a.port = Some(8000);
        assert_eq!(resolve(&a, &FileConfig::default()).unwrap().host(), "erp.local:8000");

        let mut a = args("https://erp.local:44300", "DEV", "pw");
        a.port = Some(8000);
        assert_eq!(
            resolve(&a, &FileConfig::default()).unwrap().host(),
            "https://erp.local:44300"
        );
    }

    #[test]
    fn flags_win_over_file() {
        let file = FileConfig {
            host: Some("file-host".into()),
            client: Some("200".into()),
            language: Some("de".into()),
            ..FileConfig::default()
        };
        let profile = resolve(&args("flag-host", "DEV", "pw"), &file).unwrap();

        assert_eq!(profile.host(), "flag-host");
        assert_eq!(profile.client(), "200");
        assert_eq!(profile.language(), "DE");
    }

    #[test]
    fn missing_password_names_flag_and_variable() {
        let mut a = args("erp.local", "DEV", "pw");
        a.password = None;

        let err = resolve(&a, &FileConfig::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("--password"));
        assert!(message.contains("SAP_PASSWORD"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = resolve(&args("  ", "DEV", "pw"), &FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("SAP_HOST"));
    }

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
host = "erp.local"
port = 8000
username = "DEVELOPER"
password = "secret"
allow_self_signed = true
request_timeout_secs = 5
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        let profile = resolve(&ConnectionArgs::default(), &config).unwrap();

        assert_eq!(profile.host(), "erp.local:8000");
        assert_eq!(profile.username(), "DEVELOPER");
        assert!(profile.allow_self_signed());
        assert_eq!(profile.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hots = \"typo\"").unwrap();

        assert!(matches!(
            FileConfig::load(file.path()).unwrap_err(),
            AdtError::Config(_)
        ));
    }

    #[test]
    fn port_detection() {
        assert!(has_port("erp.local:8000"));
        assert!(has_port("http://erp.local:8000/sap/bc/adt"));
        assert!(!has_port("http://erp.local"));
        assert!(!has_port("erp.local"));
    }
}
