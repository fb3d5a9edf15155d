use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    session: SessionFile,
    #[serde(default)]
    notify: NotifyFile,
    #[serde(default)]
    discovery: DiscoveryFile,
}

#[derive(Deserialize, Default)]
struct SessionFile {
    discovery_timeout_ms: Option<u64>,
    command_timeout_ms: Option<u64>,
    drain_timeout_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct NotifyFile {
    capacity: Option<usize>,
    backpressure: Option<String>,
}

#[derive(Deserialize, Default)]
struct DiscoveryFile {
    addresses: Option<Vec<String>>,
}

/// What the notification queue does when the subscriber falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backpressure {
    /// Discard the oldest queued notification to make room.
    #[default]
    DropOldest,
    /// Block the publisher until the subscriber catches up.
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub discovery_timeout: Duration,
    pub command_timeout: Duration,
    pub drain_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_millis(2000),
            command_timeout: Duration::from_millis(5000),
            drain_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyConfig {
    pub capacity: usize,
    pub backpressure: Backpressure,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            backpressure: Backpressure::DropOldest,
        }
    }
}

pub struct Config {
    session: SessionFile,
    notify: NotifyFile,
    discovery: DiscoveryFile,
}

impl Config {
    /// Embedded defaults merged with the user's config file, if there is one.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::embedded(),
        }
    }

    /// Embedded defaults merged with the file at `path`. An unreadable or
    /// malformed file is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::embedded();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => config.merge(user),
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        config
    }

    /// Embedded defaults merged with a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let user: ConfigFile = toml::from_str(contents)?;
        let mut config = Self::embedded();
        config.merge(user);
        Ok(config)
    }

    fn embedded() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            session: base.session,
            notify: base.notify,
            discovery: base.discovery,
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_session(&mut self.session, user.session);
        merge_notify(&mut self.notify, user.notify);
        if user.discovery.addresses.is_some() {
            self.discovery.addresses = user.discovery.addresses;
        }
    }

    /// Session timeouts, clamped to 10ms..10min.
    pub fn session(&self) -> SessionConfig {
        let fallback = SessionConfig::default();
        let ms = |v: Option<u64>, d: Duration| {
            v.map(|ms| Duration::from_millis(ms.clamp(10, 600_000)))
                .unwrap_or(d)
        };
        SessionConfig {
            discovery_timeout: ms(self.session.discovery_timeout_ms, fallback.discovery_timeout),
            command_timeout: ms(self.session.command_timeout_ms, fallback.command_timeout),
            drain_timeout: ms(self.session.drain_timeout_ms, fallback.drain_timeout),
        }
    }

    /// Subscriber queue settings; capacity clamped to 1..65536.
    pub fn notify(&self) -> NotifyConfig {
        let fallback = NotifyConfig::default();
        NotifyConfig {
            capacity: self
                .notify
                .capacity
                .unwrap_or(fallback.capacity)
                .clamp(1, 65_536),
            backpressure: self
                .notify
                .backpressure
                .as_deref()
                .and_then(parse_backpressure)
                .unwrap_or(fallback.backpressure),
        }
    }

    /// Addresses the network provider probes during discovery.
    pub fn discovery_addresses(&self) -> Vec<String> {
        self.discovery.addresses.clone().unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::embedded()
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("podlink").join("config.toml"))
}

fn merge_session(base: &mut SessionFile, user: SessionFile) {
    if user.discovery_timeout_ms.is_some() {
        base.discovery_timeout_ms = user.discovery_timeout_ms;
    }
    if user.command_timeout_ms.is_some() {
        base.command_timeout_ms = user.command_timeout_ms;
    }
    if user.drain_timeout_ms.is_some() {
        base.drain_timeout_ms = user.drain_timeout_ms;
    }
}

fn merge_notify(base: &mut NotifyFile, user: NotifyFile) {
    if user.capacity.is_some() {
        base.capacity = user.capacity;
    }
    if user.backpressure.is_some() {
        base.backpressure = user.backpressure;
    }
}

fn parse_backpressure(s: &str) -> Option<Backpressure> {
    match s.to_lowercase().as_str() {
        "drop-oldest" | "drop_oldest" | "dropoldest" => Some(Backpressure::DropOldest),
        "block" => Some(Backpressure::Block),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_embedded_config() {
        let config = Config::default();
        let session = config.session();
        assert_eq!(session.discovery_timeout, Duration::from_millis(2000));
        assert_eq!(session.command_timeout, Duration::from_millis(5000));
        assert_eq!(session.drain_timeout, Duration::from_millis(5000));
        assert_eq!(config.notify(), NotifyConfig::default());
        assert!(config.discovery_addresses().is_empty());
    }

    #[test]
    fn test_user_values_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [notify]
            backpressure = "block"

            [discovery]
            addresses = ["127.0.0.1:7400"]
            "#,
        )
        .unwrap();
        assert_eq!(config.notify().backpressure, Backpressure::Block);
        assert_eq!(config.notify().capacity, 256);
        assert_eq!(config.discovery_addresses(), vec!["127.0.0.1:7400".to_string()]);
        assert_eq!(config.session().drain_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_values_are_clamped() {
        let config = Config::from_toml_str(
            "[session]\ncommand_timeout_ms = 1\n[notify]\ncapacity = 0\n",
        )
        .unwrap();
        assert_eq!(config.session().command_timeout, Duration::from_millis(10));
        assert_eq!(config.notify().capacity, 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\ndiscovery_timeout_ms = 250").unwrap();
        let config = Config::load_from(file.path());
        assert_eq!(config.session().discovery_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[notify\ncapacity = ").unwrap();
        let config = Config::load_from(file.path());
        assert_eq!(config.notify(), NotifyConfig::default());
    }

    #[test]
    fn test_parse_backpressure() {
        assert_eq!(parse_backpressure("Drop-Oldest"), Some(Backpressure::DropOldest));
        assert_eq!(parse_backpressure("block"), Some(Backpressure::Block));
        assert_eq!(parse_backpressure("spill"), None);
    }
}
