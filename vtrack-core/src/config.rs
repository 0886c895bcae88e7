//! Configuration file management for vtrack.
//!
//! Reads/writes `~/.vtrack/config.yaml` with server address, database path,
//! geocoder settings, poll interval, and broadcast buffer size.

use std::path::PathBuf;

use crate::types::TrackError;

/// Full configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub geocoder: GeocoderConfig,
    pub poller: PollerConfig,
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub url: String,
    pub query: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Seconds between pull ingestions; 0 disables the poller.
    pub interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Events buffered per observer before the slowest one starts losing them.
    pub capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 5000,
            },
            database: DatabaseConfig {
                path: "data/vtrack.db".into(),
            },
            geocoder: GeocoderConfig {
                url: "https://nominatim.openstreetmap.org/search".into(),
                query: "Chennai, India".into(),
                user_agent: "VehicleTrackerApp".into(),
                timeout_ms: 5000,
            },
            poller: PollerConfig { interval_secs: 0 },
            broadcast: BroadcastConfig { capacity: 64 },
        }
    }
}

/// Get the config directory path (`~/.vtrack/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".vtrack")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.vtrack/config.yaml`.
///
/// Returns default config if the file doesn't exist or can't be read.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(text) => parse_config(&text),
        Err(_) => Config::default(),
    }
}

/// Save config to `~/.vtrack/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, TrackError> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| TrackError::Config(e.to_string()))?;

    let path = config_file();
    std::fs::write(&path, serialize_config(config))
        .map_err(|e| TrackError::Config(e.to_string()))?;

    Ok(path)
}

/// Parse simple YAML-like config text. Unknown keys are ignored and
/// unparsable values keep their defaults.
pub fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');
        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            section = val.is_empty().then(|| key.to_string());
            continue;
        }

        match (section.as_deref(), key) {
            (Some("server"), "host") => set_string(&mut config.server.host, val),
            (Some("server"), "port") => set_parsed(&mut config.server.port, val),
            (Some("database"), "path") => set_string(&mut config.database.path, val),
            (Some("geocoder"), "url") => set_string(&mut config.geocoder.url, val),
            (Some("geocoder"), "query") => set_string(&mut config.geocoder.query, val),
            (Some("geocoder"), "user_agent") => set_string(&mut config.geocoder.user_agent, val),
            (Some("geocoder"), "timeout_ms") => set_parsed(&mut config.geocoder.timeout_ms, val),
            (Some("poller"), "interval_secs") => set_parsed(&mut config.poller.interval_secs, val),
            (Some("broadcast"), "capacity") => set_parsed(&mut config.broadcast.capacity, val),
            _ => {}
        }
    }

    config
}

fn set_string(slot: &mut String, val: &str) {
    if let Some(v) = parse_string_value(val) {
        *slot = v;
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, val: &str) {
    if let Ok(v) = val.parse() {
        *slot = v;
    }
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let lines = [
        "# vtrack configuration".to_string(),
        String::new(),
        "server:".into(),
        format!("  host: \"{}\"", config.server.host),
        format!("  port: {}", config.server.port),
        String::new(),
        "database:".into(),
        format!("  path: \"{}\"", config.database.path),
        String::new(),
        "geocoder:".into(),
        format!("  url: \"{}\"", config.geocoder.url),
        format!("  query: \"{}\"", config.geocoder.query),
        format!("  user_agent: \"{}\"", config.geocoder.user_agent),
        format!("  timeout_ms: {}", config.geocoder.timeout_ms),
        String::new(),
        "poller:".into(),
        format!("  interval_secs: {}", config.poller.interval_secs),
        String::new(),
        "broadcast:".into(),
        format!("  capacity: {}", config.broadcast.capacity),
    ];

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.geocoder.query, "Chennai, India");
        assert_eq!(config.geocoder.timeout_ms, 5000);
        assert_eq!(config.poller.interval_secs, 0);
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
server:
  host: "127.0.0.1"
  port: 9090

database:
  path: "/tmp/test.db"

geocoder:
  url: "http://localhost:8088/search"
  query: 'Mumbai, India'
  timeout_ms: 1500

poller:
  interval_secs: 3

broadcast:
  capacity: 16
"#;
        let config = parse_config(text);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.path, "/tmp/test.db");
        assert_eq!(config.geocoder.url, "http://localhost:8088/search");
        assert_eq!(config.geocoder.query, "Mumbai, India");
        assert_eq!(config.geocoder.user_agent, "VehicleTrackerApp");
        assert_eq!(config.geocoder.timeout_ms, 1500);
        assert_eq!(config.poller.interval_secs, 3);
        assert_eq!(config.broadcast.capacity, 16);
    }

    #[test]
    fn test_parse_config_bad_values_keep_defaults() {
        let text = r#"
server:
  port: not-a-port
database:
  path: null
"#;
        let config = parse_config(text);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.path, "data/vtrack.db");
    }

    #[test]
    fn test_keys_outside_section_ignored() {
        let text = "port: 1234\n  port: 4321\n";
        let config = parse_config(text);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.server.port = 7000;
        config.geocoder.query = "Delhi, India".into();
        config.poller.interval_secs = 10;

        let parsed = parse_config(&serialize_config(&config));
        assert_eq!(parsed.server.port, 7000);
        assert_eq!(parsed.geocoder.query, "Delhi, India");
        assert_eq!(parsed.poller.interval_secs, 10);
        assert_eq!(parsed.broadcast.capacity, 64);
    }
}
