//! `drise.options` key/value parser and the `RISE_MEDIA_PATH` locator (§6,
//! ADDED ambient stack). The options format is a bespoke `key = value` text
//! format described only in prose in the retrieved spec, not TOML/JSON, so
//! this stays a small hand-rolled parser rather than reaching for a config
//! crate that doesn't model it.

use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_PORT: u32 = 41337;
pub const DEFAULT_SERVER_NAME: &str = "default";

/// Parsed `key = value` pairs from a `drise.options`-style file: `#`-comment
/// lines and blank lines are skipped.
pub struct Options {
    values: HashMap<String, String>,
}

impl Options {
    pub fn parse(contents: &str) -> Self {
        let mut values = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self { values }
    }

    pub fn load(path: &str) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.values.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str, default: u32) -> u32 {
        self.values.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn server_name(&self) -> String {
        self.get_str("server_name", DEFAULT_SERVER_NAME)
    }

    pub fn port_number(&self) -> u32 {
        self.get_int("port_number", DEFAULT_PORT)
    }
}

/// Resource search list read from `RISE_MEDIA_PATH`, split on the
/// platform's path-list separator. An absent variable is logged as a
/// warning and treated as an empty list — it does not abort (§6).
pub struct MediaPath {
    pub roots: Vec<PathBuf>,
}

impl MediaPath {
    pub fn from_env() -> Self {
        match std::env::var("RISE_MEDIA_PATH") {
            Ok(value) => {
                let separator = if cfg!(windows) { ';' } else { ':' };
                Self { roots: value.split(separator).map(PathBuf::from).collect() }
            }
            Err(_) => {
                log::warn!("RISE_MEDIA_PATH is not set; resource search list is empty");
                Self { roots: Vec::new() }
            }
        }
    }

    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        self.roots.iter().map(|root| root.join(relative)).find(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_and_skips_comments() {
        let options = Options::parse(
            "# a comment\nport_number = 9001\nserver_name=renderfarm\n\nstray_blank_above",
        );
        assert_eq!(options.port_number(), 9001);
        assert_eq!(options.server_name(), "renderfarm");
    }

    #[test]
    fn missing_keys_fall_back_to_documented_defaults() {
        let options = Options::parse("");
        assert_eq!(options.port_number(), DEFAULT_PORT);
        assert_eq!(options.server_name(), DEFAULT_SERVER_NAME);
    }

    #[test]
    fn media_path_splits_on_platform_separator() {
        std::env::set_var("RISE_MEDIA_PATH", if cfg!(windows) { "a;b" } else { "a:b" });
        let media = MediaPath::from_env();
        assert_eq!(media.roots.len(), 2);
        std::env::remove_var("RISE_MEDIA_PATH");
    }
}
