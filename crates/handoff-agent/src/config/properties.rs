//! Flat key/value property sources
//!
//! Configuration files are nested documents; resolution works on flat
//! dotted keys. Loading flattens `[data.orders] sql = "..."` into
//! `data.orders.sql`, and scalars are kept in their textual form.

use crate::error::{AgentError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// An ordered map of property keys to raw string values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a configuration file, choosing the format by extension
    ///
    /// `.yml`/`.yaml` are read as YAML, `.properties` as `key=value`
    /// lines, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content =
            std::fs::read_to_string(path).map_err(|e| AgentError::config_file(&display, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let parsed = match extension.as_deref() {
            Some("yml" | "yaml") => Self::from_yaml_str(&content),
            Some("properties") => Ok(Self::from_properties_str(&content)),
            _ => Self::from_toml_str(&content),
        };
        let properties = parsed.map_err(|reason| AgentError::config_file(&display, reason))?;

        tracing::debug!(path = %path.display(), keys = properties.len(), "Loaded configuration file");
        Ok(properties)
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        let table: toml::Table = content.parse().map_err(|e: toml::de::Error| e.to_string())?;
        let mut properties = Self::new();
        for (key, value) in &table {
            flatten_toml(key, value, &mut properties)?;
        }
        Ok(properties)
    }

    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, String> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        let mut properties = Self::new();
        match value {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Mapping(map) => flatten_yaml_mapping("", &map, &mut properties)?,
            _ => return Err("top level must be a mapping".to_string()),
        }
        Ok(properties)
    }

    /// `key=value` / `key: value` lines; `#` and `!` start comments
    pub fn from_properties_str(content: &str) -> Self {
        let mut properties = Self::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split = line.find(['=', ':']);
            let (key, value) = match split {
                Some(idx) => (&line[..idx], &line[idx + 1..]),
                None => (line, ""),
            };
            properties.insert(key.trim(), value.trim());
        }
        properties
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (k, v) in iter {
            properties.insert(k, v);
        }
        properties
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn flatten_toml(
    key: &str,
    value: &toml::Value,
    out: &mut Properties,
) -> std::result::Result<(), String> {
    match value {
        toml::Value::Table(table) => {
            for (child, value) in table {
                flatten_toml(&join_key(key, child), value, out)?;
            }
        }
        toml::Value::String(s) => out.insert(key, s.clone()),
        toml::Value::Integer(i) => out.insert(key, i.to_string()),
        toml::Value::Float(f) => out.insert(key, f.to_string()),
        toml::Value::Boolean(b) => out.insert(key, b.to_string()),
        toml::Value::Datetime(d) => out.insert(key, d.to_string()),
        toml::Value::Array(_) => return Err(format!("'{key}': arrays are not supported")),
    }
    Ok(())
}

fn flatten_yaml_mapping(
    prefix: &str,
    map: &serde_yaml::Mapping,
    out: &mut Properties,
) -> std::result::Result<(), String> {
    for (k, v) in map {
        let child = match k {
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            _ => return Err(format!("unsupported key under '{prefix}'")),
        };
        flatten_yaml(&join_key(prefix, &child), v, out)?;
    }
    Ok(())
}

fn flatten_yaml(
    key: &str,
    value: &serde_yaml::Value,
    out: &mut Properties,
) -> std::result::Result<(), String> {
    match value {
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Bool(b) => out.insert(key, b.to_string()),
        serde_yaml::Value::Number(n) => out.insert(key, n.to_string()),
        serde_yaml::Value::String(s) => out.insert(key, s.clone()),
        serde_yaml::Value::Mapping(map) => flatten_yaml_mapping(key, map, out)?,
        serde_yaml::Value::Tagged(tagged) => flatten_yaml(key, &tagged.value, out)?,
        serde_yaml::Value::Sequence(_) => {
            return Err(format!("'{key}': sequences are not supported"))
        }
    }
    Ok(())
}

/// Parse a `key=value` assignment given on the command line
pub fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_toml_is_flattened_to_dotted_keys() {
        let props = Properties::from_toml_str(
            r#"
[store]
username = "agent"
send_credentials = true

[data.orders]
sql = "SELECT * FROM orders"
"#,
        )
        .unwrap();

        assert_eq!(props.get("store.username"), Some("agent"));
        assert_eq!(props.get("store.send_credentials"), Some("true"));
        assert_eq!(props.get("data.orders.sql"), Some("SELECT * FROM orders"));
    }

    #[test]
    fn test_toml_arrays_rejected() {
        let err = Properties::from_toml_str("etl.graph = [1, 2]").unwrap_err();
        assert!(err.contains("etl.graph"));
    }

    #[test]
    fn test_yaml_is_flattened() {
        let props = Properties::from_yaml_str(
            "store:\n  username: agent\n  upload_url: http://dav.local/in\nfilesystem:\n  wildcard: '*.csv'\n  input_dir: ~\n",
        )
        .unwrap();

        assert_eq!(props.get("store.username"), Some("agent"));
        assert_eq!(props.get("store.upload_url"), Some("http://dav.local/in"));
        assert_eq!(props.get("filesystem.wildcard"), Some("*.csv"));
        assert_eq!(props.get("filesystem.input_dir"), None);
    }

    #[test]
    fn test_properties_lines() {
        let props = Properties::from_properties_str(
            "# comment\nstore.username = agent\netl.param.region: emea\n\nflag\n",
        );
        assert_eq!(props.get("store.username"), Some("agent"));
        assert_eq!(props.get("etl.param.region"), Some("emea"));
        assert_eq!(props.get("flag"), Some(""));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_load_picks_format_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "etl:\n  graph: graph/load.grf").unwrap();
        let props = Properties::load(file.path()).unwrap();
        assert_eq!(props.get("etl.graph"), Some("graph/load.grf"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[etl]\ngraph = \"graph/load.grf\"").unwrap();
        let props = Properties::load(file.path()).unwrap();
        assert_eq!(props.get("etl.graph"), Some("graph/load.grf"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Properties::load("/nonexistent/handoff.toml").unwrap_err();
        assert!(matches!(err, AgentError::ConfigFile { .. }));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("etl.param.x=a=b").unwrap(),
            ("etl.param.x".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=v").is_err());
    }
}
