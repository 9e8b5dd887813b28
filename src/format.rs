//! Format adapters: bridges between a config tree and serialized text.
//!
//! Every format implements the same [`Codec`] contract: parse text into an
//! ordered nested mapping of scalar leaves, and serialize such a mapping back
//! to text. Ordering is preserved wherever the grammar allows it
//! (`serde_json` is built with `preserve_order`).
//!
//! | Extension | Format |
//! |-----------|--------|
//! | `.ini`, `.cfg`, `.conf` | [`Format::Ini`] |
//! | `.json` | [`Format::Json`] |
//! | `.yml`, `.yaml` | [`Format::Yaml`] |
//! | `.toml` | [`Format::Toml`] |

use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::ini::IniCodec;

/// File-extension dispatch table.
const EXTENSIONS: &[(&str, Format)] = &[
    ("ini", Format::Ini),
    ("cfg", Format::Ini),
    ("conf", Format::Ini),
    ("json", Format::Json),
    ("yml", Format::Yaml),
    ("yaml", Format::Yaml),
    ("toml", Format::Toml),
];

/// Parse and serialize one text format.
pub trait Codec: Send + Sync {
    fn format(&self) -> Format;

    /// Parse text into an ordered nested mapping.
    fn parse(&self, text: &str) -> Result<Map<String, Value>, ConfigError>;

    /// Serialize an ordered nested mapping back to text.
    fn serialize(&self, data: &Map<String, Value>) -> Result<String, ConfigError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Two levels only: `[section]` and `option = value`, all values text.
    Ini,
    Json,
    Yaml,
    Toml,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Format> {
        let ext = ext.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, format)| *format)
    }

    /// Pick the format for a file path by its extension.
    pub fn from_path(path: &Path) -> Result<Format, ConfigError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
            .ok_or_else(|| ConfigError::UnknownFormat(path.to_path_buf()))
    }

    pub fn codec(self) -> &'static dyn Codec {
        match self {
            Format::Ini => &IniCodec,
            Format::Json => &JsonCodec,
            Format::Yaml => &YamlCodec,
            Format::Toml => &TomlCodec,
        }
    }

    /// Deepest path the format can represent, if limited.
    pub fn max_depth(self) -> Option<usize> {
        match self {
            Format::Ini => Some(2),
            _ => None,
        }
    }

    /// Whether the format stores every value as text. Trees written to such
    /// a format emit each item's textual rendering instead of its value.
    pub fn is_textual(self) -> bool {
        matches!(self, Format::Ini)
    }

    pub fn parse(self, text: &str) -> Result<Map<String, Value>, ConfigError> {
        self.codec().parse(text)
    }

    pub fn serialize(self, data: &Map<String, Value>) -> Result<String, ConfigError> {
        self.codec().serialize(data)
    }

    pub fn read_file(self, path: &Path) -> Result<Map<String, Value>, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), format = %self, "read config file");
        self.parse(&content)
    }

    /// Serialize `data` and write it to `path`, creating parent directories.
    pub fn write_file(self, path: &Path, data: &Map<String, Value>) -> Result<(), ConfigError> {
        let content = self.serialize(data)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), format = %self, "wrote config file");
        Ok(())
    }

    fn parse_error(self, reason: impl fmt::Display) -> ConfigError {
        ConfigError::ParseError {
            format: self,
            reason: reason.to_string(),
        }
    }

    fn serialize_error(self, reason: impl fmt::Display) -> ConfigError {
        ConfigError::SerializeError {
            format: self,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Ini => "INI",
            Format::Json => "JSON",
            Format::Yaml => "YAML",
            Format::Toml => "TOML",
        })
    }
}

/// Top-level documents must be mappings; an empty document is an empty one.
fn top_level(format: Format, value: Value) -> Result<Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(format.parse_error(format!("top level must be a mapping, got {other}"))),
    }
}

pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn parse(&self, text: &str) -> Result<Map<String, Value>, ConfigError> {
        let value: Value = serde_json::from_str(text).map_err(|e| Format::Json.parse_error(e))?;
        top_level(Format::Json, value)
    }

    fn serialize(&self, data: &Map<String, Value>) -> Result<String, ConfigError> {
        let mut out =
            serde_json::to_string_pretty(data).map_err(|e| Format::Json.serialize_error(e))?;
        out.push('\n');
        Ok(out)
    }
}

pub struct YamlCodec;

impl Codec for YamlCodec {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn parse(&self, text: &str) -> Result<Map<String, Value>, ConfigError> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| Format::Yaml.parse_error(e))?;
        top_level(Format::Yaml, value)
    }

    fn serialize(&self, data: &Map<String, Value>) -> Result<String, ConfigError> {
        serde_yaml::to_string(data).map_err(|e| Format::Yaml.serialize_error(e))
    }
}

pub struct TomlCodec;

impl Codec for TomlCodec {
    fn format(&self) -> Format {
        Format::Toml
    }

    fn parse(&self, text: &str) -> Result<Map<String, Value>, ConfigError> {
        toml::from_str(text).map_err(|e| Format::Toml.parse_error(e))
    }

    /// TOML has no null; `null` entries are left out.
    fn serialize(&self, data: &Map<String, Value>) -> Result<String, ConfigError> {
        toml::to_string(&without_nulls(data)).map_err(|e| Format::Toml.serialize_error(e))
    }
}

fn without_nulls(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .filter_map(|(k, v)| non_null(v).map(|v| (k.clone(), v)))
        .collect()
}

fn non_null(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(Value::Array(items.iter().filter_map(non_null).collect())),
        Value::Object(map) => Some(Value::Object(without_nulls(map))),
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample() -> Map<String, Value> {
        match json!({
            "uploads": {
                "enabled": true,
                "threads": 5,
                "db": {"user": "root"},
            }
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn extension_dispatch() {
        assert_eq!(Format::from_path(&PathBuf::from("a/b.ini")).unwrap(), Format::Ini);
        assert_eq!(Format::from_path(&PathBuf::from("b.YAML")).unwrap(), Format::Yaml);
        assert_eq!(Format::from_path(&PathBuf::from("b.yml")).unwrap(), Format::Yaml);
        assert_eq!(Format::from_path(&PathBuf::from("b.json")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(&PathBuf::from("b.toml")).unwrap(), Format::Toml);
        assert!(matches!(
            Format::from_path(&PathBuf::from("b.xml")),
            Err(ConfigError::UnknownFormat(_))
        ));
        assert!(Format::from_path(&PathBuf::from("noext")).is_err());
    }

    #[test]
    fn yaml_output_is_ordered_block_style() {
        let text = Format::Yaml.serialize(&sample()).unwrap();
        assert_eq!(
            text,
            "uploads:\n  enabled: true\n  threads: 5\n  db:\n    user: root\n"
        );
    }

    #[test]
    fn yaml_parse_preserves_order() {
        let map = Format::Yaml
            .parse("b: 1\na:\n  z: x\n  y: true\n")
            .unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        let inner = map["a"].as_object().unwrap();
        assert_eq!(inner.keys().collect::<Vec<_>>(), vec!["z", "y"]);
    }

    #[test]
    fn empty_yaml_is_empty_mapping() {
        assert!(Format::Yaml.parse("").unwrap().is_empty());
    }

    #[test]
    fn json_round_trip() {
        let text = Format::Json.serialize(&sample()).unwrap();
        assert_eq!(Format::Json.parse(&text).unwrap(), sample());
    }

    #[test]
    fn json_top_level_must_be_mapping() {
        assert!(matches!(
            Format::Json.parse("[1, 2]"),
            Err(ConfigError::ParseError { format: Format::Json, .. })
        ));
    }

    #[test]
    fn toml_round_trip() {
        let text = Format::Toml.serialize(&sample()).unwrap();
        assert!(text.contains("[uploads]"));
        assert_eq!(Format::Toml.parse(&text).unwrap(), sample());
    }

    #[test]
    fn toml_leaves_out_nulls() {
        let data = match json!({"uploads": {"type": null, "threads": 1, "tags": ["a", null]}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let text = Format::Toml.serialize(&data).unwrap();
        let parsed = Format::Toml.parse(&text).unwrap();
        assert_eq!(
            Value::Object(parsed),
            json!({"uploads": {"threads": 1, "tags": ["a"]}})
        );
    }

    #[test]
    fn codecs_report_their_format() {
        for format in [Format::Ini, Format::Json, Format::Yaml, Format::Toml] {
            assert_eq!(format.codec().format(), format);
        }
    }

    #[test]
    fn toml_parse_error() {
        assert!(matches!(
            Format::Toml.parse("this is not toml"),
            Err(ConfigError::ParseError { format: Format::Toml, .. })
        ));
    }

    #[test]
    fn write_and_read_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("conf.json");
        Format::Json.write_file(&path, &sample()).unwrap();
        assert_eq!(Format::Json.read_file(&path).unwrap(), sample());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = Format::Yaml.read_file(&dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
