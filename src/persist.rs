//! Tree persistence: patch item values into TOML files while preserving formatting.
//!
//! Uses `toml_edit` for comment-preserving edits, so a hand-written config
//! file keeps its comments and layout when a tree writes its values back.
//! Creates parent directories as needed.

use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;
use crate::format::Format;
use crate::section::{KeyShape, Section, TreeKey};

/// Pure function: patch a TOML document string, setting the item at `path`.
///
/// If `content` is `None` (file doesn't exist yet), starts from an empty
/// document. `null` has no TOML form and removes the key instead.
///
/// Returns the modified document string.
pub fn set_in_document(
    content: Option<&str>,
    path: &[String],
    value: &Value,
) -> Result<String, ConfigError> {
    let mut doc = parse_document(content)?;
    set_in(&mut doc, path, value);
    Ok(doc.to_string())
}

/// Pure function: remove the key at `path` from a TOML document string.
/// Missing keys are not an error.
pub fn unset_in_document(content: &str, path: &[String]) -> Result<String, ConfigError> {
    let mut doc = parse_document(Some(content))?;
    unset_in(&mut doc, path);
    Ok(doc.to_string())
}

/// Write every item of `section` into the TOML file at `file_path`.
///
/// Items that would be dumped (see [`Section::dump_values`]) are set; all
/// other items are removed from the file. Keys the tree does not declare are
/// left untouched.
pub fn persist_tree(
    file_path: &Path,
    section: &Section,
    with_defaults: bool,
) -> Result<(), ConfigError> {
    let content = match std::fs::read_to_string(file_path) {
        Ok(c) => Some(c),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(ConfigError::IoError {
                path: file_path.to_path_buf(),
                source: e,
            });
        }
    };

    let mut doc = parse_document(content.as_deref())?;
    let mut written = 0;
    for (key, item) in section.iter_items(true, KeyShape::Path) {
        let TreeKey::Path(path) = key else { continue };
        let dumped = item.has_value() || (with_defaults && item.has_default());
        match item.value()? {
            Some(value) if dumped => {
                set_in(&mut doc, &path, &value);
                written += 1;
            }
            _ => unset_in(&mut doc, &path),
        }
    }

    if let Some(parent) = file_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(file_path, doc.to_string()).map_err(|e| ConfigError::IoError {
        path: file_path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %file_path.display(), written, "persisted config tree");
    Ok(())
}

fn parse_document(content: Option<&str>) -> Result<toml_edit::DocumentMut, ConfigError> {
    content
        .unwrap_or_default()
        .parse()
        .map_err(|e: toml_edit::TomlError| ConfigError::ParseError {
            format: Format::Toml,
            reason: e.to_string(),
        })
}

fn set_in(doc: &mut toml_edit::DocumentMut, path: &[String], value: &Value) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };
    let Some(value) = to_toml_value(value) else {
        unset_in(doc, path);
        return;
    };

    // Navigate to the key, creating intermediate tables as needed.
    let mut current: &mut toml_edit::Item = doc.as_item_mut();
    for segment in parents {
        if !current.get(segment.as_str()).is_some_and(toml_edit::Item::is_table_like) {
            current[segment.as_str()] = toml_edit::Item::Table(toml_edit::Table::new());
        }
        current = &mut current[segment.as_str()];
    }
    current[leaf.as_str()] = toml_edit::value(value);
}

fn unset_in(doc: &mut toml_edit::DocumentMut, path: &[String]) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };
    let mut current: &mut toml_edit::Item = doc.as_item_mut();
    for segment in parents {
        current = match current.get_mut(segment.as_str()) {
            Some(next) => next,
            None => return,
        };
    }
    if let Some(table) = current.as_table_like_mut() {
        table.remove(leaf);
    }
}

/// Convert a JSON value into a `toml_edit::Value`. `None` for `null`.
fn to_toml_value(value: &Value) -> Option<toml_edit::Value> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some((*b).into()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i.into()),
            None => n.as_f64().map(Into::into),
        },
        Value::String(s) => Some(s.as_str().into()),
        Value::Array(items) => Some(toml_edit::Value::Array(
            items.iter().filter_map(to_toml_value).collect(),
        )),
        Value::Object(map) => {
            let mut table = toml_edit::InlineTable::new();
            for (k, v) in map {
                if let Some(v) = to_toml_value(v) {
                    table.insert(k.as_str(), v);
                }
            }
            Some(toml_edit::Value::InlineTable(table))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn path(s: &str) -> Vec<String> {
        s.split('.').map(str::to_string).collect()
    }

    fn tree() -> Section {
        Section::new(json!({
            "host": "localhost",
            "port": 8080,
            "database": {"pool_size": 5, "url": null},
        }))
        .unwrap()
    }

    #[test]
    fn set_existing_key() {
        let content = "port = 8080\nhost = \"localhost\"\n";
        let result = set_in_document(Some(content), &path("port"), &json!(3000)).unwrap();
        assert!(result.contains("port = 3000"));
        assert!(result.contains("host = \"localhost\""));
    }

    #[test]
    fn set_nested_key() {
        let content = "[database]\npool_size = 5\n";
        let result =
            set_in_document(Some(content), &path("database.pool_size"), &json!(20)).unwrap();
        assert!(result.contains("pool_size = 20"));
    }

    #[test]
    fn set_creates_tables_when_none() {
        let result = set_in_document(None, &path("database.url"), &json!("pg://")).unwrap();
        let parsed: toml::Table = toml::from_str(&result).unwrap();
        assert_eq!(parsed["database"]["url"].as_str(), Some("pg://"));
    }

    #[test]
    fn preserves_comments() {
        let content = "# This is my config\nport = 8080\n# end\n";
        let result = set_in_document(Some(content), &path("port"), &json!(3000)).unwrap();
        assert!(result.contains("# This is my config"));
        assert!(result.contains("port = 3000"));
    }

    #[test]
    fn null_removes_key() {
        let content = "port = 8080\nhost = \"x\"\n";
        let result = set_in_document(Some(content), &path("port"), &Value::Null).unwrap();
        assert!(!result.contains("port"));
        assert!(result.contains("host"));
    }

    #[test]
    fn unset_missing_key_is_noop() {
        let content = "port = 8080\n";
        let result = unset_in_document(content, &path("database.url")).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn invalid_document_is_parse_error() {
        assert!(matches!(
            set_in_document(Some("= nope"), &path("a"), &json!(1)),
            Err(ConfigError::ParseError { format: Format::Toml, .. })
        ));
    }

    #[test]
    fn value_conversion() {
        assert!(to_toml_value(&json!(42)).unwrap().is_integer());
        assert!(to_toml_value(&json!(true)).unwrap().is_bool());
        assert!(to_toml_value(&json!("hello")).unwrap().is_str());
        assert!(to_toml_value(&json!(1.5)).unwrap().is_float());
        assert!(to_toml_value(&json!([1, 2])).unwrap().is_array());
        assert!(to_toml_value(&json!({"a": 1})).unwrap().is_inline_table());
        assert!(to_toml_value(&Value::Null).is_none());
    }

    #[test]
    fn persist_creates_file_and_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("sub").join("config.toml");

        persist_tree(&file, &tree(), true).unwrap();

        let parsed: toml::Table = toml::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(parsed["host"].as_str(), Some("localhost"));
        assert_eq!(parsed["port"].as_integer(), Some(8080));
        assert_eq!(parsed["database"]["pool_size"].as_integer(), Some(5));
        assert!(parsed["database"].get("url").is_none());
    }

    #[test]
    fn persist_keeps_comments_and_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, "# managed by hand\nport = 1\nextra = \"kept\"\n").unwrap();

        let mut config = tree();
        config.set_value("port", 3000).unwrap();
        persist_tree(&file, &config, false).unwrap();

        let content = fs::read_to_string(&file).unwrap();
        assert!(content.contains("# managed by hand"));
        assert!(content.contains("port = 3000"));
        assert!(content.contains("extra = \"kept\""));
        assert!(!content.contains("host"));
    }

    #[test]
    fn persist_removes_reset_items() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        let mut config = tree();
        config.set_value("port", 3000).unwrap();
        persist_tree(&file, &config, false).unwrap();
        assert!(fs::read_to_string(&file).unwrap().contains("port = 3000"));

        config.reset();
        persist_tree(&file, &config, false).unwrap();
        assert!(!fs::read_to_string(&file).unwrap().contains("port"));
    }
}
