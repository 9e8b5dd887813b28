//! Declaration normalizer: turn declarations of any shape into a tree.
//!
//! A declaration can be a mapping, a list of names or `(name, child)` pairs,
//! a serde struct, a confique config struct, a file, or a dynamic
//! [`Value`]. Every shape is first normalized into one canonical form, an
//! ordered list of `(name, declaration)` entries, and a single builder turns
//! that list into [`Section`]s and [`Item`]s.
//!
//! Inside a mapping, keys starting with [`META_MARKER`] are metadata, never
//! children. A mapping that carries `@type`, or whose keys are all metadata,
//! declares one item:
//!
//! ```text
//! {"enabled": {"@default": false}}               -> item, type bool
//! {"db": {"@type": "dict", "user": "root"}}      -> item, type dict, default {"user": "root"}
//! {"db": {"@help": "db settings", "user": "x"}}  -> section with help text
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use confique::Config;
use confique::meta::{FieldKind, LeafKind, Meta};
use serde::Serialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::format::Format;
use crate::item::Item;
use crate::section::{Child, Section, TreeSettings};
use crate::types::{ItemType, object};

/// Prefix of metadata keys such as `@default`, `@type`, `@help`.
pub const META_MARKER: char = '@';

/// Prefix of private fields skipped in struct declarations.
const PRIVATE_MARKER: char = '_';

/// Something that declares the shape of a section or one of its children.
#[derive(Debug, Clone)]
pub enum Declaration {
    /// A literal: scalars become items with the value as default and an
    /// inferred type; objects and arrays follow the mapping and list rules
    /// when they declare a section.
    Value(Value),
    Item(Item),
    Section(Section),
    Mapping(Vec<(String, Declaration)>),
    List(Vec<ListEntry>),
    /// A file, parsed by the format matching its extension.
    File(PathBuf),
}

/// One element of a list declaration.
#[derive(Debug, Clone)]
pub enum ListEntry {
    /// A valueless item.
    Name(String),
    /// A named item.
    Item(Item),
    Pair(String, Declaration),
}

impl Declaration {
    pub fn mapping<K, I>(entries: I) -> Declaration
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Declaration)>,
    {
        Declaration::Mapping(entries.into_iter().map(|(k, d)| (k.into(), d)).collect())
    }

    pub fn file(path: impl AsRef<Path>) -> Declaration {
        Declaration::File(path.as_ref().to_path_buf())
    }

    /// Declare from a serializable struct. Fields are taken in declaration
    /// order; fields whose name starts with `_` are skipped.
    pub fn from_serialize<T: Serialize>(source: &T) -> Result<Declaration, ConfigError> {
        let value = serde_json::to_value(source)
            .map_err(|e| ConfigError::Declaration(format!("cannot serialize declaration: {e}")))?;
        match strip_private(value) {
            value @ Value::Object(_) => Ok(Declaration::Value(value)),
            other => Err(ConfigError::Declaration(format!(
                "a struct declaration must serialize to a mapping, got {other}"
            ))),
        }
    }

    /// Declare from a confique config struct. Nested structs become
    /// sections; `#[config(default)]` values become item defaults and doc
    /// comments become help text. Fields without a default that are not
    /// `Option` are required.
    pub fn from_config<C: Config>() -> Result<Declaration, ConfigError> {
        Ok(Declaration::Mapping(meta_entries(&C::META)?))
    }

    /// Normalize into the canonical ordered list of entries.
    pub fn into_entries(self) -> Result<Vec<(String, Declaration)>, ConfigError> {
        match self {
            Declaration::Mapping(entries) => Ok(entries),
            Declaration::Value(Value::Object(map)) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, Declaration::Value(v)))
                .collect()),
            Declaration::Value(Value::Array(values)) => {
                values.into_iter().map(list_entry_from_value).collect()
            }
            Declaration::List(entries) => entries.into_iter().map(ListEntry::into_entry).collect(),
            Declaration::File(path) => {
                let format = Format::from_path(&path)?;
                let mut map = format.read_file(&path)?;
                if format.is_textual() {
                    crate::section::lift_default_section(&mut map);
                }
                Ok(map
                    .into_iter()
                    .map(|(k, v)| (k, Declaration::Value(v)))
                    .collect())
            }
            Declaration::Value(other) => Err(ConfigError::Declaration(format!(
                "cannot declare a section from {other}"
            ))),
            Declaration::Item(item) => Err(ConfigError::Declaration(format!(
                "cannot declare a section from item {item:?}"
            ))),
            Declaration::Section(_) => Err(ConfigError::Declaration(
                "an existing section must be declared under a name".into(),
            )),
        }
    }
}

impl ListEntry {
    fn into_entry(self) -> Result<(String, Declaration), ConfigError> {
        match self {
            ListEntry::Name(name) => {
                let item = Item::named(name.clone());
                Ok((name, Declaration::Item(item)))
            }
            ListEntry::Item(item) => {
                let name = item.name().map(str::to_string).ok_or_else(|| {
                    ConfigError::Declaration("items declared in a list must be named".into())
                })?;
                Ok((name, Declaration::Item(item)))
            }
            ListEntry::Pair(name, declaration) => Ok((name, declaration)),
        }
    }
}

impl From<Value> for Declaration {
    fn from(value: Value) -> Self {
        Declaration::Value(value)
    }
}

impl From<Item> for Declaration {
    fn from(item: Item) -> Self {
        Declaration::Item(item)
    }
}

impl From<Section> for Declaration {
    fn from(section: Section) -> Self {
        Declaration::Section(section)
    }
}

impl From<Vec<ListEntry>> for Declaration {
    fn from(entries: Vec<ListEntry>) -> Self {
        Declaration::List(entries)
    }
}

impl From<&str> for ListEntry {
    fn from(name: &str) -> Self {
        ListEntry::Name(name.to_string())
    }
}

impl From<Item> for ListEntry {
    fn from(item: Item) -> Self {
        ListEntry::Item(item)
    }
}

impl<K: Into<String>, D: Into<Declaration>> From<(K, D)> for ListEntry {
    fn from((name, declaration): (K, D)) -> Self {
        ListEntry::Pair(name.into(), declaration.into())
    }
}

/// A list element given as a dynamic value: a bare name or a `[name, child]` pair.
fn list_entry_from_value(value: Value) -> Result<(String, Declaration), ConfigError> {
    match value {
        Value::String(name) => ListEntry::Name(name).into_entry(),
        Value::Array(mut pair) if pair.len() == 2 && pair[0].is_string() => {
            let child = pair.pop().unwrap_or_default();
            let name = pair.pop().unwrap_or_default();
            Ok((
                name.as_str().unwrap_or_default().to_string(),
                Declaration::Value(child),
            ))
        }
        other => Err(ConfigError::Declaration(format!(
            "list declarations take names or (name, value) pairs, got {other}"
        ))),
    }
}

fn is_meta(key: &str) -> bool {
    key.starts_with(META_MARKER)
}

/// Does a mapping with these keys declare a single item rather than a section?
///
/// True when it carries `@type`, or when it is non-empty and every key is metadata.
pub fn declares_item<'a, I: IntoIterator<Item = &'a str>>(keys: I) -> bool {
    let mut any = false;
    let mut all_meta = true;
    for key in keys {
        if key == "@type" {
            return true;
        }
        any = true;
        all_meta &= is_meta(key);
    }
    any && all_meta
}

/// Build a section at `path` from a declaration, sharing `settings`.
pub(crate) fn build_section(
    declaration: Declaration,
    path: Vec<String>,
    settings: &Arc<TreeSettings>,
) -> Result<Section, ConfigError> {
    if let Declaration::Section(mut section) = declaration {
        section.rebase(path, settings);
        return Ok(section);
    }

    let mut section = Section::empty_at(path, Arc::clone(settings));
    for (name, child) in declaration.into_entries()? {
        if let Some(key) = name.strip_prefix(META_MARKER) {
            let Declaration::Value(value) = child else {
                return Err(ConfigError::Declaration(format!(
                    "metadata {name} must be a plain value"
                )));
            };
            section.apply_meta(key, value);
            continue;
        }
        let child = build_child(&section, &name, child, settings)?;
        section.insert_child(child)?;
    }
    Ok(section)
}

fn build_child(
    parent: &Section,
    name: &str,
    declaration: Declaration,
    settings: &Arc<TreeSettings>,
) -> Result<Child, ConfigError> {
    let child_path = |name: &str| {
        let mut path = parent.path().to_vec();
        path.push(name.to_string());
        path
    };

    match declaration {
        Declaration::Item(mut item) => {
            let name = item.name().unwrap_or(name).to_string();
            item.set_path(child_path(&name));
            Ok(Child::Item(item))
        }
        Declaration::Value(Value::Object(map)) if declares_item(map.keys().map(String::as_str)) => {
            let entries = map.into_iter().collect::<Vec<_>>();
            Ok(Child::Item(build_item(child_path(name), entries)?))
        }
        Declaration::Mapping(entries) if declares_item(entries.iter().map(|(k, _)| k.as_str())) => {
            let entries = entries
                .into_iter()
                .map(|(k, d)| match d {
                    Declaration::Value(v) => Ok((k, v)),
                    _ => Err(ConfigError::Declaration(format!(
                        "item metadata {k} must be a plain value"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Child::Item(build_item(child_path(name), entries)?))
        }
        Declaration::Value(value) if !value.is_object() => {
            let mut item = Item::named(name).with_type(ItemType::infer(&value));
            item.set_path(child_path(name));
            item.set_default(value);
            Ok(Child::Item(item))
        }
        nested => Ok(Child::Section(build_section(
            nested,
            child_path(name),
            settings,
        )?)),
    }
}

/// Build one item from a metadata mapping. `@type` applies first; plain keys
/// form the item's default (a dict for `@type: dict`).
fn build_item(path: Vec<String>, entries: Vec<(String, Value)>) -> Result<Item, ConfigError> {
    let mut item = Item::new();
    item.set_path(path);

    let (meta, plain): (Vec<_>, Vec<_>) = entries.into_iter().partition(|(k, _)| is_meta(k));
    let mut typed = false;
    for (key, value) in &meta {
        if key == "@type" {
            item.apply_meta("type", value.clone())?;
            typed = true;
        }
    }
    if !typed
        && let Some((_, default)) = meta.iter().find(|(k, _)| k == "@default")
    {
        item = item.with_type(ItemType::infer(default));
    }
    for (key, value) in meta {
        if key != "@type" {
            item.apply_meta(&key[1..], value)?;
        }
    }

    if !plain.is_empty() {
        let default = item
            .item_type()
            .coerce(&object(plain))
            .map_err(ConfigError::Declaration)?;
        item.set_default(default);
    }
    Ok(item)
}

fn meta_entries(meta: &Meta) -> Result<Vec<(String, Declaration)>, ConfigError> {
    let mut entries = Vec::with_capacity(meta.fields.len());
    for field in meta.fields {
        let declaration = match &field.kind {
            FieldKind::Leaf { kind, .. } => {
                let mut item = Item::named(field.name);
                let doc = field
                    .doc
                    .iter()
                    .map(|line| line.trim())
                    .collect::<Vec<_>>()
                    .join(" ");
                if !doc.is_empty() {
                    item = item.with_help(doc);
                }
                match kind {
                    LeafKind::Required { default: Some(expr) } => {
                        let default = serde_json::to_value(expr).map_err(|e| {
                            ConfigError::Declaration(format!("default of {}: {e}", field.name))
                        })?;
                        item = item.with_type(ItemType::infer(&default)).with_default(default);
                    }
                    LeafKind::Required { default: None } => item = item.required(true),
                    _ => {}
                }
                Declaration::Item(item)
            }
            FieldKind::Nested { meta, .. } => Declaration::Mapping(meta_entries(meta)?),
        };
        entries.push((field.name.to_string(), declaration));
    }
    Ok(entries)
}

fn strip_private(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !k.starts_with(PRIVATE_MARKER))
                .map(|(k, v)| (k, strip_private(v)))
                .collect(),
        ),
        other => other,
    }
}
