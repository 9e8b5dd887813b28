//! Flat, path-keyed registry of items.
//!
//! A [`Manager`] maps canonical paths to [`Item`]s in registration order and
//! keeps a prefix index so that every proper prefix of a registered path
//! knows the items below it. Single-segment paths live in the default
//! section: `["threads"]` is stored as `["DEFAULT", "threads"]`.
//!
//! ```ignore
//! let mut config = Manager::builder()
//!     .item(Item::at(&["uploads", "threads"])?.with_type(ItemType::Int).with_default(1))
//!     .build()?;
//! config.read(["defaults.ini", "user.ini"], false)?;
//! let threads = config.get(&["uploads", "threads"])?;
//! ```
//!
//! Structural mutation takes `&mut self`, so the registry and its prefix
//! index are always updated together.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use crate::builder::ManagerBuilder;
use crate::error::{ConfigError, PathError};
use crate::format::Format;
use crate::item::Item;
use crate::path::{self, DEFAULT_SECTION};
use crate::types::{ItemType, display_value};

#[derive(Debug, Clone)]
pub struct Manager {
    items: IndexMap<Vec<String>, Item>,
    prefixes: IndexMap<Vec<String>, IndexSet<Vec<String>>>,
    default_section: String,
    format: Format,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(DEFAULT_SECTION, Format::Ini)
    }
}

impl Manager {
    pub fn new(default_section: impl Into<String>, format: Format) -> Self {
        Self {
            items: IndexMap::new(),
            prefixes: IndexMap::new(),
            default_section: default_section.into(),
            format,
        }
    }

    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// A manager holding copies of `items`.
    pub fn from_items<'a, I>(items: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a Item>,
    {
        let mut manager = Self::default();
        for item in items {
            manager.add(item)?;
        }
        Ok(manager)
    }

    pub fn default_section(&self) -> &str {
        &self.default_section
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn canonical<S: AsRef<str>>(&self, segments: &[S]) -> Result<Vec<String>, ConfigError> {
        let resolved = path::resolve_path(segments)?;
        Ok(path::with_default_section(resolved, &self.default_section))
    }

    /// Register a copy of `item`. The manager owns the copy; later changes
    /// to the caller's item do not reach it.
    pub fn add(&mut self, item: &Item) -> Result<&mut Item, ConfigError> {
        let canonical = self.canonical(item.path())?;
        if self.items.contains_key(&canonical) {
            return Err(ConfigError::DuplicateItem(canonical.join(".")));
        }

        let mut item = item.clone();
        item.set_path(canonical.clone());
        for end in 1..canonical.len() {
            self.prefixes
                .entry(canonical[..end].to_vec())
                .or_default()
                .insert(canonical.clone());
        }
        tracing::debug!(path = %canonical.join("."), "registered config item");

        let (index, _) = self.items.insert_full(canonical, item);
        Ok(&mut self.items[index])
    }

    /// Register a new valueless item at `segments`.
    pub fn add_path<S: AsRef<str>>(&mut self, segments: &[S]) -> Result<&mut Item, ConfigError> {
        let item = Item::at(segments)?;
        self.add(&item)
    }

    /// Remove an item and drop it from every prefix it was indexed under.
    pub fn remove<S: AsRef<str>>(&mut self, segments: &[S]) -> Result<Item, ConfigError> {
        let canonical = self.canonical(segments)?;
        let item = self
            .items
            .shift_remove(&canonical)
            .ok_or_else(|| ConfigError::UnknownItem(canonical.join(".")))?;

        self.prefixes.retain(|_, paths| {
            paths.shift_remove(&canonical);
            !paths.is_empty()
        });
        tracing::debug!(path = %canonical.join("."), "removed config item");
        Ok(item)
    }

    /// Whether an item is registered at `segments`. Malformed paths fail
    /// with [`ConfigError::Path`].
    pub fn has<S: AsRef<str>>(&self, segments: &[S]) -> Result<bool, ConfigError> {
        let canonical = self.canonical(segments)?;
        Ok(self.items.contains_key(&canonical))
    }

    pub fn get_item<S: AsRef<str>>(&self, segments: &[S]) -> Result<&Item, ConfigError> {
        let canonical = self.canonical(segments)?;
        self.items
            .get(&canonical)
            .ok_or_else(|| ConfigError::UnknownItem(canonical.join(".")))
    }

    pub fn get_item_mut<S: AsRef<str>>(
        &mut self,
        segments: &[S],
    ) -> Result<&mut Item, ConfigError> {
        let canonical = self.canonical(segments)?;
        self.items
            .get_mut(&canonical)
            .ok_or_else(|| ConfigError::UnknownItem(canonical.join(".")))
    }

    /// Resolved value of the item at `segments`.
    ///
    /// Fails with [`ConfigError::ValueMissing`] when the item has neither a
    /// value nor a default.
    pub fn get<S: AsRef<str>>(&self, segments: &[S]) -> Result<Value, ConfigError> {
        let item = self.get_item(segments)?;
        item.value()?
            .ok_or_else(|| ConfigError::ValueMissing(item.str_path(".")))
    }

    /// Resolved value, or `fallback` when the item has neither value nor default.
    /// The item must exist.
    pub fn get_or<S: AsRef<str>>(
        &self,
        segments: &[S],
        fallback: Value,
    ) -> Result<Value, ConfigError> {
        let item = self.get_item(segments)?;
        if item.has_value() || item.has_default() {
            Ok(item.value()?.unwrap_or(fallback))
        } else {
            Ok(fallback)
        }
    }

    /// Lookup from dynamic arguments: path segments, optionally followed by a
    /// fallback.
    ///
    /// The whole argument list is tried as a path first, provided its last
    /// element is text. Otherwise the last element is the fallback for the
    /// path made of the rest.
    pub fn get_args(&self, args: &[Value]) -> Result<Value, ConfigError> {
        let (last, rest) = args
            .split_last()
            .ok_or(ConfigError::Path(PathError::Empty))?;

        if last.is_string()
            && let Ok(full) = path::resolve_value_path(args)
            && self.has(&full)?
        {
            return self.get(&full);
        }

        if rest.is_empty() {
            return Err(ConfigError::UnknownItem(display_value(last)));
        }
        let path = path::resolve_value_path(rest)?;
        if !self.has(&path)? {
            return Err(ConfigError::UnknownItem(path.join(".")));
        }
        self.get_or(&path, last.clone())
    }

    /// Assign a value to a registered item.
    pub fn set<S: AsRef<str>>(
        &mut self,
        segments: &[S],
        value: impl Into<Value>,
    ) -> Result<(), ConfigError> {
        self.get_item_mut(segments)?.set_value(value)
    }

    /// Every item, in registration order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Items whose path starts with `prefix`; an empty prefix matches all.
    pub fn find_items<S: AsRef<str>>(&self, prefix: &[S]) -> Result<Vec<&Item>, ConfigError> {
        let prefix = path::resolve_prefix(prefix)?;
        Ok(self
            .items
            .iter()
            .filter(|(path, _)| path::has_prefix(path, &prefix))
            .map(|(_, item)| item)
            .collect())
    }

    pub fn find_paths<S: AsRef<str>>(&self, prefix: &[S]) -> Result<Vec<&[String]>, ConfigError> {
        let prefix = path::resolve_prefix(prefix)?;
        Ok(self
            .items
            .keys()
            .filter(|path| path::has_prefix(path, &prefix))
            .map(Vec::as_slice)
            .collect())
    }

    /// Indexed prefixes that start with `prefix`.
    pub fn find_prefixes<S: AsRef<str>>(
        &self,
        prefix: &[S],
    ) -> Result<Vec<&[String]>, ConfigError> {
        let prefix = path::resolve_prefix(prefix)?;
        Ok(self
            .prefixes
            .keys()
            .filter(|p| path::has_prefix(p, &prefix))
            .map(Vec::as_slice)
            .collect())
    }

    /// `(name, value)` pairs for items under `prefix` that have a value or a
    /// default. Names are dot-joined paths with the prefix removed.
    pub fn export<S: AsRef<str>>(&self, prefix: &[S]) -> Result<Vec<(String, Value)>, ConfigError> {
        let prefix_len = prefix.len();
        let mut pairs = Vec::new();
        for item in self.find_items(prefix)? {
            if !(item.has_value() || item.has_default()) {
                continue;
            }
            if let Some(value) = item.value()? {
                pairs.push((item.path()[prefix_len..].join("."), value));
            }
        }
        Ok(pairs)
    }

    /// Clear every item's value.
    pub fn reset(&mut self) {
        for item in self.items.values_mut() {
            item.reset();
        }
    }

    pub fn is_default(&self) -> bool {
        self.items.values().all(Item::is_default)
    }

    /// Read each existing file in order. Missing files are skipped; the
    /// paths actually read are returned.
    ///
    /// A file that fails to parse aborts the call; files read before it
    /// stay applied.
    pub fn read<I, P>(&mut self, paths: I, as_defaults: bool) -> Result<Vec<PathBuf>, ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut used = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "config file not found, skipping");
                    continue;
                }
                Err(e) => {
                    return Err(ConfigError::IoError {
                        path: path.to_path_buf(),
                        source: e,
                    });
                }
            };
            self.read_string(&text, as_defaults)?;
            tracing::debug!(path = %path.display(), as_defaults, "read config file");
            used.push(path.to_path_buf());
        }
        Ok(used)
    }

    pub fn read_file<R: Read>(
        &mut self,
        mut reader: R,
        as_defaults: bool,
    ) -> Result<(), ConfigError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| ConfigError::IoError {
                path: PathBuf::from("-"),
                source: e,
            })?;
        self.read_string(&text, as_defaults)
    }

    pub fn read_string(&mut self, text: &str, as_defaults: bool) -> Result<(), ConfigError> {
        let values = self.format.parse(text)?;
        self.read_dict(&values, as_defaults)
    }

    /// Load a nested mapping. Every leaf is addressed by its path of keys.
    ///
    /// Without `as_defaults`, leaves are assigned to registered items and
    /// unknown paths fail. With `as_defaults`, leaves become defaults, and
    /// unknown paths are registered as new items; values already set are
    /// left alone.
    pub fn read_dict(
        &mut self,
        values: &Map<String, Value>,
        as_defaults: bool,
    ) -> Result<(), ConfigError> {
        let mut leaves = Vec::new();
        flatten_into(values, &mut Vec::new(), &mut leaves);

        for (segments, value) in leaves {
            if !as_defaults {
                self.set(&segments, value)?;
                continue;
            }
            if self.has(&segments)? {
                let item = self.get_item_mut(&segments)?;
                let default = item.item_type().coerce(&value).map_err(|reason| {
                    ConfigError::InvalidValue {
                        key: item.str_path("."),
                        reason,
                    }
                })?;
                item.set_default(default);
            } else {
                let item = Item::at(&segments)?
                    .with_type(ItemType::infer(&value))
                    .with_default(value);
                self.add(&item)?;
            }
        }
        Ok(())
    }

    /// Nested mapping of the items that have a value, in the manager's format.
    pub fn dumps(&self) -> Result<String, ConfigError> {
        self.format.serialize(&self.to_map()?)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), ConfigError> {
        let text = self.dumps()?;
        writer
            .write_all(text.as_bytes())
            .map_err(|e| ConfigError::IoError {
                path: PathBuf::from("-"),
                source: e,
            })
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.format.write_file(path.as_ref(), &self.to_map()?)
    }

    fn to_map(&self) -> Result<Map<String, Value>, ConfigError> {
        let mut out = Map::new();
        for item in self.items.values() {
            if let Some(max_depth) = self.format.max_depth()
                && item.path().len() > max_depth
            {
                return Err(ConfigError::NotImplementedDepth {
                    path: item.str_path("."),
                    format: self.format,
                });
            }
            if !item.has_value() {
                continue;
            }
            let value = if self.format.is_textual() {
                Value::String(item.to_string())
            } else {
                item.value()?.unwrap_or(Value::Null)
            };
            insert_at(&mut out, item.path(), value);
        }
        Ok(out)
    }

    /// Read-only view of the items under one section.
    pub fn section(&self, name: &str) -> SectionProxy<'_> {
        SectionProxy {
            manager: self,
            name: name.to_string(),
        }
    }

    pub fn section_mut(&mut self, name: &str) -> SectionProxyMut<'_> {
        SectionProxyMut {
            manager: self,
            name: name.to_string(),
        }
    }
}

/// Section-level view: `manager.section("uploads").item("threads")`.
pub struct SectionProxy<'a> {
    manager: &'a Manager,
    name: String,
}

impl<'a> SectionProxy<'a> {
    pub fn item(&self, option: &str) -> Result<&'a Item, ConfigError> {
        self.manager.get_item(&[self.name.as_str(), option])
    }

    pub fn get(&self, option: &str) -> Result<Value, ConfigError> {
        self.manager.get(&[self.name.as_str(), option])
    }

    pub fn has(&self, option: &str) -> Result<bool, ConfigError> {
        self.manager.has(&[self.name.as_str(), option])
    }

    /// A section has no value of its own; always fails.
    pub fn value(&self) -> Result<Value, ConfigError> {
        Err(ConfigError::SectionValue(self.name.clone()))
    }
}

pub struct SectionProxyMut<'a> {
    manager: &'a mut Manager,
    name: String,
}

impl SectionProxyMut<'_> {
    pub fn item(&mut self, option: &str) -> Result<&mut Item, ConfigError> {
        self.manager.get_item_mut(&[self.name.as_str(), option])
    }

    /// Assign to a registered option; unknown options are rejected.
    pub fn set(&mut self, option: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.manager.set(&[self.name.as_str(), option], value)
    }
}

fn flatten_into(
    map: &Map<String, Value>,
    prefix: &mut Vec<String>,
    out: &mut Vec<(Vec<String>, Value)>,
) {
    for (key, value) in map {
        prefix.push(key.clone());
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(inner, prefix, out),
            other => out.push((prefix.clone(), other.clone())),
        }
        prefix.pop();
    }
}

fn insert_at(map: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.clone(), value);
}
