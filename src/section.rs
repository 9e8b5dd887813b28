//! Config trees: a [`Section`] holds ordered children, each an [`Item`] or a
//! nested [`Section`]. Every section in a tree shares one [`TreeSettings`].

use std::fmt;
use std::ops::Index;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::declaration::{self, Declaration};
use crate::error::{ConfigError, PathError};
use crate::format::Format;
use crate::item::Item;
use crate::path::{self, DEFAULT_SECTION};
use crate::types::ItemType;

/// Settings key for the separator used in string paths.
pub const STR_PATH_SEPARATOR: &str = "str_path_separator";

/// Settings shared by reference across every section of one tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeSettings {
    entries: IndexMap<String, Value>,
}

impl TreeSettings {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Separator for string paths, `.` unless configured.
    pub fn str_path_separator(&self) -> &str {
        self.entries
            .get(STR_PATH_SEPARATOR)
            .and_then(Value::as_str)
            .unwrap_or(".")
    }
}

#[derive(Debug, Clone)]
pub enum Child {
    Item(Item),
    Section(Section),
}

impl Child {
    pub fn path(&self) -> &[String] {
        match self {
            Child::Item(item) => item.path(),
            Child::Section(section) => section.path(),
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Child::Item(item) => Some(item),
            Child::Section(_) => None,
        }
    }

    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Child::Section(section) => Some(section),
            Child::Item(_) => None,
        }
    }

    pub fn is_item(&self) -> bool {
        matches!(self, Child::Item(_))
    }

    pub fn is_section(&self) -> bool {
        matches!(self, Child::Section(_))
    }
}

/// How iteration keys are shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyShape {
    Name,
    /// Path segments relative to the iterated section.
    #[default]
    Path,
    /// Relative path joined with the tree's separator.
    StrPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TreeKey {
    Name(String),
    Path(Vec<String>),
    StrPath(String),
}

impl fmt::Display for TreeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeKey::Name(name) | TreeKey::StrPath(name) => f.write_str(name),
            TreeKey::Path(segments) => f.write_str(&segments.join(".")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    name: Option<String>,
    path: Vec<String>,
    children: IndexMap<String, Child>,
    settings: Arc<TreeSettings>,
    help: Option<String>,
    meta: IndexMap<String, Value>,
}

impl Section {
    /// Build a tree from a declaration with default settings.
    pub fn new(declaration: impl Into<Declaration>) -> Result<Self, ConfigError> {
        Self::with_shared_settings(declaration, Arc::default())
    }

    pub fn with_settings(
        declaration: impl Into<Declaration>,
        settings: TreeSettings,
    ) -> Result<Self, ConfigError> {
        Self::with_shared_settings(declaration, Arc::new(settings))
    }

    pub fn with_shared_settings(
        declaration: impl Into<Declaration>,
        settings: Arc<TreeSettings>,
    ) -> Result<Self, ConfigError> {
        let section = declaration::build_section(declaration.into(), Vec::new(), &settings)?;
        tracing::debug!(
            items = section.iter_items(true, KeyShape::Path).len(),
            "declared config tree"
        );
        Ok(section)
    }

    /// Declare a tree from a file; values in the file become defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::new(Declaration::file(path))
    }

    pub fn empty() -> Self {
        Self::empty_at(Vec::new(), Arc::default())
    }

    pub(crate) fn empty_at(path: Vec<String>, settings: Arc<TreeSettings>) -> Self {
        Self {
            name: path.last().cloned(),
            path,
            children: IndexMap::new(),
            settings,
            help: None,
            meta: IndexMap::new(),
        }
    }

    /// `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn str_path(&self) -> String {
        path::join(&self.path, self.settings.str_path_separator())
    }

    pub fn settings(&self) -> &Arc<TreeSettings> {
        &self.settings
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn meta(&self) -> &IndexMap<String, Value> {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Child)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&Child> {
        self.children.get(name)
    }

    pub fn child(&self, name: &str) -> Result<&Child, ConfigError> {
        self.children
            .get(name)
            .ok_or_else(|| ConfigError::UnknownItem(self.child_str_path(name)))
    }

    pub fn item(&self, name: &str) -> Result<&Item, ConfigError> {
        match self.child(name)? {
            Child::Item(item) => Ok(item),
            Child::Section(_) => Err(ConfigError::NotAnItem(self.child_str_path(name))),
        }
    }

    pub fn item_mut(&mut self, name: &str) -> Result<&mut Item, ConfigError> {
        let key = self.child_str_path(name);
        match self.children.get_mut(name) {
            Some(Child::Item(item)) => Ok(item),
            Some(Child::Section(_)) => Err(ConfigError::NotAnItem(key)),
            None => Err(ConfigError::UnknownItem(key)),
        }
    }

    pub fn section(&self, name: &str) -> Result<&Section, ConfigError> {
        match self.child(name)? {
            Child::Section(section) => Ok(section),
            Child::Item(_) => Err(ConfigError::NotASection(self.child_str_path(name))),
        }
    }

    pub fn section_mut(&mut self, name: &str) -> Result<&mut Section, ConfigError> {
        let key = self.child_str_path(name);
        match self.children.get_mut(name) {
            Some(Child::Section(section)) => Ok(section),
            Some(Child::Item(_)) => Err(ConfigError::NotASection(key)),
            None => Err(ConfigError::UnknownItem(key)),
        }
    }

    /// Follow a relative path of names down the tree.
    pub fn child_at<S: AsRef<str>>(&self, segments: &[S]) -> Result<&Child, ConfigError> {
        let segments = path::resolve_path(segments)?;
        let (last, parents) = segments
            .split_last()
            .ok_or(ConfigError::Path(PathError::Empty))?;
        let mut section = self;
        for name in parents {
            section = section.section(name)?;
        }
        section.child(last)
    }

    pub fn item_at<S: AsRef<str>>(&self, segments: &[S]) -> Result<&Item, ConfigError> {
        match self.child_at(segments)? {
            Child::Item(item) => Ok(item),
            Child::Section(section) => Err(ConfigError::NotAnItem(section.str_path())),
        }
    }

    pub fn item_at_mut<S: AsRef<str>>(&mut self, segments: &[S]) -> Result<&mut Item, ConfigError> {
        let segments = path::resolve_path(segments)?;
        let (last, parents) = segments
            .split_last()
            .ok_or(ConfigError::Path(PathError::Empty))?;
        let mut section = self;
        for name in parents {
            section = section.section_mut(name)?;
        }
        section.item_mut(last)
    }

    pub fn section_at<S: AsRef<str>>(&self, segments: &[S]) -> Result<&Section, ConfigError> {
        match self.child_at(segments)? {
            Child::Section(section) => Ok(section),
            Child::Item(item) => Err(ConfigError::NotASection(item.str_path("."))),
        }
    }

    /// Resolved value of a direct child item.
    pub fn value(&self, name: &str) -> Result<Option<Value>, ConfigError> {
        self.item(name)?.value()
    }

    /// Assign to a declared child item. Unknown names and sections are rejected.
    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        if let Some(Child::Section(_)) = self.children.get(name) {
            return Err(ConfigError::SectionValue(self.child_str_path(name)));
        }
        self.item_mut(name)?.set_value(value)
    }

    /// Attach a named item under this section.
    pub fn add_item(&mut self, mut item: Item) -> Result<(), ConfigError> {
        let name = item
            .name()
            .map(str::to_string)
            .ok_or_else(|| ConfigError::Declaration("added items must be named".into()))?;
        item.set_path(self.child_path(&name));
        self.insert_child(Child::Item(item))
    }

    /// Attach a section under `name`; it joins this tree's paths and settings.
    pub fn add_section(&mut self, name: &str, mut section: Section) -> Result<(), ConfigError> {
        section.rebase(self.child_path(name), &self.settings);
        self.insert_child(Child::Section(section))
    }

    pub fn remove(&mut self, name: &str) -> Option<Child> {
        self.children.shift_remove(name)
    }

    pub(crate) fn insert_child(&mut self, child: Child) -> Result<(), ConfigError> {
        let name = child.path().last().cloned().unwrap_or_default();
        if self.children.contains_key(&name) {
            return Err(ConfigError::DuplicateItem(self.child_str_path(&name)));
        }
        self.children.insert(name, child);
        Ok(())
    }

    /// Apply one `@key` metadata entry (without the marker).
    pub(crate) fn apply_meta(&mut self, key: &str, value: Value) {
        match (key, value) {
            ("help", Value::String(help)) => self.help = Some(help),
            (key, value) => {
                self.meta.insert(key.to_string(), value);
            }
        }
    }

    /// Move this section to `path` and make it share `settings`.
    pub(crate) fn rebase(&mut self, path: Vec<String>, settings: &Arc<TreeSettings>) {
        self.name = path.last().cloned();
        self.settings = Arc::clone(settings);
        for (name, child) in self.children.iter_mut() {
            let mut child_path = path.clone();
            child_path.push(name.clone());
            match child {
                Child::Item(item) => item.set_path(child_path),
                Child::Section(section) => section.rebase(child_path, settings),
            }
        }
        self.path = path;
    }

    /// Items in declaration order; with `recursive`, descends into sections.
    pub fn iter_items(&self, recursive: bool, shape: KeyShape) -> Vec<(TreeKey, &Item)> {
        self.walk(recursive)
            .into_iter()
            .filter_map(|child| match child {
                Child::Item(item) => Some((self.key(item.path(), shape), item)),
                Child::Section(_) => None,
            })
            .collect()
    }

    pub fn iter_sections(&self, recursive: bool, shape: KeyShape) -> Vec<(TreeKey, &Section)> {
        self.walk(recursive)
            .into_iter()
            .filter_map(|child| match child {
                Child::Section(section) => Some((self.key(section.path(), shape), section)),
                Child::Item(_) => None,
            })
            .collect()
    }

    /// Keys of sections and items, each section before its children.
    pub fn iter_paths(&self, recursive: bool, shape: KeyShape) -> Vec<TreeKey> {
        self.walk(recursive)
            .into_iter()
            .map(|child| self.key(child.path(), shape))
            .collect()
    }

    fn walk(&self, recursive: bool) -> Vec<&Child> {
        let mut out = Vec::new();
        self.walk_into(recursive, &mut out);
        out
    }

    fn walk_into<'a>(&'a self, recursive: bool, out: &mut Vec<&'a Child>) {
        for child in self.children.values() {
            out.push(child);
            if recursive && let Child::Section(section) = child {
                section.walk_into(true, out);
            }
        }
    }

    fn key(&self, full: &[String], shape: KeyShape) -> TreeKey {
        let relative = full.get(self.path.len()..).unwrap_or(full);
        match shape {
            KeyShape::Name => TreeKey::Name(relative.last().cloned().unwrap_or_default()),
            KeyShape::Path => TreeKey::Path(relative.to_vec()),
            KeyShape::StrPath => {
                TreeKey::StrPath(path::join(relative, self.settings.str_path_separator()))
            }
        }
    }

    fn child_path(&self, name: &str) -> Vec<String> {
        let mut path = self.path.clone();
        path.push(name.to_string());
        path
    }

    fn child_str_path(&self, name: &str) -> String {
        path::join(&self.child_path(name), self.settings.str_path_separator())
    }

    /// Nested mapping of resolved values. Items without a value are skipped
    /// unless `with_defaults` and they have a default; empty sections are omitted.
    pub fn dump_values(&self, with_defaults: bool) -> Result<Map<String, Value>, ConfigError> {
        self.dump_with(with_defaults, &|item: &Item| item.value())
    }

    /// Like [`dump_values`](Self::dump_values), with each item's text rendering.
    fn dump_text(&self, with_defaults: bool) -> Result<Map<String, Value>, ConfigError> {
        self.dump_with(with_defaults, &|item: &Item| {
            item.value()?;
            Ok(Some(Value::String(item.to_string())))
        })
    }

    fn dump_with(
        &self,
        with_defaults: bool,
        render: &dyn Fn(&Item) -> Result<Option<Value>, ConfigError>,
    ) -> Result<Map<String, Value>, ConfigError> {
        let mut out = Map::new();
        for (name, child) in &self.children {
            match child {
                Child::Item(item) if is_dumped(item, with_defaults) => {
                    if let Some(value) = render(item)? {
                        out.insert(name.clone(), value);
                    }
                }
                Child::Item(_) => {}
                Child::Section(section) => {
                    let inner = section.dump_with(with_defaults, render)?;
                    if !inner.is_empty() {
                        out.insert(name.clone(), Value::Object(inner));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Load a nested mapping of values.
    ///
    /// Declared items get the values assigned. With `as_defaults`, values
    /// become defaults instead, and undeclared keys are added as new items
    /// and sections; otherwise undeclared keys are skipped.
    pub fn load_values(
        &mut self,
        values: &Map<String, Value>,
        as_defaults: bool,
    ) -> Result<(), ConfigError> {
        for (name, value) in values {
            if name.starts_with(declaration::META_MARKER) {
                continue;
            }
            match self.children.get_mut(name) {
                Some(Child::Item(item)) if as_defaults => {
                    let default = item.item_type().coerce(value).map_err(|reason| {
                        ConfigError::InvalidValue {
                            key: item.str_path("."),
                            reason,
                        }
                    })?;
                    item.set_default(default);
                }
                Some(Child::Item(item)) => item.set_value(value.clone())?,
                Some(Child::Section(section)) => match value {
                    Value::Object(inner) => section.load_values(inner, as_defaults)?,
                    other => tracing::warn!(
                        section = %section.str_path(),
                        value = %other,
                        "ignoring non-mapping value for section"
                    ),
                },
                None if as_defaults => {
                    let child = match value {
                        Value::Object(inner) => {
                            let mut section = Section::empty_at(
                                self.child_path(name),
                                Arc::clone(&self.settings),
                            );
                            section.load_values(inner, true)?;
                            Child::Section(section)
                        }
                        scalar => {
                            let mut item = Item::new().with_type(ItemType::infer(scalar));
                            item.set_path(self.child_path(name));
                            item.set_default(scalar.clone());
                            Child::Item(item)
                        }
                    };
                    self.insert_child(child)?;
                }
                None => {
                    tracing::warn!(key = %self.child_str_path(name), "ignoring undeclared key");
                }
            }
        }
        Ok(())
    }

    /// Clear every value in the tree; defaults stay.
    pub fn reset(&mut self) {
        for child in self.children.values_mut() {
            match child {
                Child::Item(item) => item.reset(),
                Child::Section(section) => section.reset(),
            }
        }
    }

    /// True if every item in the tree is at its default.
    pub fn is_default(&self) -> bool {
        self.iter_items(true, KeyShape::Path)
            .iter()
            .all(|(_, item)| item.is_default())
    }

    pub fn dumps(&self, format: Format, with_defaults: bool) -> Result<String, ConfigError> {
        format.serialize(&self.serializable(format, with_defaults)?)
    }

    pub fn dump(
        &self,
        format: Format,
        path: impl AsRef<Path>,
        with_defaults: bool,
    ) -> Result<(), ConfigError> {
        format.write_file(path.as_ref(), &self.serializable(format, with_defaults)?)
    }

    pub fn loads(
        &mut self,
        format: Format,
        text: &str,
        as_defaults: bool,
    ) -> Result<(), ConfigError> {
        let values = format.parse(text)?;
        self.load_parsed(format, values, as_defaults)
    }

    pub fn load(
        &mut self,
        format: Format,
        path: impl AsRef<Path>,
        as_defaults: bool,
    ) -> Result<(), ConfigError> {
        let values = format.read_file(path.as_ref())?;
        self.load_parsed(format, values, as_defaults)
    }

    fn load_parsed(
        &mut self,
        format: Format,
        mut values: Map<String, Value>,
        as_defaults: bool,
    ) -> Result<(), ConfigError> {
        if format.is_textual() && !self.contains(DEFAULT_SECTION) {
            lift_default_section(&mut values);
        }
        tracing::debug!(%format, keys = values.len(), as_defaults, "loading values into tree");
        self.load_values(&values, as_defaults)
    }

    fn serializable(
        &self,
        format: Format,
        with_defaults: bool,
    ) -> Result<Map<String, Value>, ConfigError> {
        if let Some(max_depth) = format.max_depth() {
            let too_deep = self
                .iter_items(true, KeyShape::Path)
                .into_iter()
                .find(|(key, item)| {
                    matches!(key, TreeKey::Path(p) if p.len() > max_depth)
                        && is_dumped(item, with_defaults)
                });
            if let Some((_, item)) = too_deep {
                return Err(ConfigError::NotImplementedDepth {
                    path: item.str_path(self.settings.str_path_separator()),
                    format,
                });
            }
        }
        if format.is_textual() {
            self.dump_text(with_defaults)
        } else {
            self.dump_values(with_defaults)
        }
    }
}

/// `section["name"]` panics when there is no such child. [`Section::child`]
/// returns [`ConfigError::UnknownItem`] instead.
impl Index<&str> for Section {
    type Output = Child;

    fn index(&self, name: &str) -> &Child {
        match self.children.get(name) {
            Some(child) => child,
            None => panic!("no child named {name:?} in section {:?}", self.str_path()),
        }
    }
}

fn is_dumped(item: &Item, with_defaults: bool) -> bool {
    item.has_value() || (with_defaults && item.has_default())
}

/// Options of a two-level format's default section belong to the root.
pub(crate) fn lift_default_section(values: &mut Map<String, Value>) {
    if !matches!(values.get(DEFAULT_SECTION), Some(Value::Object(_))) {
        return;
    }
    let mut lifted = Map::new();
    for (key, value) in std::mem::take(values) {
        match value {
            Value::Object(defaults) if key == DEFAULT_SECTION => lifted.extend(defaults),
            other => {
                lifted.insert(key, other);
            }
        }
    }
    *values = lifted;
}
