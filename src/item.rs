//! A single configurable leaf value.
//!
//! An item keeps three things apart: its `default`, its `value`, and the raw
//! text that produced the value. Reading falls back from value to default;
//! rendering prefers the raw text so a boolean set from `"no"` is written back
//! as `no` rather than `false`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ConfigError;
use crate::path;
use crate::types::{ItemType, display_value};

/// Replacement for the value accessor of an item. Receives the item and the
/// caller's fallback; may delegate to [`Item::resolve`].
pub type Getter =
    Arc<dyn Fn(&Item, Option<Value>) -> Result<Option<Value>, ConfigError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Item {
    name: Option<String>,
    path: Vec<String>,
    item_type: ItemType,
    default: Option<Value>,
    value: Option<Value>,
    raw_text: Option<String>,
    required: bool,
    help: Option<String>,
    meta: IndexMap<String, Value>,
    getter: Option<Getter>,
}

impl Item {
    /// An unnamed item. Containers name it when it is declared under a key.
    pub fn new() -> Self {
        Default::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: vec![name.clone()],
            name: Some(name),
            ..Default::default()
        }
    }

    /// An item at an explicit path. The last segment is its name.
    pub fn at<S: AsRef<str>>(segments: &[S]) -> Result<Self, ConfigError> {
        let path = path::resolve_path(segments)?;
        Ok(Self {
            name: path.last().cloned(),
            path,
            ..Default::default()
        })
    }

    pub fn with_type(mut self, item_type: ItemType) -> Self {
        self.item_type = item_type;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the initial value, coercing it through the item type.
    pub fn with_value(mut self, value: impl Into<Value>) -> Result<Self, ConfigError> {
        self.set_value(value)?;
        Ok(self)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Override the value accessor. Every read of this item goes through it.
    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&Item, Option<Value>) -> Result<Option<Value>, ConfigError> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn str_path(&self, separator: &str) -> String {
        path::join(&self.path, separator)
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn raw_text(&self) -> Option<&str> {
        self.raw_text.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn meta(&self) -> &IndexMap<String, Value> {
        &self.meta
    }

    /// First segment of a two-segment path.
    pub fn section(&self) -> Result<&str, ConfigError> {
        self.two_level(0, "section")
    }

    /// Second segment of a two-segment path.
    pub fn option(&self) -> Result<&str, ConfigError> {
        self.two_level(1, "option")
    }

    fn two_level(&self, index: usize, what: &str) -> Result<&str, ConfigError> {
        if self.path.len() != 2 {
            return Err(ConfigError::InvalidValue {
                key: self.dotted_path(),
                reason: format!("{what} is not defined for items with non-trivial paths"),
            });
        }
        Ok(&self.path[index])
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// True if no value is set, or the value equals the default.
    /// This is not the opposite of [`has_value`](Self::has_value).
    pub fn is_default(&self) -> bool {
        match &self.value {
            None => true,
            Some(v) => self.default.as_ref() == Some(v),
        }
    }

    /// Resolved value: value, else default, else `fallback`.
    ///
    /// With nothing to return, a required item fails with
    /// [`ConfigError::ValueMissing`]; any other item returns `Ok(None)`.
    pub fn get(&self, fallback: Option<Value>) -> Result<Option<Value>, ConfigError> {
        match &self.getter {
            Some(getter) => getter(self, fallback),
            None => self.resolve(fallback),
        }
    }

    /// The built-in accessor, bypassing any getter override.
    pub fn resolve(&self, fallback: Option<Value>) -> Result<Option<Value>, ConfigError> {
        if let Some(value) = &self.value {
            return Ok(Some(value.clone()));
        }
        if let Some(default) = &self.default {
            return Ok(Some(default.clone()));
        }
        if fallback.is_some() {
            return Ok(fallback);
        }
        if self.required {
            return Err(ConfigError::ValueMissing(self.dotted_path()));
        }
        Ok(None)
    }

    /// Shorthand for `get(None)`.
    pub fn value(&self) -> Result<Option<Value>, ConfigError> {
        self.get(None)
    }

    /// Assign a value, coercing it through the item type.
    ///
    /// Text assigned to a non-text item is kept as raw text for rendering.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), ConfigError> {
        let value = value.into();
        let coerced = self
            .item_type
            .coerce(&value)
            .map_err(|reason| ConfigError::InvalidValue {
                key: self.dotted_path(),
                reason,
            })?;
        self.raw_text = match &value {
            Value::String(s) if !self.item_type.is_textual() => Some(s.clone()),
            _ => None,
        };
        self.value = Some(coerced);
        Ok(())
    }

    pub fn set_default(&mut self, default: impl Into<Value>) {
        self.default = Some(default.into());
    }

    /// Clear value and raw text. The default is untouched.
    pub fn reset(&mut self) {
        self.value = None;
        self.raw_text = None;
    }

    pub(crate) fn set_path(&mut self, path: Vec<String>) {
        if let Some(last) = path.last() {
            self.name = Some(last.clone());
        }
        self.path = path;
    }

    /// Apply one `@key` metadata entry (without the marker).
    pub(crate) fn apply_meta(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        match key {
            "type" => {
                let name = value.as_str().unwrap_or_default();
                self.item_type = ItemType::from_name(name).ok_or_else(|| {
                    ConfigError::Declaration(format!("unknown item type {value}"))
                })?;
            }
            "default" => self.default = Some(value),
            "value" => self.set_value(value)?,
            "required" => self.required = value.as_bool().unwrap_or(false),
            "help" => self.help = Some(display_value(&value)),
            "name" => self.name = Some(display_value(&value)),
            other => {
                self.meta.insert(other.to_string(), value);
            }
        }
        Ok(())
    }

    /// The value used for equality and hashing, if the item resolves to one.
    fn comparable(&self) -> Option<Value> {
        if self.has_value() || self.has_default() {
            self.get(None).ok().flatten()
        } else {
            None
        }
    }

    fn dotted_path(&self) -> String {
        if self.path.is_empty() {
            self.name.clone().unwrap_or_default()
        } else {
            self.str_path(".")
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.item_type == other.item_type
            && self.path == other.path
            && self.comparable() == other.comparable()
    }
}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.item_type.name().hash(state);
        self.path.hash(state);
        self.comparable().map(|v| v.to_string()).hash(state);
    }
}

/// Raw text if present, else the resolved value, else the structured form.
impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.raw_text {
            return f.write_str(raw);
        }
        match self.comparable() {
            Some(value) => f.write_str(&display_value(&value)),
            None => write!(f, "{self:?}"),
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.comparable() {
            Some(value) => write!(f, "<Item {} {}>", self.dotted_path(), display_value(&value)),
            None => write!(f, "<Item {} <NotSet>>", self.dotted_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::hash::DefaultHasher;

    fn hash_of(item: &Item) -> u64 {
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn get_returns_value_when_value_is_set() {
        let any = Item::new().with_type(ItemType::Any).with_value(5).unwrap();
        assert_eq!(any.get(None).unwrap(), Some(json!(5)));
        let item = Item::new().with_type(ItemType::Int).with_value(5).unwrap();
        assert_eq!(item.get(Some(json!(10))).unwrap(), Some(json!(5)));
        let item = Item::new().with_value(Value::Null).unwrap();
        assert_eq!(item.get(Some(json!(20))).unwrap(), Some(Value::Null));
    }

    #[test]
    fn get_with_nothing_returns_none() {
        assert_eq!(Item::new().get(None).unwrap(), None);
    }

    #[test]
    fn get_returns_fallback_when_no_value_and_no_default() {
        assert_eq!(Item::new().get(Some(Value::Null)).unwrap(), Some(Value::Null));
        let item = Item::new().with_type(ItemType::Int);
        assert_eq!(item.get(Some(json!(30))).unwrap(), Some(json!(30)));
    }

    #[test]
    fn required_item_fails_without_fallback() {
        let item = Item::named("token").required(true);
        assert_eq!(item.get(Some(json!("a"))).unwrap(), Some(json!("a")));
        assert!(matches!(item.get(None), Err(ConfigError::ValueMissing(p)) if p == "token"));
    }

    #[test]
    fn get_prefers_default_over_fallback() {
        assert_eq!(Item::new().with_default("a").get(None).unwrap(), Some(json!("a")));
        assert_eq!(Item::new().with_default("b").get(Some(json!("c"))).unwrap(), Some(json!("b")));
        let null_default = Item::new().with_default(Value::Null);
        assert_eq!(null_default.get(Some(json!("d"))).unwrap(), Some(Value::Null));
    }

    #[test]
    fn value_wins_over_default() {
        let item = Item::new().with_default("a").with_value(Value::Null).unwrap();
        assert_eq!(item.value().unwrap(), Some(Value::Null));
        let item = Item::new().with_default("a").with_value("b").unwrap();
        assert_eq!(item.get(Some(json!("c"))).unwrap(), Some(json!("b")));
    }

    #[test]
    fn getter_override_routes_every_read() {
        let mut item = Item::named("a")
            .with_type(ItemType::Int)
            .with_default(0)
            .with_value(30)
            .unwrap()
            .with_getter(|_, _| Ok(Some(json!(55))));
        assert_eq!(item.value().unwrap(), Some(json!(55)));
        assert_eq!(item.to_string(), "55");
        item.reset();
        assert_eq!(item.value().unwrap(), Some(json!(55)));
    }

    #[test]
    fn getter_can_delegate_to_resolve() {
        let item = Item::named("a")
            .with_default("x")
            .with_getter(|item, fallback| {
                let resolved = item.resolve(fallback)?;
                Ok(resolved.map(|v| Value::String(display_value(&v).to_uppercase())))
            });
        assert_eq!(item.value().unwrap(), Some(json!("X")));
    }

    #[test]
    fn default_value_reset_cycle() {
        let mut item = Item::at(&["a", "b"]).unwrap().with_default("c");
        assert!(!item.has_value());
        assert!(item.has_default());
        assert_eq!(item.value().unwrap(), Some(json!("c")));

        item.set_value("d").unwrap();
        assert!(item.has_value());
        assert_eq!(item.value().unwrap(), Some(json!("d")));

        item.reset();
        assert!(!item.has_value());
        assert_eq!(item.value().unwrap(), Some(json!("c")));
    }

    #[test]
    fn int_item_coerces_text() {
        let mut item = Item::named("a").with_type(ItemType::Int).with_default(25);
        item.set_value("23").unwrap();
        assert_eq!(item.value().unwrap(), Some(json!(23)));
        assert!(item.set_value("twenty").is_err());
        item.reset();
        assert_eq!(item.value().unwrap(), Some(json!(25)));
    }

    #[test]
    fn str_item_stringifies_numbers() {
        let mut item = Item::named("a");
        item.set_value(24).unwrap();
        assert_eq!(item.value().unwrap(), Some(json!("24")));
        assert_eq!(item.raw_text(), None);
    }

    #[test]
    fn bool_item_preserves_raw_text() {
        let mut item = Item::at(&["a", "b"])
            .unwrap()
            .with_type(ItemType::Bool)
            .with_default(false);
        assert_eq!(item.to_string(), "false");

        let cases = [("False", false), ("no", false), ("0", false), ("1", true), ("yes", true)];
        for (text, expected) in cases {
            item.set_value(text).unwrap();
            assert_eq!(item.value().unwrap(), Some(json!(expected)));
            assert_eq!(item.to_string(), text);
        }

        item.set_value(true).unwrap();
        assert_eq!(item.raw_text(), None);
        assert_eq!(item.to_string(), "true");

        item.reset();
        assert_eq!(item.value().unwrap(), Some(json!(false)));
        assert_eq!(item.raw_text(), None);
    }

    #[test]
    fn is_default_tracks_value_against_default() {
        let mut item = Item::named("a").with_default("x");
        assert!(item.is_default());
        item.set_value("x").unwrap();
        assert!(item.is_default());
        item.set_value("y").unwrap();
        assert!(!item.is_default());
    }

    #[test]
    fn debug_rendering() {
        let item = Item::at(&["this.is", "me"]).unwrap().with_default("yes");
        assert_eq!(format!("{item:?}"), "<Item this.is.me yes>");
        let item = Item::at(&["this.is", "me"]).unwrap();
        assert_eq!(format!("{item:?}"), "<Item this.is.me <NotSet>>");
        assert_eq!(item.to_string(), "<Item this.is.me <NotSet>>");
    }

    #[test]
    fn section_and_option_need_two_segments() {
        let item = Item::at(&["uploads", "threads"]).unwrap();
        assert_eq!(item.section().unwrap(), "uploads");
        assert_eq!(item.option().unwrap(), "threads");
        assert!(Item::at(&["a", "b", "c"]).unwrap().section().is_err());
        assert!(Item::named("a").option().is_err());
    }

    #[test]
    fn equality_and_hash() {
        let a = Item::at(&["a", "b"]).unwrap().with_default("x");
        let b = Item::at(&["a", "b"]).unwrap().with_value("x").unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = Item::at(&["a", "b"]).unwrap();
        let d = Item::at(&["a", "b"]).unwrap();
        assert_eq!(c, d);
        assert_ne!(a, c);

        let e = Item::at(&["a", "b"]).unwrap().with_type(ItemType::Int).with_default("x");
        assert_ne!(a, e);
        assert_ne!(a, Item::at(&["a", "c"]).unwrap().with_default("x"));
    }

    #[test]
    fn meta_entries_configure_attributes() {
        let mut item = Item::named("enabled");
        item.apply_meta("type", json!("bool")).unwrap();
        item.apply_meta("default", json!(false)).unwrap();
        item.apply_meta("help", json!("Turn uploads on")).unwrap();
        item.apply_meta("envvar", json!("APP_ENABLED")).unwrap();
        assert_eq!(item.item_type(), ItemType::Bool);
        assert_eq!(item.default(), Some(&json!(false)));
        assert_eq!(item.help(), Some("Turn uploads on"));
        assert_eq!(item.meta()["envvar"], json!("APP_ENABLED"));
        assert!(item.apply_meta("type", json!("nonsense")).is_err());
    }
}
