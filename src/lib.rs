//! Typed, hierarchical configuration trees. Declare the shape once, then
//! read, assign, and persist values through INI, JSON, YAML or TOML.
//!
//! configtree models configuration as a tree of **sections** and **items**.
//! An item is a single typed leaf with a default, a value, and the raw text
//! the value came from. A section is an ordered mapping of named children.
//! Values are dynamic ([`serde_json::Value`]) and every assignment is coerced
//! through the item's [`ItemType`].
//!
//! ```ignore
//! let mut config = Section::new(json!({
//!     "uploads": {
//!         "enabled": false,
//!         "threads": 1,
//!         "db": {"user": "root"},
//!     }
//! }))?;
//!
//! config.load(Format::Yaml, "uploads.yaml", false)?;
//! config.section_mut("uploads")?.set_value("threads", "5")?;
//! assert_eq!(config.item_at(&["uploads", "threads"])?.value()?, Some(json!(5)));
//! ```
//!
//! # Declaring a tree
//!
//! [`Section::new`] takes anything that converts into a [`Declaration`]:
//!
//! - **Mappings**: nested objects become sections, scalars become items whose
//!   default is the scalar and whose type is inferred from it.
//! - **Lists**: bare names become valueless items; `(name, child)` pairs
//!   declare a child under that name.
//! - **Structs**: [`Declaration::from_serialize`] walks a serializable value
//!   (fields starting with `_` are private), and
//!   [`Declaration::from_config`] walks a confique config struct, turning
//!   `#[config(default)]` into defaults and `///` docs into help text.
//! - **Files**: [`Section::from_file`] declares a tree from a file, picking
//!   the format by extension.
//!
//! Keys starting with `@` are metadata, never children:
//!
//! ```text
//! enabled: {"@default": false, "@help": "Turn uploads on"}   item, bool
//! db:      {"@type": "dict", "user": "root"}                 item, dict
//! db:      {"@help": "Database", "user": "root"}             section
//! ```
//!
//! All sections of one tree share a single [`TreeSettings`] by reference.
//!
//! # Reading values
//!
//! [`Item::get`] resolves value, then default, then the caller's fallback.
//! With nothing to return, a required item fails with
//! [`ConfigError::ValueMissing`]; any other item returns `Ok(None)`.
//!
//! Assigning text to a non-text item keeps the text: a bool set from `"no"`
//! reads as `false` but is written back as `no`.
//!
//! # Formats
//!
//! | Format | Extensions | Depth |
//! |--------|------------|-------|
//! | [`Format::Ini`] | `.ini`, `.cfg`, `.conf` | two levels, all values text |
//! | [`Format::Json`] | `.json` | any |
//! | [`Format::Yaml`] | `.yml`, `.yaml` | any |
//! | [`Format::Toml`] | `.toml` | any |
//!
//! INI writes root-level items to the `[DEFAULT]` section and reads them
//! back from it. Trees deeper than two levels fail with
//! [`ConfigError::NotImplementedDepth`]. [`persist_tree`] patches a TOML
//! file in place with `toml_edit`, keeping comments and unknown keys.
//!
//! # Flat manager
//!
//! [`Manager`] is a flat registry keyed by path, independent of the tree.
//! It keeps a prefix index for queries like [`Manager::find_items`] and
//! [`Manager::export`], files single-segment paths under a default section,
//! and reads with `as_defaults` to declare items from a file.
//!
//! # Error handling
//!
//! All fallible operations return [`ConfigError`]. Path problems are
//! [`PathError`]s wrapped in [`ConfigError::Path`].

pub mod declaration;
pub mod error;
pub mod format;
pub mod path;
pub mod types;

mod builder;
mod ini;
mod item;
mod manager;
mod persist;
mod section;

#[cfg(test)]
mod fixtures;

pub use builder::ManagerBuilder;
pub use declaration::{Declaration, ListEntry};
pub use error::{ConfigError, PathError};
pub use format::{Codec, Format};
pub use ini::IniCodec;
pub use item::{Getter, Item};
pub use manager::{Manager, SectionProxy, SectionProxyMut};
pub use persist::{persist_tree, set_in_document, unset_in_document};
pub use section::{Child, KeyShape, STR_PATH_SEPARATOR, Section, TreeKey, TreeSettings};
pub use types::ItemType;
