use crate::error::ConfigError;
use crate::format::Format;
use crate::item::Item;
use crate::manager::Manager;
use crate::path::DEFAULT_SECTION;

/// Builder for a [`Manager`] with its registry options and initial items.
///
/// ```ignore
/// let config = Manager::builder()
///     .default_section("general")
///     .format(Format::Yaml)
///     .item(Item::at(&["uploads", "threads"])?.with_default(1))
///     .build()?;
/// ```
pub struct ManagerBuilder {
    default_section: String,
    format: Format,
    items: Vec<Item>,
}

impl ManagerBuilder {
    pub(crate) fn new() -> Self {
        Self {
            default_section: DEFAULT_SECTION.to_string(),
            format: Format::Ini,
            items: Vec::new(),
        }
    }

    /// Section that single-segment paths are filed under (default: `DEFAULT`).
    pub fn default_section(mut self, name: &str) -> Self {
        self.default_section = name.to_string();
        self
    }

    /// Format used by `read`, `read_string`, `read_file` and `write`
    /// (default: [`Format::Ini`]).
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Register an item when the manager is built.
    pub fn item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn items<I: IntoIterator<Item = Item>>(mut self, items: I) -> Self {
        self.items.extend(items);
        self
    }

    /// Build the manager. Fails on malformed or duplicate item paths.
    pub fn build(self) -> Result<Manager, ConfigError> {
        if self.default_section.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "default_section".into(),
                reason: "must not be empty".into(),
            });
        }
        let mut manager = Manager::new(self.default_section, self.format);
        for item in &self.items {
            manager.add(item)?;
        }
        Ok(manager)
    }
}
