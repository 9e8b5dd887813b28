//! INI-like codec: `[section]` headers and `option = value` lines.
//!
//! The grammar is restricted to two levels. Parsed values are always text.
//! Options may use `=` or `:` as the delimiter, whichever comes first.
//! Lines starting with `#` or `;` are comments. An indented line continues
//! the previous option's value. Options written before any header belong to
//! the default section.
//!
//! Serializing takes a mapping of sections to mappings of scalars; scalar
//! entries at the top level are written to the default section, which comes
//! first. Nested mappings below a section fail with
//! [`ConfigError::NotImplementedDepth`].

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::format::{Codec, Format};
use crate::path::DEFAULT_SECTION;
use crate::types::display_value;

pub struct IniCodec;

impl Codec for IniCodec {
    fn format(&self) -> Format {
        Format::Ini
    }

    fn parse(&self, text: &str) -> Result<Map<String, Value>, ConfigError> {
        let mut sections: Map<String, Value> = Map::new();
        let mut current: Option<String> = None;
        let mut last_option: Option<String> = None;

        for (i, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Continuation of the previous value
            if line.starts_with([' ', '\t'])
                && let (Some(section), Some(option)) = (&current, &last_option)
                && let Some(Value::Object(options)) = sections.get_mut(section)
                && let Some(Value::String(value)) = options.get_mut(option)
            {
                value.push('\n');
                value.push_str(trimmed);
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| parse_error(i, "malformed section header"))?;
                sections
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                current = Some(name.to_string());
                last_option = None;
                continue;
            }

            let Some(split) = trimmed.find(['=', ':']) else {
                return Err(parse_error(i, "expected 'option = value'"));
            };
            let option = trimmed[..split].trim();
            let value = trimmed[split + 1..].trim();
            if option.is_empty() {
                return Err(parse_error(i, "option name is empty"));
            }

            let section = current
                .get_or_insert_with(|| DEFAULT_SECTION.to_string())
                .clone();
            let entry = sections
                .entry(section)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(options) = entry {
                options.insert(option.to_string(), Value::String(value.to_string()));
            }
            last_option = Some(option.to_string());
        }

        Ok(sections)
    }

    fn serialize(&self, data: &Map<String, Value>) -> Result<String, ConfigError> {
        let mut defaults: Vec<(&str, String)> = Vec::new();
        let mut sections: Vec<(&str, Vec<(&str, String)>)> = Vec::new();

        for (name, value) in data {
            match value {
                Value::Object(options) => {
                    let mut lines = Vec::with_capacity(options.len());
                    for (option, value) in options {
                        if value.is_object() {
                            return Err(ConfigError::NotImplementedDepth {
                                path: format!("{name}.{option}"),
                                format: Format::Ini,
                            });
                        }
                        lines.push((option.as_str(), display_value(value)));
                    }
                    if name == DEFAULT_SECTION {
                        defaults.extend(lines);
                    } else {
                        sections.push((name, lines));
                    }
                }
                scalar => defaults.push((name, display_value(scalar))),
            }
        }

        let mut out = String::new();
        if !defaults.is_empty() {
            write_section(&mut out, DEFAULT_SECTION, &defaults);
        }
        for (name, lines) in &sections {
            write_section(&mut out, name, lines);
        }
        Ok(out)
    }
}

fn write_section(out: &mut String, name: &str, lines: &[(&str, String)]) {
    out.push_str(&format!("[{name}]\n"));
    for (option, value) in lines {
        let value = value.replace('\n', "\n\t");
        if value.is_empty() {
            out.push_str(&format!("{option} =\n"));
        } else {
            out.push_str(&format!("{option} = {value}\n"));
        }
    }
    out.push('\n');
}

fn parse_error(line_index: usize, reason: &str) -> ConfigError {
    ConfigError::ParseError {
        format: Format::Ini,
        reason: format!("{reason} (line {})", line_index + 1),
    }
}
