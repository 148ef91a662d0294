use std::fmt;

use crate::parser;

/// Attribute names the capability checks look at
pub mod names {
    pub const EXISTING_RKS: &str = "existing rk(s)";
    pub const REMAINING_RKS: &str = "remaining rk(s)";
    pub const PIN_RETRIES: &str = "pin retries";
    pub const MIN_PIN_LENGTH: &str = "minpinlen";
}

/// Ordered `name -> value` rows from the tool's info and storage output
///
/// Rows keep their insertion order, duplicates included, for display.
/// Lookups see the last value written for a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAttributes {
    rows: Vec<(String, String)>,
}

impl DeviceAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from one block of tool output
    pub fn parse(output: &str) -> Self {
        let mut attributes = Self::new();
        attributes.extend_from_output(output);
        attributes
    }

    /// Append every row of `output`
    ///
    /// Lines without a separator are kept with an empty value.
    pub fn extend_from_output(&mut self, output: &str) {
        self.rows.extend(
            parser::key_value_lines(output).map(|(key, value)| (key.to_string(), value.to_string())),
        );
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.rows.push((key.into(), value.into()));
    }

    /// Latest value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.rows
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Latest value for `key` parsed as a count
    pub fn count(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(parser::parse_count)
    }

    /// Rows in display order
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

impl fmt::Display for DeviceAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.rows() {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}
