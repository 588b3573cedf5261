//! The parameter set data structure and its human readable dump.
use crate::error::{DuplicateFieldSnafu, FormatError, MissingSeparatorSnafu};
use crate::jcamp;
use crate::value::ParameterValue;
use snafu::{ensure, OptionExt};
use std::collections::HashMap;
use std::io::{Result as IoResult, Write};

/// Separator between field name and value in a dump line.
const DUMP_SEPARATOR: &str = " = ";

/// An ordered collection of named parameter values,
/// as read from a single parameter file.
///
/// Field names are unique within a set,
/// and iteration follows the order of the source file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ParameterValue)>,
    index: HashMap<String, usize>,
}

impl ParameterSet {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field at the end of the set,
    /// replacing the value in place if the field already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    /// Fetch a field by name.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Whether the set has a field of the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The number of fields in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the fields in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Write the set as human readable text,
    /// one `key = value` line per field.
    pub fn write_dump(&self, mut to: impl Write) -> IoResult<()> {
        for (name, value) in self.iter() {
            writeln!(to, "{}{}{}", name, DUMP_SEPARATOR, value)?;
        }
        Ok(())
    }

    /// Read back a set from the text produced by [`write_dump`].
    ///
    /// Typed fields (anything other than [`ParameterValue::Opaque`])
    /// come back with the same values.
    /// Blank lines are ignored.
    /// A field may appear only once.
    ///
    /// [`write_dump`]: ParameterSet::write_dump
    pub fn from_dump(text: &str) -> Result<Self, FormatError> {
        let mut set = ParameterSet::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (name, raw) = line.split_once(DUMP_SEPARATOR).context(MissingSeparatorSnafu {
                line: i + 1,
                text: line,
            })?;
            ensure!(!set.contains(name), DuplicateFieldSnafu { field: name });
            let value = jcamp::parse_value(name, raw)?;
            set.insert(name, value);
        }
        Ok(set)
    }
}
