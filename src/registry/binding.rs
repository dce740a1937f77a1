//! # Sensor Binding Table
//!
//! Parses the text file that tells which logical sensor is wired behind
//! which bridge (by the bridge's decimal serial number).
//!
//! ## Format
//!
//! ```text
//! anything before the section is ignored
//! sensors:
//! outer<TAB>6873
//! inner_left<TAB>6181
//! end.
//! ```
//!
//! Each line (newline included) must be 4 to 40 characters long. Malformed
//! lines are reported with their line number inside the section and skipped;
//! they never make the whole file fail.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{BindingIssue, BindingIssueKind, BridgeError, Result};

/// Line opening the binding section
pub const SECTION_START: &str = "sensors:";

/// Line closing the binding section
pub const SECTION_END: &str = "end.";

/// Field separator between name and serial number
pub const SEPARATOR: char = '\t';

/// Longest accepted sensor name
pub const MAX_NAME_LEN: usize = 29;

/// Shortest accepted line, newline included
pub const MIN_LINE_LEN: usize = 4;

/// Longest accepted line, newline included
pub const MAX_LINE_LEN: usize = 40;

/// One configured logical sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorBinding {
    pub name: String,
    /// Serial number of the bridge the sensor is wired to
    pub serial_number: u32,
}

/// Validated set of bindings with unique names and serial numbers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    entries: Vec<SensorBinding>,
}

impl BindingTable {
    /// Parse binding text
    ///
    /// # Returns
    ///
    /// The accepted entries in file order and every rejected line.
    ///
    /// # Examples
    ///
    /// ```
    /// use shtw1_bridge::registry::binding::BindingTable;
    ///
    /// let (table, issues) = BindingTable::parse("sensors:\nouter\t6873\nend.\n");
    /// assert!(issues.is_empty());
    /// assert_eq!(table.entries()[0].serial_number, 6873);
    /// ```
    pub fn parse(text: &str) -> (Self, Vec<BindingIssue>) {
        let mut lines = text.split_inclusive('\n');
        let mut table = BindingTable::default();
        let mut issues = Vec::new();

        // Skip everything up to and including the section start
        if !lines.by_ref().any(|line| strip_newline(line) == SECTION_START) {
            return (table, issues);
        }

        let mut names = HashSet::new();
        let mut serials = HashSet::new();

        for (index, raw) in lines.enumerate() {
            let line_number = index + 1;
            let content = strip_newline(raw);
            let length = content.len() + 1;

            let issue = |reason| BindingIssue {
                line: line_number,
                content: content.to_string(),
                reason,
            };

            if length < MIN_LINE_LEN {
                issues.push(issue(BindingIssueKind::TooShort(length)));
                continue;
            }
            if length > MAX_LINE_LEN {
                issues.push(issue(BindingIssueKind::TooLong(length)));
                continue;
            }
            if content == SECTION_END {
                break;
            }

            match parse_line(content) {
                Ok(binding) => {
                    if !names.insert(binding.name.clone()) {
                        issues.push(issue(BindingIssueKind::DuplicateName(binding.name)));
                    } else if !serials.insert(binding.serial_number) {
                        names.remove(&binding.name);
                        issues.push(issue(BindingIssueKind::DuplicateSerial(binding.serial_number)));
                    } else {
                        table.entries.push(binding);
                    }
                }
                Err(reason) => issues.push(issue(reason)),
            }
        }

        (table, issues)
    }

    /// Load and parse a binding file
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Bindings`] if the file cannot be read. Problems
    /// inside the file are returned as issues, not errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Self, Vec<BindingIssue>)> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            BridgeError::Bindings(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&text))
    }

    /// Build a table from already validated entries
    ///
    /// # Errors
    ///
    /// Returns the first invalid or duplicated entry as an issue; `line` is
    /// the 1-based position in `entries`.
    pub fn from_entries(entries: Vec<SensorBinding>) -> std::result::Result<Self, BindingIssue> {
        let mut names = HashSet::new();
        let mut serials = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            let issue = |reason| BindingIssue {
                line: index + 1,
                content: format!("{}{}{}", entry.name, SEPARATOR, entry.serial_number),
                reason,
            };

            if entry.name.is_empty() {
                return Err(issue(BindingIssueKind::EmptyName));
            }
            if entry.name.chars().count() > MAX_NAME_LEN {
                return Err(issue(BindingIssueKind::NameTooLong(entry.name.chars().count())));
            }
            if entry.serial_number == 0 {
                return Err(issue(BindingIssueKind::InvalidSerial("0".to_string())));
            }
            if !names.insert(entry.name.clone()) {
                return Err(issue(BindingIssueKind::DuplicateName(entry.name.clone())));
            }
            if !serials.insert(entry.serial_number) {
                return Err(issue(BindingIssueKind::DuplicateSerial(entry.serial_number)));
            }
        }

        Ok(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[SensorBinding] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn strip_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Split `<name><TAB><serial>` and validate both fields
fn parse_line(content: &str) -> std::result::Result<SensorBinding, BindingIssueKind> {
    let (name, serial) = content
        .split_once(SEPARATOR)
        .ok_or(BindingIssueKind::MissingSeparator)?;

    if name.is_empty() {
        return Err(BindingIssueKind::EmptyName);
    }
    if serial.is_empty() {
        return Err(BindingIssueKind::EmptySerial);
    }

    let name_len = name.chars().count();
    if name_len > MAX_NAME_LEN {
        return Err(BindingIssueKind::NameTooLong(name_len));
    }

    let serial_number = serial
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|&sn| sn != 0)
        .ok_or_else(|| BindingIssueKind::InvalidSerial(serial.to_string()))?;

    Ok(SensorBinding {
        name: name.to_string(),
        serial_number,
    })
}
