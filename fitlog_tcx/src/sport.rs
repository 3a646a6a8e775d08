//! Sport-name normalisation between SportTracks categories and TCX sports.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::fitlog::SourceActivity;
use crate::ConvertError;

/// Sport names accepted by the TCX schema.
pub const VALID_SPORTS: [&str; 4] = ["Running", "Biking", "Multisport", "Other"];

/// Catch-all SportTracks categories rewritten when no mapping is in effect.
pub const GENERIC_SPORTS: [&str; 2] = ["My Activities", "Other"];

pub const DEFAULT_SPORT: &str = "Running";

/// Replacement table from SportTracks category names to output sport names.
///
/// An empty table means no mapping is in effect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SportMapping {
    entries: BTreeMap<String, String>,
}

impl SportMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `raw name, replacement` rows from CSV. Later duplicates win.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConvertError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::Fields)
            .from_reader(reader);
        let mut mapping = Self::new();
        for (index, row) in csv_reader.records().enumerate() {
            let row = row?;
            match (row.get(0), row.get(1)) {
                (Some(raw), Some(replacement)) => mapping.insert(raw, replacement),
                _ => return Err(ConvertError::MappingRow(index + 1)),
            }
        }
        Ok(mapping)
    }

    pub fn insert(&mut self, raw: impl Into<String>, replacement: impl Into<String>) {
        self.entries.insert(raw.into(), replacement.into());
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.entries.get(raw).map(String::as_str)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.entries.contains_key(raw)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SportMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (raw, replacement) in iter {
            mapping.insert(raw, replacement);
        }
        mapping
    }
}

/// Load a sport mapping CSV file.
pub fn load_sport_mapping(path: &Path) -> Result<SportMapping, ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    SportMapping::from_reader(file)
}

/// Resolve a raw category name to the sport written into the TCX output.
pub fn resolve<'a>(raw: &'a str, mapping: &'a SportMapping) -> &'a str {
    if let Some(mapped) = mapping.get(raw) {
        return mapped;
    }
    if mapping.is_empty() && GENERIC_SPORTS.contains(&raw) {
        return DEFAULT_SPORT;
    }
    raw
}

/// Whether `raw` will produce an acceptable sport under `mapping`.
pub fn is_supported(raw: &str, mapping: &SportMapping) -> bool {
    VALID_SPORTS.contains(&raw)
        || mapping.contains(raw)
        || (mapping.is_empty() && GENERIC_SPORTS.contains(&raw))
}

/// Distinct category names, in first-seen order, that are neither valid TCX
/// sports nor covered by `mapping`.
pub fn find_unsupported_activities(
    activities: &[SourceActivity],
    mapping: &SportMapping,
) -> Vec<String> {
    let mut unsupported: Vec<String> = Vec::new();
    for activity in activities {
        let name = activity.sport_category.as_str();
        if !is_supported(name, mapping) && !unsupported.iter().any(|seen| seen == name) {
            unsupported.push(name.to_string());
        }
    }
    unsupported
}
