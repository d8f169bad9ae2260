use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Insertion-ordered string map used for table rows and lead data.
///
/// Inserting an existing key overwrites its value in place, so the key keeps
/// the position of its first insertion (last write wins on the value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert a value, returning the previous one if the key was present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive lookup; the first matching key wins.
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| k.to_lowercase() == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of strings")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> std::result::Result<Record, M::Error> {
        let mut record = Record::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            record.insert(key, value);
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Record, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

/// In-memory result of loading one file, before any semantic typing.
///
/// Every row carries exactly the key set of `headers`; cells missing from a
/// short source row are stored as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
}

impl RawTable {
    /// The "no data" outcome: no headers and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from a grid of trimmed cells.
    ///
    /// The first row is the header row; if it has no non-blank cell the
    /// result is the empty table. Blank header cells drop their column while
    /// every other column keeps reading its own position. Data rows whose
    /// cells are all blank are skipped.
    pub fn from_grid<I>(grid: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut grid = grid.into_iter();

        let header_row = match grid.next() {
            Some(row) => row,
            None => return Self::empty(),
        };

        let columns: Vec<(usize, String)> = header_row
            .into_iter()
            .enumerate()
            .map(|(pos, cell)| (pos, cell.trim().to_string()))
            .filter(|(_, name)| !name.is_empty())
            .collect();

        if columns.is_empty() {
            return Self::empty();
        }

        let mut rows = Vec::new();
        for cells in grid {
            if is_blank_row(&cells) {
                continue;
            }
            let mut record = Record::with_capacity(columns.len());
            for (pos, name) in &columns {
                let value = cells.get(*pos).cloned().unwrap_or_default();
                record.insert(name.as_str(), value);
            }
            rows.push(record);
        }

        Self {
            headers: columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        }
    }

    /// True when no usable header row was found.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Headers with repeated names removed, first occurrence kept.
    pub fn distinct_headers(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for header in &self.headers {
            if !seen.contains(&header.as_str()) {
                seen.push(header.as_str());
            }
        }
        seen
    }
}

fn is_blank_row(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}
