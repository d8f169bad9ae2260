pub mod delimited;
pub mod spreadsheet;

use crate::error::Result;
use crate::ingest::table::RawTable;

pub use delimited::{Delimiter, DelimitedLoader};
pub use spreadsheet::SpreadsheetLoader;

/// Trait for file loaders
pub trait Loader {
    /// Check if this loader handles the given (lowercase) file extension
    fn can_load(&self, extension: &str) -> bool;

    /// Decode file bytes into a table
    ///
    /// A file without a usable header row yields `RawTable::empty()`, not an error.
    fn load(&self, bytes: &[u8], file_name: &str) -> Result<RawTable>;
}

/// Loader registry that selects the loader by extension
///
/// Anything no registered loader claims is read as delimited text.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn Loader + Send + Sync>>,
    fallback: DelimitedLoader,
}

impl LoaderRegistry {
    /// Create a new registry with all built-in loaders
    pub fn new() -> Self {
        let mut registry = Self {
            loaders: Vec::new(),
            fallback: DelimitedLoader,
        };

        registry.register(Box::new(SpreadsheetLoader));
        registry.register(Box::new(DelimitedLoader));

        registry
    }

    /// Register a loader
    pub fn register(&mut self, loader: Box<dyn Loader + Send + Sync>) {
        self.loaders.push(loader);
    }

    /// Find the loader for the given extension, falling back to delimited text
    pub fn find_loader(&self, extension: &str) -> &dyn Loader {
        let extension = extension.to_lowercase();
        self.loaders
            .iter()
            .find(|l| l.can_load(&extension))
            .map(|l| l.as_ref() as &dyn Loader)
            .unwrap_or(&self.fallback)
    }

    /// Load file bytes using the loader chosen by the file name's extension
    pub fn load(&self, bytes: &[u8], file_name: &str) -> Result<RawTable> {
        let extension = super::metadata::file_extension(file_name);
        let table = self.find_loader(&extension).load(bytes, file_name)?;

        if table.is_empty() {
            log::warn!("{}: no usable header row", file_name);
        } else {
            log::debug!(
                "{}: {} columns, {} rows",
                file_name,
                table.column_count(),
                table.row_count()
            );
        }

        Ok(table)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_registry_dispatch() {
        let registry = LoaderRegistry::new();

        assert!(registry.find_loader("xlsx").can_load("xlsx"));
        assert!(registry.find_loader("XLS").can_load("xls"));
        assert!(registry.find_loader("csv").can_load("csv"));
        // unknown extensions fall back to delimited text
        assert!(registry.find_loader("dat").can_load("csv"));
    }

    #[test]
    fn test_unknown_extension_read_as_text() {
        let registry = LoaderRegistry::new();
        let table = registry.load(b"Name;Phone\nAcme;1", "export.dat").unwrap();
        assert_eq!(table.headers, vec!["Name", "Phone"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_spreadsheet_extension_not_read_as_text() {
        let registry = LoaderRegistry::new();
        let result = registry.load(b"Name,Phone\nAcme,1", "leads.xlsx");
        assert!(result.is_err());
    }
}
