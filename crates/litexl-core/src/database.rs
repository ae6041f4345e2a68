//! Database type - the ordered collection of named worksheets

use crate::error::{Error, Result};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// An in-memory spreadsheet database
///
/// Holds worksheets in insertion order; the order is the sheet order of the
/// written workbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Database {
    worksheets: Vec<Worksheet>,
}

impl Database {
    /// Create an empty database with no worksheets
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the database has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(|ws| ws.name()).collect()
    }

    /// Get a worksheet by name
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name() == name)
    }

    /// Get a mutable worksheet by name
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.worksheets.iter_mut().find(|ws| ws.name() == name)
    }

    /// Get a worksheet by 0-based position
    pub fn sheet_at(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get the 0-based position of a worksheet by name
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets.iter().position(|ws| ws.name() == name)
    }

    /// Iterate over all worksheets in order
    pub fn sheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Append a new, empty worksheet and return it
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Worksheet> {
        self.validate_sheet_name(name, None)?;
        self.worksheets.push(Worksheet::new(name));
        let index = self.worksheets.len() - 1;
        Ok(&mut self.worksheets[index])
    }

    /// Append an existing worksheet
    pub fn add_existing_sheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name(), None)?;
        self.worksheets.push(worksheet);
        Ok(self.worksheets.len() - 1)
    }

    /// Remove a worksheet by name
    pub fn remove_sheet(&mut self, name: &str) -> Result<Worksheet> {
        let index = self
            .sheet_index(name)
            .ok_or_else(|| Error::SheetNotFound(name.into()))?;
        Ok(self.worksheets.remove(index))
    }

    /// Rename a worksheet
    pub fn rename_sheet(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let index = self
            .sheet_index(old_name)
            .ok_or_else(|| Error::SheetNotFound(old_name.into()))?;
        self.validate_sheet_name(new_name, Some(index))?;
        self.worksheets[index].set_name(new_name);
        Ok(())
    }

    /// Validate a sheet name, optionally excluding a sheet from the duplicate check
    fn validate_sheet_name(&self, name: &str, exclude_index: Option<usize>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        if name.chars().any(char::is_control) {
            return Err(Error::InvalidSheetName(
                "Sheet name cannot contain control characters".into(),
            ));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        for c in INVALID_CHARS {
            if name.contains(*c) {
                return Err(Error::InvalidSheetName(format!(
                    "Sheet name cannot contain '{}'",
                    c
                )));
            }
        }

        // Case-insensitive, like spreadsheet applications
        let name_lower = name.to_lowercase();
        for (i, ws) in self.worksheets.iter().enumerate() {
            if Some(i) != exclude_index && ws.name().to_lowercase() == name_lower {
                return Err(Error::DuplicateSheetName(name.into()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_sheets_keeps_order() {
        let mut db = Database::new();
        db.add_sheet("Sheet1").unwrap();
        db.add_sheet("Data").unwrap();
        db.add_sheet("Summary").unwrap();

        assert_eq!(db.sheet_names(), vec!["Sheet1", "Data", "Summary"]);
        assert_eq!(db.sheet_index("Data"), Some(1));
        assert_eq!(db.sheet_at(2).unwrap().name(), "Summary");
    }

    #[test]
    fn test_duplicate_name() {
        let mut db = Database::new();
        db.add_sheet("Sheet1").unwrap();

        assert!(matches!(
            db.add_sheet("SHEET1"),
            Err(Error::DuplicateSheetName(_))
        ));
    }

    #[test]
    fn test_invalid_sheet_name() {
        let mut db = Database::new();

        assert!(db.add_sheet("").is_err());
        assert!(db.add_sheet("Sheet/1").is_err());
        assert!(db.add_sheet("Sheet:1").is_err());
        assert!(db.add_sheet("Sheet[1]").is_err());
        assert!(db.add_sheet("Tab\tName").is_err());
        assert!(db.add_sheet("Bell\u{7}").is_err());
        assert!(db.add_sheet(&"A".repeat(MAX_SHEET_NAME_LEN + 1)).is_err());
        assert!(db.is_empty());
    }

    #[test]
    fn test_sheet_mut_edits_in_place() {
        let mut db = Database::new();
        db.add_sheet("Data").unwrap();
        db.sheet_mut("Data").unwrap().set_cell(1, 1, "x").unwrap();

        assert_eq!(db.sheet("Data").unwrap().cell(1, 1).as_str(), Some("x"));
        assert!(db.sheet("Missing").is_none());
    }

    #[test]
    fn test_remove_and_rename() {
        let mut db = Database::new();
        db.add_sheet("A").unwrap();
        db.add_sheet("B").unwrap();

        db.rename_sheet("B", "C").unwrap();
        assert_eq!(db.sheet_names(), vec!["A", "C"]);

        // Renaming to its own name in another case is allowed
        db.rename_sheet("C", "c").unwrap();
        assert!(db.rename_sheet("c", "a").is_err());

        let removed = db.remove_sheet("A").unwrap();
        assert_eq!(removed.name(), "A");
        assert_eq!(db.sheet_count(), 1);
        assert!(matches!(db.remove_sheet("A"), Err(Error::SheetNotFound(_))));
    }
}
