//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "XFD1048576")
///
/// Rows and columns are 1-based, matching the numbers shown by spreadsheet
/// applications: `A1` is row 1, column 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Row number (1-based)
    pub row: u32,
    /// Column number (1-based, A=1, B=2, ..., XFD=16384)
    pub col: u32,
}

impl CellAddress {
    /// Create a new cell address, validating the 1-based bounds
    pub fn new(row: u32, col: u32) -> Result<Self> {
        if row == 0 || row > MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS));
        }
        if col == 0 || col > MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS));
        }
        Ok(Self { row, col })
    }

    /// Parse a cell address from A1-style notation
    ///
    /// `$` markers are accepted and ignored.
    ///
    /// # Examples
    /// ```
    /// use litexl_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("B5").unwrap();
    /// assert_eq!(addr.row, 5);
    /// assert_eq!(addr.col, 2);
    ///
    /// let addr = CellAddress::parse("$AA$10").unwrap();
    /// assert_eq!((addr.row, addr.col), (10, 27));
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        if bytes.get(pos) == Some(&b'$') {
            pos += 1;
        }

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }

        if pos == col_start {
            return Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                s
            )));
        }

        let col = Self::letters_to_column(&s[col_start..pos])?;

        if bytes.get(pos) == Some(&b'$') {
            pos += 1;
        }

        let row_str = &s[pos..];
        if row_str.is_empty() {
            return Err(Error::InvalidAddress(format!("no row number in '{}'", s)));
        }

        let row: u32 = row_str
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;

        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                s
            )));
        }

        Self::new(row, col)
    }

    /// Convert a 1-based column number to letters (1 = A, 26 = Z, 27 = AA, etc.)
    pub fn column_to_letters(col: u32) -> String {
        let mut result = String::new();
        let mut n = col;

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to a 1-based column number (A = 1, Z = 26, AA = 27, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u32> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col
                .saturating_mul(26)
                .saturating_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }

        if col > MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS));
        }

        Ok(col)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        let mut result = Self::column_to_letters(self.col);
        result.push_str(&self.row.to_string());
        result
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Convert a 1-based (row, column) pair to an "A1"-style address.
///
/// Out-of-range values are not checked; use [`CellAddress::new`] for that.
pub fn index_to_address(row: u32, col: u32) -> String {
    let mut result = CellAddress::column_to_letters(col);
    result.push_str(&row.to_string());
    result
}

/// Convert an "A1"-style address to a 1-based (row, column) pair.
pub fn address_to_index(address: &str) -> Result<(u32, u32)> {
    let addr = CellAddress::parse(address)?;
    Ok((addr.row, addr.col))
}

/// A range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range, normalized so `start` is the top-left corner
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        Self {
            start: CellAddress {
                row: start.row.min(end.row),
                col: start.col.min(end.col),
            },
            end: CellAddress {
                row: start.row.max(end.row),
                col: start.col.max(end.col),
            },
        }
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1:B10 notation
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some((start, end)) = s.split_once(':') {
            let start = CellAddress::parse(start)
                .map_err(|_| Error::InvalidRange(s.to_string()))?;
            let end =
                CellAddress::parse(end).map_err(|_| Error::InvalidRange(s.to_string()))?;
            Ok(Self::new(start, end))
        } else {
            let addr = CellAddress::parse(s)?;
            Ok(Self::single(addr))
        }
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.row >= self.start.row
            && addr.row <= self.end.row
            && addr.col >= self.start.col
            && addr.col <= self.end.col
    }

    /// Format as A1:B10 string (a single cell formats as "A1")
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_letters() {
        assert_eq!(CellAddress::column_to_letters(1), "A");
        assert_eq!(CellAddress::column_to_letters(2), "B");
        assert_eq!(CellAddress::column_to_letters(26), "Z");
        assert_eq!(CellAddress::column_to_letters(27), "AA");
        assert_eq!(CellAddress::column_to_letters(28), "AB");
        assert_eq!(CellAddress::column_to_letters(702), "ZZ");
        assert_eq!(CellAddress::column_to_letters(703), "AAA");
        assert_eq!(CellAddress::column_to_letters(16384), "XFD");
    }

    #[test]
    fn test_letters_to_column() {
        assert_eq!(CellAddress::letters_to_column("A").unwrap(), 1);
        assert_eq!(CellAddress::letters_to_column("Z").unwrap(), 26);
        assert_eq!(CellAddress::letters_to_column("AA").unwrap(), 27);
        assert_eq!(CellAddress::letters_to_column("ZZ").unwrap(), 702);
        assert_eq!(CellAddress::letters_to_column("XFD").unwrap(), 16384);

        // Case insensitive
        assert_eq!(CellAddress::letters_to_column("aa").unwrap(), 27);

        assert!(CellAddress::letters_to_column("XFE").is_err());
        assert!(CellAddress::letters_to_column("A1").is_err());
    }

    #[test]
    fn test_cell_address_parse() {
        let addr = CellAddress::parse("A1").unwrap();
        assert_eq!((addr.row, addr.col), (1, 1));

        let addr = CellAddress::parse("C100").unwrap();
        assert_eq!((addr.row, addr.col), (100, 3));

        let addr = CellAddress::parse("$B$2").unwrap();
        assert_eq!((addr.row, addr.col), (2, 2));

        let addr = CellAddress::parse("XFD1048576").unwrap();
        assert_eq!((addr.row, addr.col), (1_048_576, 16_384));
    }

    #[test]
    fn test_cell_address_parse_errors() {
        assert!(CellAddress::parse("").is_err());
        assert!(CellAddress::parse("A").is_err());
        assert!(CellAddress::parse("1").is_err());
        assert!(CellAddress::parse("A0").is_err());
        assert!(CellAddress::parse("A1048577").is_err());
        assert!(CellAddress::parse("XFE1").is_err());
    }

    #[test]
    fn test_new_rejects_zero() {
        assert!(CellAddress::new(0, 1).is_err());
        assert!(CellAddress::new(1, 0).is_err());
        assert!(CellAddress::new(1, 1).is_ok());
    }

    #[test]
    fn test_index_address_conversions() {
        assert_eq!(index_to_address(1, 1), "A1");
        assert_eq!(index_to_address(5, 2), "B5");
        assert_eq!(index_to_address(10, 28), "AB10");
        assert_eq!(address_to_index("B5").unwrap(), (5, 2));
        assert_eq!(address_to_index("ab10").unwrap(), (10, 28));
    }

    #[test]
    fn test_cell_range_parse() {
        let range = CellRange::parse("A1:B2").unwrap();
        assert_eq!(range.start, CellAddress::new(1, 1).unwrap());
        assert_eq!(range.end, CellAddress::new(2, 2).unwrap());

        // Normalized
        let range = CellRange::parse("C3:A1").unwrap();
        assert_eq!(range.to_string(), "A1:C3");

        // Single cell
        let range = CellRange::parse("C3").unwrap();
        assert_eq!(range.start, range.end);
        assert_eq!(range.to_string(), "C3");

        assert!(CellRange::parse("A1:").is_err());
    }

    #[test]
    fn test_cell_range_contains() {
        let range = CellRange::parse("B2:D4").unwrap();

        assert!(range.contains(&CellAddress::new(2, 2).unwrap()));
        assert!(range.contains(&CellAddress::new(4, 4).unwrap()));
        assert!(!range.contains(&CellAddress::new(1, 1).unwrap()));
        assert!(!range.contains(&CellAddress::new(5, 2).unwrap()));
    }
}
