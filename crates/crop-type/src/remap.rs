//! Annual crop remap table.
//!
//! Authored as a two column CSV (`IN,OUT`, `#` comments). After loading the
//! table is total over codes 1..=255: codes that were not authored map to
//! themselves.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use tracing::debug;

use compute::RemapPairs;

use crate::error::{CropTypeError, Result};

/// Largest classification code.
pub const MAX_CODE: i64 = 255;

#[derive(Debug, Deserialize)]
struct RemapRow {
    #[serde(rename = "IN")]
    input: i64,
    #[serde(rename = "OUT")]
    output: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapTable {
    authored: BTreeMap<i64, i64>,
}

impl RemapTable {
    /// Load the table from a CSV file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            CropTypeError::Remap(format!("Failed to open {:?}: {}", path, e))
        })?;
        let table = Self::from_reader(file)?;
        debug!(path = ?path, authored = table.authored.len(), "Loaded remap table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(Trim::All)
            .from_reader(reader);

        let mut pairs = Vec::new();
        for row in csv.deserialize::<RemapRow>() {
            let row = row?;
            pairs.push((row.input, row.output));
        }
        Self::from_pairs(pairs)
    }

    /// Build from authored `(in, out)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, i64)>) -> Result<Self> {
        let mut authored = BTreeMap::new();
        for (input, output) in pairs {
            for code in [input, output] {
                if !(1..=MAX_CODE).contains(&code) {
                    return Err(CropTypeError::Remap(format!(
                        "code {} is outside 1..={}",
                        code, MAX_CODE
                    )));
                }
            }
            if authored.insert(input, output).is_some() {
                return Err(CropTypeError::Remap(format!("code {} listed twice", input)));
            }
        }
        Ok(Self { authored })
    }

    /// Canonical code for `code`. Unauthored codes map to themselves.
    pub fn apply(&self, code: i64) -> i64 {
        self.authored.get(&code).copied().unwrap_or(code)
    }

    /// True when `code` has an explicit entry in the authored table.
    pub fn is_authored(&self, code: i64) -> bool {
        self.authored.contains_key(&code)
    }

    /// The full mapping over 1..=255 as paired lists.
    pub fn pairs(&self) -> RemapPairs {
        let from: Vec<i64> = (1..=MAX_CODE).collect();
        let to = from.iter().map(|&code| self.apply(code)).collect();
        RemapPairs { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::SAMPLE_REMAP_CSV;
    use tokio_test::assert_err;

    #[test]
    fn test_total_over_code_range() {
        let table = RemapTable::from_reader(SAMPLE_REMAP_CSV.as_bytes()).unwrap();
        let pairs = table.pairs();
        assert_eq!(pairs.from.len(), 255);
        assert_eq!(pairs.to.len(), 255);
        for (input, output) in pairs.from.iter().zip(&pairs.to) {
            if table.is_authored(*input) {
                assert_eq!(*output, table.apply(*input));
            } else {
                assert_eq!(output, input);
            }
        }
    }

    #[test]
    fn test_annual_crops_collapse() {
        let table = RemapTable::from_reader(SAMPLE_REMAP_CSV.as_bytes()).unwrap();
        assert_eq!(table.apply(1), 47);
        assert_eq!(table.apply(24), 47);
        assert!(table.is_authored(1));
        // Perennials and non crop codes pass through
        assert_eq!(table.apply(36), 36);
        assert_eq!(table.apply(176), 176);
        assert!(!table.is_authored(36));
    }

    #[test]
    fn test_comments_and_whitespace() {
        let csv = "# header comment\nIN, OUT\n 1 , 47\n# trailing\n5,47\n";
        let table = RemapTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.apply(5), 47);
    }

    #[test]
    fn test_rejects_duplicates_and_range() {
        assert_err!(RemapTable::from_pairs([(1, 47), (1, 48)]));
        assert_err!(RemapTable::from_pairs([(0, 47)]));
        assert_err!(RemapTable::from_pairs([(1, 256)]));
    }
}
