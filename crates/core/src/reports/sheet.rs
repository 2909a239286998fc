//! Workbook-independent sheet model.
//!
//! Layouts build rows of [`Cell`]s tagged with a [`RowStyle`]; the renderer
//! maps styles to formats. Keeping the layout free of `rust_xlsxwriter` lets
//! the row contents be tested directly.

use std::collections::HashMap;

use rust_decimal::Decimal;

/// Name of the first sheet of every workbook.
pub const SUMMARY_SHEET: &str = "汇总";

/// Longest sheet name Excel accepts.
pub const MAX_SHEET_NAME_CHARS: usize = 31;

const ILLEGAL_SHEET_CHARS: [char; 7] = ['\\', '/', '*', '?', ':', '[', ']'];

/// One cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Nothing written; borders still apply.
    Empty,
    /// Text.
    Text(String),
    /// Whole number.
    Int(i64),
    /// Money or price, already rounded.
    Amount(Decimal),
}

impl Cell {
    /// Text content, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<Decimal> for Cell {
    fn from(value: Decimal) -> Self {
        Self::Amount(value)
    }
}

/// Visual role of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    /// Grey bold header (daily summary).
    Header,
    /// Green bold header (comparison blocks).
    BlockHeader,
    /// Plain data.
    Data,
    /// Period difference; red from the period column on.
    Difference,
    /// Detail sheet title: bold shop name, status colored by `alert`.
    Title {
        /// Whether the status line reports a problem.
        alert: bool,
    },
    /// Detail sheet section caption in blue.
    Section,
    /// Target check; third column green or red.
    Check {
        /// Whether the target was met.
        passed: bool,
    },
}

/// A row of cells with its style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// Cells from column A.
    pub cells: Vec<Cell>,
    /// Visual role.
    pub style: RowStyle,
}

impl SheetRow {
    /// Creates a row.
    #[must_use]
    pub const fn new(style: RowStyle, cells: Vec<Cell>) -> Self {
        Self { cells, style }
    }

    /// Plain data row.
    #[must_use]
    pub const fn data(cells: Vec<Cell>) -> Self {
        Self::new(RowStyle::Data, cells)
    }

    /// Row with no values.
    #[must_use]
    pub const fn blank() -> Self {
        Self::data(Vec::new())
    }
}

/// Removes characters Excel forbids and truncates to 31 characters.
#[must_use]
pub fn clean_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !ILLEGAL_SHEET_CHARS.contains(c))
        .take(MAX_SHEET_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim().to_string();
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    }
}

/// Hands out unique sheet names within one workbook.
///
/// Excel compares sheet names case-insensitively; a repeated name becomes
/// `<prefix>_<n>`, with the prefix shortened so the result fits in 31 chars.
#[derive(Debug, Default)]
pub struct SheetNames {
    used: HashMap<String, usize>,
}

impl SheetNames {
    /// Allocator with the summary sheet name already taken.
    #[must_use]
    pub fn with_summary() -> Self {
        let mut names = Self::default();
        names.used.insert(SUMMARY_SHEET.to_lowercase(), 1);
        names
    }

    /// Returns a unique, valid sheet name derived from `raw`.
    pub fn allocate(&mut self, raw: &str) -> String {
        let base = clean_sheet_name(raw);
        let key = base.to_lowercase();

        let Some(count) = self.used.get(&key).copied() else {
            self.used.insert(key, 1);
            return base;
        };

        let mut n = count + 1;
        loop {
            let suffix = format!("_{n}");
            let prefix: String = base
                .chars()
                .take(MAX_SHEET_NAME_CHARS - suffix.chars().count())
                .collect();
            let candidate = format!("{prefix}{suffix}");
            let candidate_key = candidate.to_lowercase();
            if !self.used.contains_key(&candidate_key) {
                self.used.insert(key, n);
                self.used.insert(candidate_key, 1);
                return candidate;
            }
            n += 1;
        }
    }
}
