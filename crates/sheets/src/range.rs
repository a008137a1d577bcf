//! # Cell Ranges
//!
//! Zero-based rectangles addressed in A1 notation. Either end may be open:
//! `A1:B3` (bounded), `A1:B` (open rows), `A1:3` (open columns) and `A1:*` (open both).

use gapi_helper::{GapiError, GapiResult};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static A1_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)([1-9][0-9]*):(?:([A-Za-z]+)([1-9][0-9]*)?|([1-9][0-9]*)|(\*))$")
        .expect("A1 range pattern is valid")
});

/// A rectangle of cells. Indexes are zero-based and ends are inclusive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_col: usize,
    pub start_row: usize,
    pub end_col: Option<usize>,
    pub end_row: Option<usize>,
}

impl Range {
    pub fn new(
        start_col: usize,
        start_row: usize,
        end_col: Option<usize>,
        end_row: Option<usize>,
    ) -> Self {
        Self {
            start_col,
            start_row,
            end_col,
            end_row,
        }
    }

    /// Number of columns, when the range is bounded horizontally.
    pub fn width(&self) -> Option<usize> {
        self.end_col.map(|end| (end + 1).saturating_sub(self.start_col))
    }

    /// Number of rows, when the range is bounded vertically.
    pub fn height(&self) -> Option<usize> {
        self.end_row.map(|end| (end + 1).saturating_sub(self.start_row))
    }

    /// Whether two ranges have compatible shapes.
    ///
    /// Dimensions only conflict when both sides are bounded and differ.
    pub fn matches(&self, other: &Range) -> bool {
        let conflicts =
            |a: Option<usize>, b: Option<usize>| matches!((a, b), (Some(a), Some(b)) if a != b);
        !conflicts(self.width(), other.width()) && !conflicts(self.height(), other.height())
    }

    /// Whether `row` (zero-based) falls within the vertical bounds of the range.
    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.start_row && self.end_row.map_or(true, |end| row <= end)
    }

    /// Parses A1 notation such as `A1:R`.
    pub fn from_a1(range: &str) -> GapiResult<Self> {
        let parse_error = || GapiError::Addressing(format!("Could not parse range {range}"));
        let caps = A1_RANGE.captures(range).ok_or_else(parse_error)?;

        let start_col = col2num(&caps[1]).ok_or_else(parse_error)? - 1;
        let start_row = row_index(&caps[2]).ok_or_else(parse_error)?;

        let (end_col, end_row) = if let Some(col) = caps.get(3) {
            let end_col = col2num(col.as_str()).ok_or_else(parse_error)? - 1;
            let end_row = match caps.get(4) {
                Some(row) => Some(row_index(row.as_str()).ok_or_else(parse_error)?),
                None => None,
            };
            (Some(end_col), end_row)
        } else if let Some(row) = caps.get(5) {
            (None, Some(row_index(row.as_str()).ok_or_else(parse_error)?))
        } else {
            (None, None)
        };

        Ok(Self::new(start_col, start_row, end_col, end_row))
    }

    /// Renders the range in A1 notation.
    pub fn to_a1(&self) -> String {
        let start = format!("{}{}", num2col(self.start_col + 1), self.start_row + 1);
        let end = match (self.end_col, self.end_row) {
            (Some(col), Some(row)) => format!("{}{}", num2col(col + 1), row + 1),
            (Some(col), None) => num2col(col + 1),
            (None, Some(row)) => (row + 1).to_string(),
            (None, None) => "*".to_string(),
        };
        format!("{start}:{end}")
    }
}

fn row_index(row: &str) -> Option<usize> {
    row.parse::<usize>().ok()?.checked_sub(1)
}

fn fmt_bound(bound: Option<usize>) -> String {
    bound.map_or_else(|| "None".to_string(), |b| b.to_string())
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})/{}",
            self.start_col,
            self.start_row,
            fmt_bound(self.end_col),
            fmt_bound(self.end_row),
            self.to_a1()
        )
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Range {
    type Err = GapiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Range::from_a1(s)
    }
}

/// Converts a one-based column number to its letters (`1` → `A`, `27` → `AA`).
pub fn num2col(mut n: usize) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Converts column letters to a one-based column number (`A` → `1`, `AA` → `27`).
pub fn col2num(col: &str) -> Option<usize> {
    if col.is_empty() {
        return None;
    }
    col.chars().try_fold(0usize, |acc, c| {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        acc.checked_mul(26)?.checked_add(c as usize - 'A' as usize + 1)
    })
}

/// Prefixes a range with `'<tab>'!` unless it is already qualified.
pub fn qualify(tab_name: &str, range: &str) -> String {
    if range.contains('!') {
        range.to_string()
    } else {
        format!("'{}'!{}", tab_name.replace('\'', "\\'"), range)
    }
}
