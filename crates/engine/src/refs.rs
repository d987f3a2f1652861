//! A1-notation helpers and row-reference rewriting for formula text.
//!
//! Rows and columns are 0-indexed everywhere in the engine; the 1-based A1
//! form only appears in text (formulas, addresses, log lines).

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Convert a 0-indexed column number to Excel column letters (0=A, 25=Z, 26=AA)
pub fn col_to_letters(mut col: usize) -> String {
    let mut result = String::new();
    loop {
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}

/// Convert Excel column letters to a 0-indexed column number
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some(col - 1)
}

/// Convert row/col to an Excel cell address (e.g. (0, 0) -> "A1")
pub fn cell_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col), row + 1)
}

/// Parse a cell reference like "B5" (or "$B$5") into (row, col) = (4, 1)
pub fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let r = r.trim();
    let mut col_part = String::new();
    let mut row_part = String::new();

    for ch in r.chars() {
        if ch == '$' {
            continue;
        }
        if ch.is_ascii_alphabetic() && row_part.is_empty() {
            col_part.push(ch);
        } else if ch.is_ascii_digit() {
            row_part.push(ch);
        } else {
            return None;
        }
    }

    let col = letters_to_col(&col_part)?;
    let row: usize = row_part.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col))
}

/// Parse a range reference like "A1:C3" into (start_row, start_col, end_row, end_col).
/// A single cell ("B2") yields a 1x1 range.
pub fn parse_range_ref(r: &str) -> Option<(usize, usize, usize, usize)> {
    match r.split_once(':') {
        Some((a, b)) => {
            let (sr, sc) = parse_cell_ref(a)?;
            let (er, ec) = parse_cell_ref(b)?;
            Some((sr.min(er), sc.min(ec), sr.max(er), sc.max(ec)))
        }
        None => {
            let (row, col) = parse_cell_ref(r)?;
            Some((row, col, row, col))
        }
    }
}

// Optional $ before col letters, col letters, optional $ before row, row digits.
// Examples: A1, $A$1, A$1, $A1, AA100
static CELL_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)(\d+)").expect("valid cell reference regex"));

/// One cell reference found inside formula text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormulaRef {
    pub row: usize,
    pub col: usize,
    pub row_absolute: bool,
    pub col_absolute: bool,
}

/// Rewrite every cell reference in `formula` through `map`.
///
/// `map` returns the new row for the reference, or `None` when the reference
/// no longer points anywhere (rendered as `#REF!`). Text inside string
/// literals is left alone, as are names that merely look like references
/// (function names such as `LOG10(`) and references into other sheets (`Other!A1`).
pub fn map_row_refs(formula: &str, mut map: impl FnMut(FormulaRef) -> Option<usize>) -> String {
    let mut out = String::with_capacity(formula.len());
    // Even segments are formula code, odd segments are string literals
    for (idx, segment) in formula.split('"').enumerate() {
        if idx > 0 {
            out.push('"');
        }
        if idx % 2 == 1 {
            out.push_str(segment);
            continue;
        }
        out.push_str(&rewrite_segment(segment, &mut map));
    }
    out
}

fn rewrite_segment(segment: &str, map: &mut impl FnMut(FormulaRef) -> Option<usize>) -> String {
    CELL_REF_RE
        .replace_all(segment, |caps: &Captures| {
            let whole = caps.get(0).expect("group 0 always matches");
            let before = segment[..whole.start()].chars().next_back();
            let after = segment[whole.end()..].chars().next();

            // Part of a longer identifier, a function call or a sheet name
            let glued_before =
                before.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '!');
            let glued_after =
                after.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '(' || c == '!');
            if glued_before || glued_after {
                return whole.as_str().to_string();
            }

            let col_absolute = &caps[1] == "$";
            let row_absolute = &caps[3] == "$";
            let (col, row) = match (letters_to_col(&caps[2]), caps[4].parse::<usize>()) {
                (Some(col), Ok(row)) if row > 0 => (col, row - 1),
                _ => return whole.as_str().to_string(),
            };

            let reference = FormulaRef {
                row,
                col,
                row_absolute,
                col_absolute,
            };
            match map(reference) {
                Some(new_row) => format!(
                    "{}{}{}{}",
                    if col_absolute { "$" } else { "" },
                    &caps[2],
                    if row_absolute { "$" } else { "" },
                    new_row + 1
                ),
                None => "#REF!".to_string(),
            }
        })
        .into_owned()
}

/// Move relative row references by `delta` rows (copy/fill semantics).
/// Absolute (`$`-anchored) rows stay put.
pub fn rebase_formula_rows(formula: &str, delta: isize) -> String {
    if delta == 0 {
        return formula.to_string();
    }
    map_row_refs(formula, |r| {
        if r.row_absolute {
            Some(r.row)
        } else {
            r.row.checked_add_signed(delta)
        }
    })
}

/// Adjust references after `count` rows were inserted at `at_row` (structural semantics:
/// every reference at or below the insertion point moves, anchored or not).
pub fn shift_refs_for_insert(formula: &str, at_row: usize, count: usize) -> String {
    map_row_refs(formula, |r| {
        if r.row >= at_row {
            Some(r.row + count)
        } else {
            Some(r.row)
        }
    })
}

/// Adjust references after rows `start_row..start_row + count` were deleted.
/// References into the deleted band become `#REF!`.
pub fn shift_refs_for_delete(formula: &str, start_row: usize, count: usize) -> String {
    let end = start_row + count;
    map_row_refs(formula, |r| {
        if r.row < start_row {
            Some(r.row)
        } else if r.row < end {
            None
        } else {
            Some(r.row - count)
        }
    })
}
