//! Repeat-block expansion: one copy of the template row per item.

use fillgrid_engine::cell::{Cell, CellValue, TextOverflow};
use fillgrid_engine::refs::{cell_address, rebase_formula_rows, shift_refs_for_insert};
use fillgrid_engine::sheet::{CellWriteError, MergedRegion, Sheet};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::placeholder::substitute_item;

/// Rows that hold item data after expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRows {
    pub first: usize,
    pub count: usize,
}

impl DataRows {
    /// Last data row, if there is one
    pub fn last(&self) -> Option<usize> {
        (self.count > 0).then(|| self.first + self.count - 1)
    }
}

/// Template row captured before any rows move
#[derive(Debug, Clone, Default)]
pub struct RowSnapshot {
    /// (col, cell) for every populated column
    pub cells: Vec<(usize, Cell)>,
    /// Horizontal merges contained in the row, as (first_col, last_col)
    pub merges: Vec<(usize, usize)>,
    pub height: Option<f64>,
}

/// Capture the template row. Only merges contained in the row are kept;
/// merges that reach into other rows cannot be replicated per item.
pub fn snapshot_row(sheet: &Sheet, row: usize) -> RowSnapshot {
    let cells = sheet
        .cells_in_row(row)
        .into_iter()
        .map(|(col, cell)| (col, cell.clone()))
        .collect();

    let merges = sheet
        .merges_touching_row(row)
        .into_iter()
        .filter(|region| region.is_within_row(row))
        .map(|region| (region.start.1, region.end.1))
        .collect();

    RowSnapshot {
        cells,
        merges,
        height: sheet.row_height(row),
    }
}

/// Write `value` at (row, col). When the target is hidden under a merge the
/// value goes to the merge anchor instead. Returns where it landed.
pub fn write_with_fallback(sheet: &mut Sheet, row: usize, col: usize, value: CellValue) -> (usize, usize) {
    match sheet.set_value(row, col, value.clone()) {
        Ok(()) => (row, col),
        Err(CellWriteError::MergeHidden { anchor, .. }) => {
            warn!(
                cell = %cell_address(row, col),
                anchor = %cell_address(anchor.0, anchor.1),
                "cell hidden by merge, writing to anchor"
            );
            match sheet.set_value(anchor.0, anchor.1, value) {
                Ok(()) => anchor,
                Err(e) => {
                    warn!(error = %e, "merge anchor rejected write, value dropped");
                    (row, col)
                }
            }
        }
    }
}

/// Remove merges that cross the template row into a neighbouring row
fn drop_vertical_merges(sheet: &mut Sheet, row: usize) {
    for region in sheet.merges_touching_row(row) {
        if !region.is_within_row(row) && sheet.remove_merge(&region) {
            warn!(merge = %region, row = row + 1, "vertical merge on template row removed");
        }
    }
}

/// Replicate the template row once per item, substituting item tokens.
///
/// With more than one item, `count - 1` rows are inserted directly below the
/// template row first, which shifts every later cell, merge, row height and
/// formula reference. With zero items nothing is written; the caller removes
/// the template row.
pub fn expand(sheet: &mut Sheet, template_row: usize, items: &[Value], config: &RenderConfig) -> DataRows {
    let count = items.len();
    let rows = DataRows {
        first: template_row,
        count,
    };
    if count == 0 {
        debug!(template_row = template_row + 1, "no items, nothing to expand");
        return rows;
    }

    let snapshot = snapshot_row(sheet, template_row);
    drop_vertical_merges(sheet, template_row);
    if count > 1 {
        sheet.insert_rows(template_row + 1, count - 1);
    }

    let thousands = config.thousands_format();
    for (i, item) in items.iter().enumerate() {
        let row = template_row + i;

        for &(first_col, last_col) in &snapshot.merges {
            let region = MergedRegion::horizontal(row, first_col, last_col);
            if let Err(e) = sheet.add_merge(region) {
                warn!(error = %e, "skipping template merge");
            }
        }

        for (col, template) in &snapshot.cells {
            let mut format = template.format.clone();
            let value = match &template.value {
                CellValue::Text(text) => {
                    let text = substitute_item(text, item, config);
                    if text.contains('\n') {
                        format.text_overflow = TextOverflow::Wrap;
                    }
                    if text.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(text.into_owned())
                    }
                }
                CellValue::Formula { source } => {
                    let source = substitute_item(source, item, config);
                    let source = if count > 1 {
                        shift_refs_for_insert(&source, template_row + 1, count - 1)
                    } else {
                        source.into_owned()
                    };
                    CellValue::Formula {
                        source: rebase_formula_rows(&source, i as isize),
                    }
                }
                other => other.clone(),
            };

            let numeric = value.is_numeric();
            if numeric {
                format.number_format = thousands.clone();
            }
            let (r, c) = write_with_fallback(sheet, row, *col, value);
            sheet.set_format(row, *col, format);
            if numeric && (r, c) != (row, *col) {
                sheet.update_format(r, c, |f| f.number_format = thousands.clone());
            }
        }

        if let Some(height) = snapshot.height {
            sheet.set_row_height(row, height);
        }
    }

    debug!(
        template_row = template_row + 1,
        count,
        merges_per_row = snapshot.merges.len(),
        "expanded repeat block"
    );
    rows
}
