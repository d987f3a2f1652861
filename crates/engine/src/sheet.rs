use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellFormat, CellValue};
use super::refs::{cell_address, shift_refs_for_delete, shift_refs_for_insert};

/// A rectangular merged-cell region, anchored at its top-left cell.
/// Both corners are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergedRegion {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

impl MergedRegion {
    pub fn new(start_row: usize, start_col: usize, end_row: usize, end_col: usize) -> Self {
        Self {
            start: (start_row.min(end_row), start_col.min(end_col)),
            end: (start_row.max(end_row), start_col.max(end_col)),
        }
    }

    /// Single-row merge spanning `first_col..=last_col`
    pub fn horizontal(row: usize, first_col: usize, last_col: usize) -> Self {
        Self::new(row, first_col, row, last_col)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.start.0 && row <= self.end.0 && col >= self.start.1 && col <= self.end.1
    }

    pub fn overlaps(&self, other: &MergedRegion) -> bool {
        self.start.0 <= other.end.0
            && other.start.0 <= self.end.0
            && self.start.1 <= other.end.1
            && other.start.1 <= self.end.1
    }

    pub fn intersects_row(&self, row: usize) -> bool {
        row >= self.start.0 && row <= self.end.0
    }

    /// True if the region lives entirely inside `row`
    pub fn is_within_row(&self, row: usize) -> bool {
        self.start.0 == row && self.end.0 == row
    }

    /// A 1x1 region is a no-op merge
    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    pub fn anchor(&self) -> (usize, usize) {
        self.start
    }

    pub fn range_ref(&self) -> String {
        format!(
            "{}:{}",
            cell_address(self.start.0, self.start.1),
            cell_address(self.end.0, self.end.1)
        )
    }
}

impl fmt::Display for MergedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.range_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("merge {new} overlaps existing merge {existing}")]
    Overlap {
        new: MergedRegion,
        existing: MergedRegion,
    },
}

/// Why a single cell write was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellWriteError {
    /// The target is covered by a merge whose anchor is elsewhere
    #[error("cell {} is hidden by merge anchored at {}", a1(.row, .col), a1_pos(.anchor))]
    MergeHidden {
        row: usize,
        col: usize,
        anchor: (usize, usize),
    },
}

fn a1(row: &usize, col: &usize) -> String {
    cell_address(*row, *col)
}

fn a1_pos(pos: &(usize, usize)) -> String {
    cell_address(pos.0, pos.1)
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    cells: HashMap<(usize, usize), Cell>,
    merged_regions: Vec<MergedRegion>,
    /// Row index -> height in points
    row_heights: HashMap<usize, f64>,
    /// Column index -> width in Excel character units
    col_widths: HashMap<usize, f64>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    // ── Cell access ────────────────────────────────────────────────────

    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn get_value(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells.get(&(row, col)).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    /// Raw text of a cell (what the author typed, formulas included)
    pub fn get_raw(&self, row: usize, col: usize) -> String {
        self.get_value(row, col).raw_display()
    }

    pub fn get_format(&self, row: usize, col: usize) -> CellFormat {
        self.cells
            .get(&(row, col))
            .map(|c| c.format.clone())
            .unwrap_or_default()
    }

    /// Write a value. Refused when the cell is covered by a merge anchored elsewhere,
    /// unless the value is empty (clearing a hidden cell is always allowed).
    pub fn set_value(&mut self, row: usize, col: usize, value: CellValue) -> Result<(), CellWriteError> {
        if !value.is_empty() {
            if let Some(region) = self.merge_at(row, col) {
                if region.anchor() != (row, col) {
                    return Err(CellWriteError::MergeHidden {
                        row,
                        col,
                        anchor: region.anchor(),
                    });
                }
            }
        }
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.value = value;
        Ok(())
    }

    pub fn set_format(&mut self, row: usize, col: usize, format: CellFormat) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.format = format;
    }

    /// Edit a cell's format in place, creating the cell if needed
    pub fn update_format(&mut self, row: usize, col: usize, f: impl FnOnce(&mut CellFormat)) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        f(&mut cell.format);
    }

    /// Populated cell coordinates in row-major order
    pub fn positions_row_major(&self) -> Vec<(usize, usize)> {
        let mut positions: Vec<_> = self.cells.keys().copied().collect();
        positions.sort_unstable();
        positions
    }

    /// Populated cells of one row, left to right
    pub fn cells_in_row(&self, row: usize) -> Vec<(usize, &Cell)> {
        let mut cells: Vec<_> = self
            .cells
            .iter()
            .filter(|((r, _), _)| *r == row)
            .map(|((_, c), cell)| (*c, cell))
            .collect();
        cells.sort_unstable_by_key(|(c, _)| *c);
        cells
    }

    /// Highest populated row, if any
    pub fn max_row(&self) -> Option<usize> {
        let cells = self.cells.keys().map(|(r, _)| *r);
        let merges = self.merged_regions.iter().map(|m| m.end.0);
        cells.chain(merges).max()
    }

    // ── Layout ─────────────────────────────────────────────────────────

    pub fn row_height(&self, row: usize) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    pub fn set_row_height(&mut self, row: usize, height: f64) {
        self.row_heights.insert(row, height);
    }

    pub fn row_heights(&self) -> &HashMap<usize, f64> {
        &self.row_heights
    }

    pub fn set_col_width(&mut self, col: usize, width: f64) {
        self.col_widths.insert(col, width);
    }

    pub fn col_widths(&self) -> &HashMap<usize, f64> {
        &self.col_widths
    }

    // ── Merged regions ─────────────────────────────────────────────────

    pub fn merged_regions(&self) -> &[MergedRegion] {
        &self.merged_regions
    }

    /// Add a merge. Re-adding an identical region is a no-op; any other overlap is refused.
    pub fn add_merge(&mut self, region: MergedRegion) -> Result<(), MergeError> {
        if let Some(existing) = self.merged_regions.iter().find(|m| m.overlaps(&region)) {
            if *existing == region {
                return Ok(());
            }
            return Err(MergeError::Overlap {
                new: region,
                existing: *existing,
            });
        }
        if !region.is_single_cell() {
            self.merged_regions.push(region);
        }
        Ok(())
    }

    /// Drop a merge; the cells it covered keep their contents
    pub fn remove_merge(&mut self, region: &MergedRegion) -> bool {
        let before = self.merged_regions.len();
        self.merged_regions.retain(|m| m != region);
        self.merged_regions.len() != before
    }

    /// The merge covering (row, col), if any
    pub fn merge_at(&self, row: usize, col: usize) -> Option<&MergedRegion> {
        self.merged_regions.iter().find(|m| m.contains(row, col))
    }

    /// True for cells inside a merge that are not its anchor
    pub fn is_merge_hidden(&self, row: usize, col: usize) -> bool {
        self.merge_at(row, col)
            .map(|m| m.anchor() != (row, col))
            .unwrap_or(false)
    }

    /// Merges that touch `row` (contained or spanning through it)
    pub fn merges_touching_row(&self, row: usize) -> Vec<MergedRegion> {
        self.merged_regions
            .iter()
            .filter(|m| m.intersects_row(row))
            .copied()
            .collect()
    }

    // ── Structural edits ───────────────────────────────────────────────

    /// Insert rows at the specified position, shifting existing rows down.
    ///
    /// Cells, merges, row heights and formula references at or below `at_row`
    /// all move by `count`. A merge that straddles the insertion point grows.
    pub fn insert_rows(&mut self, at_row: usize, count: usize) {
        if count == 0 {
            return;
        }

        let old_cells = std::mem::take(&mut self.cells);
        for ((r, c), mut cell) in old_cells {
            if let CellValue::Formula { source } = &cell.value {
                cell.value = CellValue::Formula {
                    source: shift_refs_for_insert(source, at_row, count),
                };
            }
            let target = if r >= at_row { r + count } else { r };
            self.cells.insert((target, c), cell);
        }

        for region in &mut self.merged_regions {
            if region.start.0 >= at_row {
                region.start.0 += count;
                region.end.0 += count;
            } else if region.end.0 >= at_row {
                region.end.0 += count;
            }
        }

        self.row_heights = std::mem::take(&mut self.row_heights)
            .into_iter()
            .map(|(r, h)| if r >= at_row { (r + count, h) } else { (r, h) })
            .collect();
    }

    /// Delete rows at the specified position, shifting remaining rows up.
    ///
    /// Merges entirely inside the deleted band disappear; merges straddling it shrink.
    pub fn delete_rows(&mut self, start_row: usize, count: usize) {
        if count == 0 {
            return;
        }
        let end = start_row + count;

        let old_cells = std::mem::take(&mut self.cells);
        for ((r, c), mut cell) in old_cells {
            if r >= start_row && r < end {
                continue;
            }
            if let CellValue::Formula { source } = &cell.value {
                cell.value = CellValue::Formula {
                    source: shift_refs_for_delete(source, start_row, count),
                };
            }
            let target = if r >= end { r - count } else { r };
            self.cells.insert((target, c), cell);
        }

        let shift = |r: usize| -> usize {
            if r >= end {
                r - count
            } else if r >= start_row {
                start_row
            } else {
                r
            }
        };
        self.merged_regions = std::mem::take(&mut self.merged_regions)
            .into_iter()
            .filter_map(|m| {
                // Rows of the region that survive the deletion
                let kept_above = start_row.saturating_sub(m.start.0).min(m.end.0 + 1 - m.start.0);
                let kept_below = (m.end.0 + 1).saturating_sub(end.max(m.start.0));
                if kept_above + kept_below == 0 {
                    return None;
                }
                let new_start = shift(m.start.0);
                let new_end = new_start + kept_above + kept_below - 1;
                let region = MergedRegion::new(new_start, m.start.1, new_end, m.end.1);
                (!region.is_single_cell()).then_some(region)
            })
            .collect();

        self.row_heights = std::mem::take(&mut self.row_heights)
            .into_iter()
            .filter(|(r, _)| *r < start_row || *r >= end)
            .map(|(r, h)| if r >= end { (r - count, h) } else { (r, h) })
            .collect();
    }
}
