use fillgrid_engine::sheet::Sheet;

use crate::config::RenderConfig;

/// The marker rows around the template row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatBlock {
    pub start_row: usize,
    pub end_row: usize,
}

impl RepeatBlock {
    /// The row replicated once per item
    pub fn template_row(&self) -> usize {
        self.start_row + 1
    }
}

fn cell_contains(sheet: &Sheet, row: usize, col: usize, needle: &str) -> bool {
    sheet
        .get_value(row, col)
        .as_text()
        .is_some_and(|text| text.contains(needle))
}

/// Find the repeat block in one row-major scan.
///
/// The first start marker wins. End markers before it are ignored, and the
/// first end marker after it closes the block. Markers with no row between
/// them give `None`.
pub fn locate(sheet: &Sheet, config: &RenderConfig) -> Option<RepeatBlock> {
    let mut start_row = None;
    for (row, col) in sheet.positions_row_major() {
        if start_row.is_none() && cell_contains(sheet, row, col, &config.markers.start) {
            start_row = Some(row);
        }
        if let Some(start_row) = start_row {
            if cell_contains(sheet, row, col, &config.markers.end) {
                return (row > start_row + 1).then_some(RepeatBlock { start_row, end_row: row });
            }
        }
    }
    None
}

/// Row of the first end marker at or below `from_row`
pub fn find_end_marker(sheet: &Sheet, from_row: usize, config: &RenderConfig) -> Option<usize> {
    sheet
        .positions_row_major()
        .into_iter()
        .filter(|(row, _)| *row >= from_row)
        .find(|&(row, col)| cell_contains(sheet, row, col, &config.markers.end))
        .map(|(row, _)| row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fillgrid_engine::cell::CellValue;

    fn sheet_with(cells: &[(usize, usize, &str)]) -> Sheet {
        let mut sheet = Sheet::new("Sheet1");
        for (row, col, text) in cells {
            sheet.set_value(*row, *col, CellValue::Text(text.to_string())).unwrap();
        }
        sheet
    }

    #[test]
    fn test_locates_block() {
        let sheet = sheet_with(&[(7, 0, "{#items}"), (8, 0, "{item.title}"), (9, 0, "{/items}")]);
        let block = locate(&sheet, &RenderConfig::default()).unwrap();
        assert_eq!(block, RepeatBlock { start_row: 7, end_row: 9 });
        assert_eq!(block.template_row(), 8);
    }

    #[test]
    fn test_marker_may_sit_inside_longer_text() {
        let sheet = sheet_with(&[(2, 3, "rows {#items} here"), (4, 1, "end {/items}")]);
        let block = locate(&sheet, &RenderConfig::default()).unwrap();
        assert_eq!(block, RepeatBlock { start_row: 2, end_row: 4 });
    }

    #[test]
    fn test_missing_or_adjacent_markers() {
        let config = RenderConfig::default();
        assert_eq!(locate(&sheet_with(&[(1, 0, "{#items}")]), &config), None);
        assert_eq!(locate(&sheet_with(&[(1, 0, "{/items}")]), &config), None);
        // No template row between the markers
        assert_eq!(locate(&sheet_with(&[(1, 0, "{#items}"), (2, 0, "{/items}")]), &config), None);
        assert_eq!(locate(&sheet_with(&[(1, 0, "{#items}"), (1, 4, "{/items}")]), &config), None);
    }

    #[test]
    fn test_end_before_start_is_ignored_and_first_start_wins() {
        let sheet = sheet_with(&[
            (0, 0, "{/items}"),
            (3, 0, "{#items}"),
            (4, 0, "{#items}"),
            (6, 2, "{/items}"),
            (9, 0, "{/items}"),
        ]);
        let block = locate(&sheet, &RenderConfig::default()).unwrap();
        assert_eq!(block, RepeatBlock { start_row: 3, end_row: 6 });
    }

    #[test]
    fn test_find_end_marker() {
        let sheet = sheet_with(&[(0, 0, "{/items}"), (12, 1, "{/items}")]);
        let config = RenderConfig::default();
        assert_eq!(find_end_marker(&sheet, 1, &config), Some(12));
        assert_eq!(find_end_marker(&sheet, 0, &config), Some(0));
        assert_eq!(find_end_marker(&sheet, 13, &config), None);
    }
}
