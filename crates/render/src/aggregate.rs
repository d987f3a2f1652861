//! Total cell synthesis after the repeat block is expanded.

use fillgrid_engine::cell::CellValue;
use fillgrid_engine::refs::col_to_letters;
use fillgrid_engine::sheet::Sheet;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::expander::{write_with_fallback, DataRows};
use crate::payload::value_as_f64;

/// Cells whose trimmed text is exactly the aggregate token, row-major
pub fn find_aggregate_cells(sheet: &Sheet, config: &RenderConfig) -> Vec<(usize, usize)> {
    let token = config.aggregate.token.trim();
    sheet
        .positions_row_major()
        .into_iter()
        .filter(|&(row, col)| sheet.get_value(row, col).as_text().is_some_and(|t| t.trim() == token))
        .collect()
}

/// First column of the first data row holding a positive number
pub fn detect_amount_column(sheet: &Sheet, data_rows: DataRows) -> Option<usize> {
    if data_rows.count == 0 {
        return None;
    }
    sheet
        .cells_in_row(data_rows.first)
        .into_iter()
        .find(|(_, cell)| cell.value.as_number().is_some_and(|n| n > 0.0))
        .map(|(col, _)| col)
}

/// Σ quantity × price over all items
pub fn literal_total(items: &[Value], config: &RenderConfig) -> f64 {
    let field = |item: &Value, name: &str, index: usize| -> f64 {
        match item.get(name) {
            None | Some(Value::Null) => 0.0,
            Some(value) => value_as_f64(value).unwrap_or_else(|| {
                warn!(item = index, field = name, %value, "non-numeric value counted as 0");
                0.0
            }),
        }
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            field(item, &config.aggregate.quantity_field, i) * field(item, &config.aggregate.price_field, i)
        })
        .sum()
}

/// Replace every aggregate cell with a SUM over the amount column, or with a
/// literal total when no amount column is found. Returns the cells written.
pub fn synthesize(sheet: &mut Sheet, data_rows: DataRows, items: &[Value], config: &RenderConfig) -> Vec<(usize, usize)> {
    let targets = find_aggregate_cells(sheet, config);
    if targets.is_empty() {
        return targets;
    }

    let value = match (detect_amount_column(sheet, data_rows), data_rows.last()) {
        (Some(col), Some(last)) => {
            let letters = col_to_letters(col);
            CellValue::formula(format!(
                "=SUM({letters}{}:{letters}{})",
                data_rows.first + 1,
                last + 1
            ))
        }
        _ => CellValue::Number(literal_total(items, config)),
    };
    debug!(cells = targets.len(), value = %value.raw_display(), "writing aggregate");

    let thousands = config.thousands_format();
    targets
        .into_iter()
        .map(|(row, col)| {
            let at = write_with_fallback(sheet, row, col, value.clone());
            sheet.update_format(at.0, at.1, |f| {
                f.bold = true;
                f.number_format = thousands.clone();
            });
            at
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fillgrid_engine::cell::NumberFormat;
    use serde_json::json;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_find_aggregate_cells() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(9, 5, text(" {TOTAL_SUM} ")).unwrap();
        sheet.set_value(2, 1, text("{TOTAL_SUM}")).unwrap();
        sheet.set_value(3, 1, text("Total: {TOTAL_SUM}")).unwrap();
        assert_eq!(find_aggregate_cells(&sheet, &RenderConfig::default()), vec![(2, 1), (9, 5)]);
    }

    #[test]
    fn test_detect_amount_column() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(4, 0, text("Design")).unwrap();
        sheet.set_value(4, 2, text("3")).unwrap();
        sheet.set_value(4, 3, CellValue::Number(0.0)).unwrap();
        sheet.set_value(4, 5, CellValue::Number(-10.0)).unwrap();
        sheet.set_value(4, 7, CellValue::Number(1500.0)).unwrap();
        sheet.set_value(4, 9, CellValue::Number(99.0)).unwrap();
        assert_eq!(detect_amount_column(&sheet, DataRows { first: 4, count: 2 }), Some(7));
        assert_eq!(detect_amount_column(&sheet, DataRows { first: 5, count: 1 }), None);
        assert_eq!(detect_amount_column(&sheet, DataRows { first: 4, count: 0 }), None);
    }

    #[test]
    fn test_literal_total() {
        let config = RenderConfig::default();
        let items = vec![
            json!({"qty": 1, "unit_price": 3000000}),
            json!({"qty": "2", "unit_price": "1,500,000"}),
            json!({"qty": 5}),
            json!({"qty": "many", "unit_price": 10}),
        ];
        assert_eq!(literal_total(&items, &config), 6000000.0);
        assert_eq!(literal_total(&[], &config), 0.0);
    }

    #[test]
    fn test_synthesize_sum_formula() {
        let mut sheet = Sheet::new("Sheet1");
        for row in 3..6 {
            sheet.set_value(row, 0, text("item")).unwrap();
            sheet.set_value(row, 6, CellValue::Number(100.0)).unwrap();
        }
        sheet.set_value(7, 6, text("{TOTAL_SUM}")).unwrap();
        sheet.set_value(8, 2, text("{TOTAL_SUM}")).unwrap();

        let written = synthesize(&mut sheet, DataRows { first: 3, count: 3 }, &[], &RenderConfig::default());
        assert_eq!(written, vec![(7, 6), (8, 2)]);
        for (row, col) in written {
            assert_eq!(sheet.get_raw(row, col), "=SUM(G4:G6)");
            let format = sheet.get_format(row, col);
            assert!(format.bold);
            assert_eq!(format.number_format, NumberFormat::Number { decimals: 0, thousands: true });
        }
    }

    #[test]
    fn test_synthesize_literal_fallback() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(3, 0, text("Design")).unwrap();
        sheet.set_value(3, 4, text("1")).unwrap();
        sheet.set_value(5, 6, text("{TOTAL_SUM}")).unwrap();
        let items = vec![json!({"qty": 1, "unit_price": 3000000}), json!({"qty": 2, "unit_price": 2750000})];

        synthesize(&mut sheet, DataRows { first: 3, count: 2 }, &items, &RenderConfig::default());
        assert_eq!(sheet.get_value(5, 6), &CellValue::Number(8500000.0));
        assert!(sheet.get_format(5, 6).bold);
    }

    #[test]
    fn test_synthesize_without_data_rows_writes_zero() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(2, 6, CellValue::Number(7.0)).unwrap();
        sheet.set_value(4, 6, text("{TOTAL_SUM}")).unwrap();
        synthesize(&mut sheet, DataRows { first: 2, count: 0 }, &[], &RenderConfig::default());
        assert_eq!(sheet.get_value(4, 6), &CellValue::Number(0.0));
    }

    #[test]
    fn test_no_aggregate_cell_is_a_no_op() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, text("Total")).unwrap();
        assert!(synthesize(&mut sheet, DataRows { first: 0, count: 1 }, &[], &RenderConfig::default()).is_empty());
        assert_eq!(sheet.get_raw(0, 0), "Total");
    }
}
