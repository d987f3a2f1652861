use serde::{Deserialize, Serialize};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Alignment {
    /// Excel default: numbers right, text left
    #[default]
    General,
    Left,
    Center,
    Right,
    CenterAcrossSelection,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerticalAlignment {
    Top,
    Middle,
    /// Excel default
    #[default]
    Bottom,
}

/// Text overflow behavior
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TextOverflow {
    #[default]
    Clip,
    Wrap,
}

/// Number format type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NumberFormat {
    #[default]
    General,
    Number { decimals: u8, thousands: bool },
    Percent { decimals: u8 },
    /// Any other Excel format code, kept verbatim
    Custom(String),
}

impl NumberFormat {
    /// Map an Excel format code onto the structured variants where possible.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        if code.is_empty() || code.eq_ignore_ascii_case("general") {
            return NumberFormat::General;
        }
        if let Some(pct) = code.strip_suffix('%') {
            if let Some(decimals) = plain_decimals(pct) {
                return NumberFormat::Percent { decimals };
            }
        }
        if let Some(rest) = code.strip_prefix("#,##") {
            if let Some(decimals) = plain_decimals(rest) {
                return NumberFormat::Number { decimals, thousands: true };
            }
        }
        if let Some(decimals) = plain_decimals(code) {
            return NumberFormat::Number { decimals, thousands: false };
        }
        NumberFormat::Custom(code.to_string())
    }

    /// Excel format code for this format (`None` for General).
    pub fn to_code(&self) -> Option<String> {
        match self {
            NumberFormat::General => None,
            NumberFormat::Number { decimals, thousands } => {
                let int_part = if *thousands { "#,##0" } else { "0" };
                if *decimals == 0 {
                    Some(int_part.to_string())
                } else {
                    Some(format!("{}.{}", int_part, "0".repeat(*decimals as usize)))
                }
            }
            NumberFormat::Percent { decimals } => {
                if *decimals == 0 {
                    Some("0%".to_string())
                } else {
                    Some(format!("0.{}%", "0".repeat(*decimals as usize)))
                }
            }
            NumberFormat::Custom(code) => Some(code.clone()),
        }
    }
}

/// Parse `0`, `0.00`, ... and return the number of decimals.
fn plain_decimals(s: &str) -> Option<u8> {
    let rest = s.strip_prefix('0')?;
    if rest.is_empty() {
        return Some(0);
    }
    let frac = rest.strip_prefix('.')?;
    if !frac.is_empty() && frac.len() <= 30 && frac.chars().all(|c| c == '0') {
        Some(frac.len() as u8)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellBorder {
    pub style: BorderStyle,
    /// RGBA, `None` = automatic
    pub color: Option<[u8; 4]>,
}

/// Cell formatting options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub alignment: Alignment,
    pub vertical_alignment: VerticalAlignment,
    pub text_overflow: TextOverflow,
    pub number_format: NumberFormat,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_color: Option<[u8; 4]>,
    pub background_color: Option<[u8; 4]>,
    pub border_top: CellBorder,
    pub border_right: CellBorder,
    pub border_bottom: CellBorder,
    pub border_left: CellBorder,
}

impl CellFormat {
    /// True if anything differs from the default format
    pub fn is_styled(&self) -> bool {
        *self != CellFormat::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Formula source including the leading `=`
    Formula { source: String },
}

impl CellValue {
    pub fn formula(source: impl Into<String>) -> Self {
        let source = source.into();
        if source.starts_with('=') {
            CellValue::Formula { source }
        } else {
            CellValue::Formula {
                source: format!("={}", source),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The text a template author typed into the cell
    pub fn raw_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Formula { source } => source.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// A `Number`, or text that reads as a plain decimal number (`1500000`, `-2.5`).
    pub fn is_numeric(&self) -> bool {
        match self {
            CellValue::Number(_) => true,
            CellValue::Text(s) => is_plain_number(s),
            _ => false,
        }
    }
}

/// Format a number the way a user would type it: integers without a decimal point.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Plain decimal literal: optional sign, digits, at most one dot. No exponent, no separators.
pub fn is_plain_number(s: &str) -> bool {
    let body = s.trim();
    let body = body.strip_prefix('-').unwrap_or(body);
    if body.is_empty() {
        return false;
    }
    let mut digits = 0;
    let mut dots = 0;
    for ch in body.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub format: CellFormat,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_alignment_default_is_bottom() {
        let format = CellFormat::default();
        assert_eq!(format.vertical_alignment, VerticalAlignment::Bottom);
    }

    #[test]
    fn test_cell_format_defaults() {
        let format = CellFormat::default();
        assert!(!format.bold);
        assert!(!format.italic);
        assert_eq!(format.alignment, Alignment::General);
        assert_eq!(format.text_overflow, TextOverflow::Clip);
        assert_eq!(format.number_format, NumberFormat::General);
        assert!(!format.is_styled());
    }

    #[test]
    fn test_formula_constructor_adds_equals() {
        assert_eq!(CellValue::formula("A1+B1").raw_display(), "=A1+B1");
        assert_eq!(CellValue::formula("=A1").raw_display(), "=A1");
    }

    #[test]
    fn test_raw_display_integers_have_no_decimal_point() {
        assert_eq!(CellValue::Number(3000000.0).raw_display(), "3000000");
        assert_eq!(CellValue::Number(1.5).raw_display(), "1.5");
        assert_eq!(CellValue::Bool(true).raw_display(), "TRUE");
    }

    #[test]
    fn test_is_numeric() {
        assert!(CellValue::Number(0.0).is_numeric());
        assert!(CellValue::Text("1500000".to_string()).is_numeric());
        assert!(CellValue::Text("-2.5".to_string()).is_numeric());
        assert!(!CellValue::Text("1,500".to_string()).is_numeric());
        assert!(!CellValue::Text("1e5".to_string()).is_numeric());
        assert!(!CellValue::Text("".to_string()).is_numeric());
        assert!(!CellValue::Text(".".to_string()).is_numeric());
        assert!(!CellValue::formula("=1+1").is_numeric());
    }

    #[test]
    fn test_number_format_codes() {
        assert_eq!(
            NumberFormat::from_code("#,##0"),
            NumberFormat::Number { decimals: 0, thousands: true }
        );
        assert_eq!(
            NumberFormat::from_code("#,##0.00"),
            NumberFormat::Number { decimals: 2, thousands: true }
        );
        assert_eq!(
            NumberFormat::from_code("0.0"),
            NumberFormat::Number { decimals: 1, thousands: false }
        );
        assert_eq!(NumberFormat::from_code("0%"), NumberFormat::Percent { decimals: 0 });
        assert_eq!(NumberFormat::from_code("General"), NumberFormat::General);
        assert_eq!(
            NumberFormat::from_code("yyyy-mm-dd"),
            NumberFormat::Custom("yyyy-mm-dd".to_string())
        );

        assert_eq!(
            NumberFormat::Number { decimals: 0, thousands: true }.to_code().as_deref(),
            Some("#,##0")
        );
        assert_eq!(NumberFormat::Percent { decimals: 2 }.to_code().as_deref(), Some("0.00%"));
        assert_eq!(NumberFormat::General.to_code(), None);
    }
}
