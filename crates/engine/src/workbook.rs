use crate::sheet::Sheet;

/// Normalize a sheet name for lookup: trimmed and case-insensitive
pub fn normalize_sheet_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A workbook containing multiple sheets, in file order
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    active_sheet: usize,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create a new workbook with one default sheet
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet::new("Sheet1")],
            active_sheet: 0,
        }
    }

    /// Create a workbook from sheets (import path). An empty list gets one blank sheet.
    pub fn from_sheets(mut sheets: Vec<Sheet>, active: usize) -> Self {
        if sheets.is_empty() {
            sheets.push(Sheet::new("Sheet1"));
        }
        let active_sheet = active.min(sheets.len() - 1);
        Self { sheets, active_sheet }
    }

    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    /// Set the active sheet by index
    pub fn set_active_sheet(&mut self, index: usize) -> bool {
        if index < self.sheets.len() {
            self.active_sheet = index;
            true
        } else {
            false
        }
    }

    pub fn active_sheet(&self) -> &Sheet {
        &self.sheets[self.active_sheet]
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Index of a sheet by name. Exact match wins, then case-insensitive.
    pub fn sheet_index_by_name(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.sheets.iter().position(|s| s.name == name) {
            return Some(idx);
        }
        let key = normalize_sheet_name(name);
        self.sheets
            .iter()
            .position(|s| normalize_sheet_name(&s.name) == key)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index_by_name(name).and_then(|i| self.sheets.get(i))
    }

    /// Get all sheets (for export)
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
}
