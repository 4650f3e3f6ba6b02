use serde::{Deserialize, Serialize};

/// A named grid of text cells.
///
/// Rows are stored in insertion order; row 1 is `rows[0]`. Rows may be
/// ragged, a missing trailing cell reads as the empty string.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// An ordered collection of sheets persisted as one unit.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Workbook {
    pub name: String,
    pub sheets: Vec<Sheet>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Sheet {
            name: name.to_string(),
            rows: Vec::new(),
        }
    }

    /// Number of populated rows, the equivalent of a sheet's "last row".
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Appends a row and returns its 1-based row number.
    pub fn append_row(&mut self, row: Vec<String>) -> usize {
        self.rows.push(row);
        self.rows.len()
    }

    /// Overwrites rows starting at `row` (1-based), growing the sheet as needed.
    pub fn set_values(&mut self, row: usize, values: Vec<Vec<String>>) {
        let start = row.saturating_sub(1);
        for (offset, values_row) in values.into_iter().enumerate() {
            let index = start + offset;
            while self.rows.len() <= index {
                self.rows.push(Vec::new());
            }
            self.rows[index] = values_row;
        }
    }

    /// Reads a cell by 1-based coordinates.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        if row == 0 || col == 0 {
            return None;
        }
        self.rows
            .get(row - 1)
            .and_then(|r| r.get(col - 1))
            .map(String::as_str)
    }

    /// Writes a cell by 1-based coordinates, padding a short row with empty cells.
    pub fn set_cell(&mut self, row: usize, col: usize, value: &str) -> bool {
        if row == 0 || col == 0 || row > self.rows.len() {
            return false;
        }
        let cells = &mut self.rows[row - 1];
        while cells.len() < col {
            cells.push(String::new());
        }
        cells[col - 1] = value.to_string();
        true
    }

    /// Iterates the rows below the header row together with their 1-based row numbers.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &Vec<String>)> {
        self.rows.iter().enumerate().skip(1).map(|(i, r)| (i + 1, r))
    }

    pub fn col_to_letter(col: usize) -> String {
        let mut col = col;
        let mut result = String::new();
        while col > 0 {
            col -= 1;
            result.push(((col % 26) as u8 + b'A') as char);
            col /= 26;
        }
        result.chars().rev().collect()
    }

    pub fn get_cell_name(row: usize, col: usize) -> String {
        format!("{}{}", Self::col_to_letter(col), row)
    }
}

impl Workbook {
    pub fn new(name: &str) -> Self {
        Workbook {
            name: name.to_string(),
            sheets: Vec::new(),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Returns the named sheet, inserting an empty one at `position` if absent.
    pub fn sheet_or_insert(&mut self, name: &str, position: usize) -> &mut Sheet {
        let index = match self.sheets.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                let at = position.min(self.sheets.len());
                self.sheets.insert(at, Sheet::new(name));
                at
            }
        };
        &mut self.sheets[index]
    }
}
