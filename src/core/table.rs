//! In-memory grid of text cells shared by every pipeline stage.

/// A row-major grid of text cells. An empty string is a blank cell.
///
/// Rows may be ragged while a table is being assembled; [`Table::pad`]
/// makes it rectangular.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table from rows.
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Builds a table from columns, padding short columns with blanks.
    pub fn from_columns(columns: Vec<Vec<String>>) -> Self {
        let height = columns.iter().map(Vec::len).max().unwrap_or(0);
        let mut rows = vec![Vec::with_capacity(columns.len()); height];
        for column in columns {
            let len = column.len();
            for (row, value) in rows.iter_mut().zip(column) {
                row.push(value);
            }
            for row in rows.iter_mut().skip(len) {
                row.push(String::new());
            }
        }
        Self { rows }
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text, blank when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Pads every row with blanks up to the table width.
    pub fn pad(&mut self) {
        let width = self.width();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
    }

    /// Header row (row 0) of a wide table.
    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<Vec<Vec<&str>>> for Table {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_columns_pads_short_columns() {
        let table = Table::from_columns(vec![
            vec!["Time".into(), "0".into(), "1".into()],
            vec!["A".into(), "5".into()],
        ]);
        assert_eq!(table.height(), 3);
        assert_eq!(table.width(), 2);
        assert_eq!(table.cell(2, 0), "1");
        assert_eq!(table.cell(2, 1), "");
    }

    #[test]
    fn test_cell_out_of_range_is_blank() {
        let table = Table::from(vec![vec!["a"]]);
        assert_eq!(table.cell(0, 0), "a");
        assert_eq!(table.cell(0, 9), "");
        assert_eq!(table.cell(9, 0), "");
    }

    #[test]
    fn test_pad_makes_rectangular() {
        let mut table = Table::from(vec![vec!["a", "b", "c"], vec!["d"]]);
        table.pad();
        assert!(table.rows.iter().all(|r| r.len() == 3));
    }
}
