//! Positional grid operations used by the reshape stage.
//!
//! All functions operate on [`Table`] in place or return a new table and
//! never fail: a table too narrow for an operation is left untouched and
//! the caller is told so through the return value.

use std::ops::Range;

use super::table::Table;

/// Swap rows and columns. Ragged input is padded with blanks first.
///
/// # Example
///
/// ```
/// use inspection_pipeline::core::{table::Table, transforms::transpose};
///
/// let wide = Table::from(vec![vec!["Time", "A"], vec!["0.0", "1.5"]]);
/// let tall = transpose(&wide);
/// assert_eq!(tall.rows[1], vec!["A".to_string(), "1.5".to_string()]);
/// ```
pub fn transpose(table: &Table) -> Table {
    let width = table.width();
    let mut rows: Vec<Vec<String>> = (0..width)
        .map(|_| Vec::with_capacity(table.height()))
        .collect();

    for source_row in &table.rows {
        for (col, out_row) in rows.iter_mut().enumerate() {
            out_row.push(source_row.get(col).cloned().unwrap_or_default());
        }
    }

    Table::new(rows)
}

/// Reorder columns to `front ++ tail ++ middle`.
///
/// `front` is `[0, front_end)`, `middle` is `[front_end, tail_start)` and
/// `tail` is everything from `tail_start`. Returns `false` (table unchanged)
/// when the table has no tail block.
pub fn relocate_blocks(table: &mut Table, front_end: usize, tail_start: usize) -> bool {
    debug_assert!(front_end <= tail_start);

    table.pad();
    if table.width() <= tail_start {
        return false;
    }

    for row in &mut table.rows {
        // front ++ middle ++ tail  ->  front ++ tail ++ middle
        let tail_len = row.len() - tail_start;
        row[front_end..].rotate_right(tail_len);
    }
    true
}

/// Move column 0 into column 1 and leave column 0 blank.
///
/// The previous column-1 value is dropped, so row width is unchanged.
/// Single-cell rows grow to two cells.
pub fn shift_identifier(table: &mut Table) {
    for row in &mut table.rows {
        let Some(first) = row.first_mut() else {
            continue;
        };
        let id = std::mem::take(first);
        match row.get_mut(1) {
            Some(second) => *second = id,
            None => row.push(id),
        }
    }
}

/// Blank every cell inside the rectangle. Returns the number of cells cleared.
pub fn clear_rect(table: &mut Table, rows: Range<usize>, cols: Range<usize>) -> usize {
    let mut cleared = 0;
    for row in table.rows.iter_mut().skip(rows.start).take(rows.len()) {
        let end = cols.end.min(row.len());
        for cell in row.iter_mut().take(end).skip(cols.start) {
            if !cell.is_empty() {
                cell.clear();
                cleared += 1;
            }
        }
    }
    cleared
}

/// Drop every column at or beyond `at`. Returns `false` if nothing was that wide.
pub fn truncate_columns(table: &mut Table, at: usize) -> bool {
    if table.width() <= at {
        return false;
    }
    for row in &mut table.rows {
        row.truncate(at);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_row(width: usize) -> Vec<String> {
        (0..width).map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_transpose_swaps_axes() {
        let table = Table::from(vec![
            vec!["Time", "A", "B"],
            vec!["0", "1", "2"],
            vec!["1", "3", "4"],
        ]);
        let t = transpose(&table);
        assert_eq!(t.height(), 3);
        assert_eq!(t.rows[0], vec!["Time", "0", "1"]);
        assert_eq!(t.rows[2], vec!["B", "2", "4"]);
    }

    #[test]
    fn test_transpose_pads_ragged_rows() {
        let table = Table::from(vec![vec!["a", "b"], vec!["c"]]);
        let t = transpose(&table);
        assert_eq!(t.rows[1], vec!["b", ""]);
    }

    #[test]
    fn test_relocate_blocks_order() {
        let mut table = Table::new(vec![numbered_row(8)]);
        assert!(relocate_blocks(&mut table, 2, 5));
        // front [0,1], tail [5,6,7], middle [2,3,4]
        assert_eq!(table.rows[0], vec!["0", "1", "5", "6", "7", "2", "3", "4"]);
    }

    #[test]
    fn test_relocate_blocks_is_permutation() {
        let mut table = Table::new(vec![numbered_row(120), numbered_row(120)]);
        assert!(relocate_blocks(&mut table, 24, 51));

        let mut seen: Vec<usize> = table.rows[0].iter().map(|c| c.parse().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..120).collect::<Vec<_>>());
        assert_eq!(table.rows[0][24], "51");
        assert_eq!(table.rows[0][24 + 69], "24");
    }

    #[test]
    fn test_relocate_blocks_narrow_table_is_noop() {
        let mut table = Table::new(vec![numbered_row(30)]);
        let before = table.clone();
        assert!(!relocate_blocks(&mut table, 24, 51));
        assert_eq!(table, before);
    }

    #[test]
    fn test_shift_identifier_keeps_width() {
        let mut table = Table::from(vec![vec!["a", "b", "c"], vec!["d"], vec![]]);
        shift_identifier(&mut table);
        assert_eq!(table.rows[0], vec!["", "a", "c"]);
        assert_eq!(table.rows[1], vec!["", "d"]);
        assert!(table.rows[2].is_empty());
    }

    #[test]
    fn test_clear_rect_bounds() {
        let mut table = Table::new(vec![numbered_row(6), numbered_row(6), numbered_row(6)]);
        let cleared = clear_rect(&mut table, 1..3, 2..4);
        assert_eq!(cleared, 4);
        assert_eq!(table.rows[0], numbered_row(6));
        assert_eq!(table.rows[1], vec!["0", "1", "", "", "4", "5"]);
        assert_eq!(table.rows[2], vec!["0", "1", "", "", "4", "5"]);
    }

    #[test]
    fn test_truncate_columns() {
        let mut table = Table::new(vec![numbered_row(10)]);
        assert!(truncate_columns(&mut table, 4));
        assert_eq!(table.width(), 4);
        assert!(!truncate_columns(&mut table, 4));
    }
}
