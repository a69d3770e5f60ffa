//! Table tokenizer tests

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_simple_two_by_two() {
    let grid = tokenize_table("a & b \\\\\nc & d");
    assert_eq!(grid.rows.len(), 2);
    assert_eq!(grid.column_count(), 2);
    assert_eq!(grid.rows[0][0], TableCell::new("a"));
    assert_eq!(grid.rows[1][1], TableCell::new("d"));
}

#[test]
fn test_multicolumn_spanning_grid() {
    // Row 1: one multicolumn cell spanning 2 of 2 columns;
    // row 2: two plain cells. Grid column count must be 2.
    let grid = tokenize_table("\\multicolumn{2}{c}{header} \\\\\nleft & right");
    assert_eq!(grid.column_count(), 2);
    assert_eq!(grid.rows[0].len(), 1);
    assert_eq!(grid.rows[0][0].colspan, 2);
    assert_eq!(grid.rows[0][0].text, "header");
    assert_eq!(grid.rows[1].len(), 2);
    assert!(grid.rows[1].iter().all(|c| c.colspan == 1));
}

#[test]
fn test_irregular_rows_are_legal() {
    let grid = tokenize_table("a & b & c \\\\\nx");
    assert_eq!(grid.column_count(), 3);
    assert_eq!(grid.rows[1].len(), 1);
}

#[test]
fn test_separators_inside_braces_not_structural() {
    let grid = tokenize_table("{a & b} & c \\\\\n{p \\\\ q} & r");
    assert_eq!(grid.rows.len(), 2);
    assert_eq!(grid.rows[0].len(), 2);
    assert_eq!(grid.rows[0][0].text, "{a & b}");
    assert_eq!(grid.rows[1][0].text, "{p \\\\ q}");
}

#[test]
fn test_rule_commands_discarded() {
    let grid = tokenize_table("\\hline\na & b \\\\\n\\midrule\nc & d \\\\\n\\bottomrule");
    assert_eq!(grid.rows.len(), 2);
    assert_eq!(grid.rows[0][0].text, "a");
}

#[test]
fn test_cmidrule_with_trim_spec_and_range() {
    let grid = tokenize_table("a & b \\\\\n\\cmidrule(lr){1-2}\nc & d");
    assert_eq!(grid.rows.len(), 2);
    assert_eq!(grid.rows[1][0].text, "c");
}

#[test]
fn test_multirow_contributes_single_column() {
    let grid = tokenize_table("\\multirow{2}{*}{id} & x \\\\\n & y");
    assert_eq!(grid.column_count(), 2);
    assert_eq!(grid.rows[0][0].text, "id");
    assert_eq!(grid.rows[0][0].colspan, 1);
    // second row keeps its leading empty cell
    assert_eq!(grid.rows[1].len(), 2);
    assert_eq!(grid.rows[1][0].text, "");
}

#[test]
fn test_row_gap_argument_consumed() {
    let grid = tokenize_table("a & b \\\\[2pt]\nc & d");
    assert_eq!(grid.rows.len(), 2);
    assert_eq!(grid.rows[1][0].text, "c");
}

#[test]
fn test_escaped_separator_is_not_a_row_boundary() {
    // A quadruple backslash is an escaped backslash pair, not a row break
    let grid = tokenize_table("a \\\\\\\\ b & c");
    assert_eq!(grid.rows.len(), 1);
    assert_eq!(grid.rows[0].len(), 2);
}

#[test]
fn test_empty_interior() {
    let grid = tokenize_table("   \n  ");
    assert!(grid.is_empty());
    assert_eq!(grid.column_count(), 0);
}
