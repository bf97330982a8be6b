//! Fixed-layout text tables for engineering arrays
//!
//! Each value cell is 13 characters wide with the value right-aligned; a
//! missing response leaves its cell blank, a not-available value prints "N/A".
//! Every table ends with a blank line.

use std::collections::BTreeMap;

use crate::array::{EngineeringArray, NoxQuantity, Timeframe};

/// Width of the row label in three-column (timeframe) tables
pub const TIMEFRAME_LABEL_WIDTH: usize = 30;

/// Width of the row label in NOx binning tables
pub const NOX_LABEL_WIDTH: usize = 20;

const TIMEFRAME_HEADER: [&str; 2] = [
    "|                                |    Active   |    Stored   |             |",
    "|                                |   100 Hour  |   100 Hour  |   Lifetime  |",
];

/// Column order of timeframe tables
pub const TIMEFRAME_COLUMNS: [Timeframe; 3] = [Timeframe::Active100Hour, Timeframe::Stored100Hour, Timeframe::Lifetime];

fn separator(label_width: usize, columns: usize) -> String {
    let mut line = format!("|{}", "-".repeat(label_width + 2));
    for _ in 0..columns {
        line.push('+');
        line.push_str(&"-".repeat(13));
    }
    line.push('|');
    line
}

fn row(label: &str, label_width: usize, cells: &[String]) -> String {
    let mut line = format!("| {:<width$} |", label, width = label_width);
    for cell in cells {
        line.push_str(&format!(" {:>11} |", cell));
    }
    line
}

fn finish(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push_str("\n\n");
    text
}

/// Union of row keys across arrays, in key order, labelled by first sighting
fn row_labels<'a>(arrays: impl IntoIterator<Item = Option<&'a EngineeringArray>>) -> BTreeMap<u32, String> {
    let mut labels = BTreeMap::new();
    for array in arrays.into_iter().flatten() {
        for row in &array.rows {
            labels.entry(row.key).or_insert_with(|| row.label.clone());
        }
    }
    labels
}

fn cell(array: Option<&EngineeringArray>, key: u32) -> String {
    array
        .and_then(|a| a.row(key))
        .map(|row| row.display_value())
        .unwrap_or_default()
}

/// Active 100 Hour | Stored 100 Hour | Lifetime table
///
/// `arrays` is indexed in [`Timeframe::ALL`] order and laid out in
/// [`TIMEFRAME_COLUMNS`] order.
pub fn render_timeframe_table(arrays: [Option<&EngineeringArray>; 3]) -> String {
    let columns = TIMEFRAME_COLUMNS.map(|timeframe| arrays[timeframe.index()]);
    let mut lines = vec![
        separator(TIMEFRAME_LABEL_WIDTH, 3),
        TIMEFRAME_HEADER[0].to_string(),
        TIMEFRAME_HEADER[1].to_string(),
        separator(TIMEFRAME_LABEL_WIDTH, 3),
    ];
    for (key, label) in row_labels(columns) {
        let cells: Vec<String> = columns.iter().map(|a| cell(*a, key)).collect();
        lines.push(row(&label, TIMEFRAME_LABEL_WIDTH, &cells));
    }
    lines.push(separator(TIMEFRAME_LABEL_WIDTH, 3));
    finish(lines)
}

/// One NOx binning table: a row per bin, a column per quantity
///
/// `arrays` is indexed like `quantities`.
pub fn render_nox_table(
    timeframe: Timeframe,
    quantities: &[NoxQuantity],
    arrays: &[Option<&EngineeringArray>],
) -> String {
    let columns = quantities.len();
    let header = |line: usize| -> Vec<String> { quantities.iter().map(|q| q.header[line].to_string()).collect() };

    let mut lines = vec![
        separator(NOX_LABEL_WIDTH, columns),
        row(timeframe.name(), NOX_LABEL_WIDTH, &header(0)),
        row("", NOX_LABEL_WIDTH, &header(1)),
        separator(NOX_LABEL_WIDTH, columns),
    ];

    let labels = match quantities.first() {
        Some(first) => first.array.bin_labels(),
        None => &[],
    };
    for (bin, label) in labels.iter().enumerate() {
        let cells: Vec<String> = (0..columns)
            .map(|i| cell(arrays.get(i).copied().flatten(), bin as u32))
            .collect();
        lines.push(row(label, NOX_LABEL_WIDTH, &cells));
    }
    lines.push(separator(NOX_LABEL_WIDTH, columns));
    finish(lines)
}
