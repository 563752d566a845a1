use console::{pad_str, Alignment};
use humansize::{format_size_i, FormatSizeOptions, WINDOWS};
use std::fmt;

use crate::engine::Tally;

/// Count and size of one database at one point in time
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub count: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub source: Snapshot,
    pub dest_before: Snapshot,
    pub dest_after: Snapshot,
    pub tally: Tally,
}

fn signed(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl Report {
    pub fn dest_count_change(&self) -> i64 {
        signed(self.dest_after.count) - signed(self.dest_before.count)
    }

    pub fn dest_size_change(&self) -> i64 {
        signed(self.dest_after.size) - signed(self.dest_before.size)
    }

    fn rows(&self) -> Vec<[String; 4]> {
        let none = || "-".to_string();
        let count = |n: u64| format_count(n);
        let size = |n: u64| format_size(signed(n));
        vec![
            [
                "Source Count".into(),
                count(self.source.count),
                count(self.source.count),
                none(),
            ],
            [
                "Destination Count".into(),
                count(self.dest_before.count),
                count(self.dest_after.count),
                format_count(self.dest_count_change()),
            ],
            [
                "Source Size".into(),
                size(self.source.size),
                size(self.source.size),
                none(),
            ],
            [
                "Destination Size".into(),
                size(self.dest_before.size),
                size(self.dest_after.size),
                format_size(self.dest_size_change()),
            ],
            [
                "Records Processed".into(),
                none(),
                count(self.tally.processed()),
                none(),
            ],
            [
                "Records Added".into(),
                none(),
                count(self.tally.added),
                none(),
            ],
            [
                "Records Ignored".into(),
                none(),
                count(self.tally.ignored),
                none(),
            ],
        ]
    }
}

const COLUMN_GAP: usize = 2;

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = ["Metric", "Before", "After", "Change"].map(String::from);
        let rule = ["------", "------", "-----", "------"].map(String::from);
        let mut table = vec![header, rule];
        table.extend(self.rows());

        let mut widths = [0; 4];
        for row in &table {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(console::measure_text_width(cell));
            }
        }

        for row in &table {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                if i + 1 == row.len() {
                    line.push_str(cell);
                } else {
                    line.push_str(&pad_str(cell, widths[i] + COLUMN_GAP, Alignment::Left, None));
                }
            }
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/// Formats a count with English thousands separators, e.g. `1,234,567`.
pub fn format_count(n: impl Into<i128>) -> String {
    let n = n.into();
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats a byte count in 1024-based units with one decimal place, e.g.
/// `8.0 KB`. Values under 1 KB are whole bytes.
pub fn format_size(bytes: i64) -> String {
    if bytes.unsigned_abs() < 1024 {
        return format!("{} B", bytes);
    }
    let options = FormatSizeOptions::from(WINDOWS)
        .decimal_places(1)
        .decimal_zeroes(1);
    // humansize spells the kilo unit "kB"
    format_size_i(bytes, options).replace("kB", "KB")
}
