//! Parsers for ZFS and disk statistics command output.
//!
//! These are pure functions over captured text, designed to be easily testable with
//! string inputs. Tabular output is described by an ordered column table and converted
//! positionally; a row with the wrong number of columns is an error, never skipped.

use thiserror::Error;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }

    fn at_line(self, line: usize) -> Self {
        Self::new(format!("line {}: {}", line, self.message))
    }
}

/// Conversion applied to one positional column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Kept as text.
    Text,
    /// Parsed as a float.
    Number,
    /// Parsed as a float and truncated toward zero.
    Integer,
    /// Trailing `%` stripped, then parsed.
    Percent,
    /// Trailing `x` stripped, then parsed.
    Ratio,
    /// Parsed as kilobytes and scaled to bytes.
    Kilobytes,
    /// Present in the output, not used.
    Ignore,
}

/// One entry of a column table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub transform: Transform,
}

const fn column(name: &'static str, transform: Transform) -> Column {
    Column { name, transform }
}

/// A converted cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<'a> {
    Text(&'a str),
    Number(f64),
    Ignored,
}

/// Column layout of `zpool list -p`.
pub const ZPOOL_LIST_COLUMNS: &[Column] = &[
    column("name", Transform::Text),
    column("size", Transform::Number),
    column("alloc", Transform::Number),
    column("free", Transform::Number),
    column("ckpoint", Transform::Ignore),
    column("expandsz", Transform::Ignore),
    column("frag", Transform::Percent),
    column("cap", Transform::Percent),
    column("dedup", Transform::Ratio),
    column("health", Transform::Text),
    column("altroot", Transform::Ignore),
];

/// Column layout of `iostat -x -I`.
pub const IOSTAT_COLUMNS: &[Column] = &[
    column("device", Transform::Text),
    column("reads", Transform::Integer),
    column("writes", Transform::Integer),
    column("read_kb", Transform::Kilobytes),
    column("write_kb", Transform::Kilobytes),
    column("qlen", Transform::Integer),
    column("tsvc", Transform::Number),
    column("sb", Transform::Number),
];

fn parse_number(raw: &str, column: &Column) -> Result<f64, ParseError> {
    raw.parse::<f64>()
        .map_err(|_| ParseError::new(format!("invalid {} value {:?}", column.name, raw)))
}

/// Splits a whitespace-separated row and converts each cell according to `columns`.
pub fn split_row<'a>(line: &'a str, columns: &[Column]) -> Result<Vec<Field<'a>>, ParseError> {
    let cells: Vec<&str> = line.split_whitespace().collect();
    if cells.len() != columns.len() {
        return Err(ParseError::new(format!(
            "expected {} columns, got {}",
            columns.len(),
            cells.len()
        )));
    }

    cells
        .into_iter()
        .zip(columns)
        .map(|(cell, column)| {
            let field = match column.transform {
                Transform::Text => Field::Text(cell),
                Transform::Ignore => Field::Ignored,
                Transform::Number => Field::Number(parse_number(cell, column)?),
                Transform::Integer => Field::Number(parse_number(cell, column)?.trunc()),
                Transform::Percent => {
                    Field::Number(parse_number(cell.strip_suffix('%').unwrap_or(cell), column)?)
                }
                Transform::Ratio => {
                    Field::Number(parse_number(cell.strip_suffix('x').unwrap_or(cell), column)?)
                }
                Transform::Kilobytes => Field::Number(parse_number(cell, column)? * 1024.0),
            };
            Ok(field)
        })
        .collect()
}

/// Non-blank lines after `preamble` leading lines, numbered from 1.
fn data_lines(content: &str, preamble: usize) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .skip(preamble)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| (idx + 1, line))
}

fn layout_mismatch(what: &str, line: usize) -> ParseError {
    ParseError::new(format!("{} row does not match column layout", what)).at_line(line)
}

/// One pool from `zpool list -p`.
#[derive(Debug, Clone, PartialEq)]
pub struct ZpoolListRow {
    pub name: String,
    pub size: f64,
    pub alloc: f64,
    pub free: f64,
    pub frag: f64,
    pub cap: f64,
    pub dedup: f64,
    pub health: String,
}

impl ZpoolListRow {
    /// A pool is online only when its health is exactly `ONLINE`.
    pub fn is_online(&self) -> bool {
        self.health == "ONLINE"
    }
}

/// Parses `zpool list -p` output (one header line, then one row per pool).
pub fn parse_zpool_list(content: &str) -> Result<Vec<ZpoolListRow>, ParseError> {
    data_lines(content, 1)
        .map(|(lineno, line)| {
            let fields = split_row(line, ZPOOL_LIST_COLUMNS).map_err(|e| e.at_line(lineno))?;
            match fields.as_slice() {
                [
                    Field::Text(name),
                    Field::Number(size),
                    Field::Number(alloc),
                    Field::Number(free),
                    Field::Ignored,
                    Field::Ignored,
                    Field::Number(frag),
                    Field::Number(cap),
                    Field::Number(dedup),
                    Field::Text(health),
                    Field::Ignored,
                ] => Ok(ZpoolListRow {
                    name: name.to_string(),
                    size: *size,
                    alloc: *alloc,
                    free: *free,
                    frag: *frag,
                    cap: *cap,
                    dedup: *dedup,
                    health: health.to_string(),
                }),
                _ => Err(layout_mismatch("zpool list", lineno)),
            }
        })
        .collect()
}

/// One device from `iostat -x -I`.
#[derive(Debug, Clone, PartialEq)]
pub struct IostatRow {
    pub device: String,
    pub reads: f64,
    pub writes: f64,
    pub read_bytes: f64,
    pub write_bytes: f64,
    pub queue_length: f64,
    /// Cumulative duration of completed transactions, seconds.
    pub transaction_duration: f64,
    /// Cumulative duration of outstanding transactions, seconds.
    pub outstanding_duration: f64,
}

/// Parses `iostat -x -I` output.
///
/// The first two lines (banner and column header) are discarded.
pub fn parse_iostat(content: &str) -> Result<Vec<IostatRow>, ParseError> {
    data_lines(content, 2)
        .map(|(lineno, line)| {
            let fields = split_row(line, IOSTAT_COLUMNS).map_err(|e| e.at_line(lineno))?;
            match fields.as_slice() {
                [
                    Field::Text(device),
                    Field::Number(reads),
                    Field::Number(writes),
                    Field::Number(read_bytes),
                    Field::Number(write_bytes),
                    Field::Number(queue_length),
                    Field::Number(transaction_duration),
                    Field::Number(outstanding_duration),
                ] => Ok(IostatRow {
                    device: device.to_string(),
                    reads: *reads,
                    writes: *writes,
                    read_bytes: *read_bytes,
                    write_bytes: *write_bytes,
                    queue_length: *queue_length,
                    transaction_duration: *transaction_duration,
                    outstanding_duration: *outstanding_duration,
                }),
                _ => Err(layout_mismatch("iostat", lineno)),
            }
        })
        .collect()
}

/// One `key: value` line of `sysctl` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysctlEntry<'a> {
    /// Key with the namespace prefix removed.
    pub key: &'a str,
    /// Raw value, trimmed.
    pub value: &'a str,
}

/// Parses flat `sysctl` output, stripping `prefix` from every key that carries it.
///
/// Blank lines are skipped. A line without a `:` separator is an error.
pub fn parse_sysctl<'a>(content: &'a str, prefix: &str) -> Result<Vec<SysctlEntry<'a>>, ParseError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let (key, value) = line.split_once(':').ok_or_else(|| {
                ParseError::new(format!("missing ':' separator in {:?}", line)).at_line(idx + 1)
            })?;
            let key = key.trim();
            Ok(SysctlEntry {
                key: key.strip_prefix(prefix).unwrap_or(key),
                value: value.trim(),
            })
        })
        .collect()
}
