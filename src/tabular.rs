use core::fmt;
use std::{fs, path::Path};

use itertools::Itertools;

use crate::error::{ExperimentError, Result};


pub const QUOTE: char = '"';
pub const SEPARATOR: char = ';';
/// The exact byte sequence between two fields of a row.
pub const DELIMITER: &str = "\";\"";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

/// An ordered mapping from column name to value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets `column`, replacing the value in place if the column already exists.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_f64)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn from_row(header: &[String], row: Vec<String>) -> Self {
        Self {
            fields: header
                .iter()
                .cloned()
                .zip(row.into_iter().map(Value::Text))
                .collect(),
        }
    }
}

/// A header plus records that all follow it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    header: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            records: Vec::new(),
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a record whose columns must match the header exactly, in order.
    pub fn push(&mut self, record: Record) -> Result<()> {
        if !record.columns().eq(self.header.iter().map(String::as_str)) {
            return Err(ExperimentError::parse(
                self.records.len() + 2,
                format!(
                    "record columns [{}] do not match header [{}]",
                    record.columns().join(", "),
                    self.header.join(", ")
                ),
            ));
        }
        self.records.push(record);
        Ok(())
    }

    /// Appends positional values under the table header.
    pub fn push_row<V: Into<Value>>(
        &mut self,
        values: impl IntoIterator<Item = V>,
    ) -> Result<()> {
        let values = values.into_iter().map(Into::into).collect_vec();
        if values.len() != self.header.len() {
            return Err(ExperimentError::parse(
                self.records.len() + 2,
                format!(
                    "row has {} fields, header has {}",
                    values.len(),
                    self.header.len()
                ),
            ));
        }
        self.records.push(Record {
            fields: self.header.iter().cloned().zip(values).collect(),
        });
        Ok(())
    }

    pub fn column<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.records.iter().map(move |r| r.get(name))
    }

    pub fn to_text(&self) -> Result<String> {
        let mut out = encode_row(&self.header)?;
        out.push('\n');
        for record in &self.records {
            let fields = record.values().map(|v| v.to_string()).collect_vec();
            out.push_str(&encode_row(&fields)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(|l| l.strip_suffix('\r').unwrap_or(l));
        let header = match lines.next() {
            Some(line) => decode_line(line),
            None => return Err(ExperimentError::parse(1, "missing header row")),
        };
        let mut table = Table::new(header);
        let width = table.header.len();

        // Lines of the record currently being assembled, continuation lines included.
        let mut pending: Option<(usize, String)> = None;
        for (idx, line) in lines.enumerate() {
            let line_no = idx + 2;
            let starts_record = width == 1 || line.contains(DELIMITER);
            if starts_record {
                if let Some((start, buffer)) = pending.take() {
                    table.push_decoded(start, &buffer)?;
                }
                pending = Some((line_no, line.to_string()));
            } else {
                match pending.as_mut() {
                    Some((_, buffer)) => {
                        buffer.push('\n');
                        buffer.push_str(line);
                    }
                    None => {
                        return Err(ExperimentError::parse(
                            line_no,
                            "continuation line without a preceding record",
                        ))
                    }
                }
            }
        }
        if let Some((start, buffer)) = pending {
            table.push_decoded(start, &buffer)?;
        }
        Ok(table)
    }

    fn push_decoded(&mut self, line_no: usize, text: &str) -> Result<()> {
        let mut row = decode_line(text);
        if row.len() > self.header.len() {
            return Err(ExperimentError::parse(
                line_no,
                format!(
                    "row has {} fields, header has {}",
                    row.len(),
                    self.header.len()
                ),
            ));
        }
        row.resize(self.header.len(), String::new());
        self.records.push(Record::from_row(&self.header, row));
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Table::from_text(&text)
    }

    /// Writes the table next to its destination first, so a partially written file never
    /// shows up under the final name.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = path.with_extension("partial");
        fs::write(&partial, self.to_text()?)?;
        fs::rename(&partial, path)?;
        Ok(())
    }
}

pub fn encode_row<S: AsRef<str>>(fields: &[S]) -> Result<String> {
    let last = fields.len().saturating_sub(1);
    for (idx, field) in fields.iter().enumerate() {
        let field = field.as_ref();
        if field.contains(DELIMITER) {
            return Err(ExperimentError::Encoding {
                field: field.to_string(),
                reason: "contains the field delimiter".into(),
            });
        }
        // `x";` or `;"x` would fuse with a neighbouring delimiter on decode.
        if field.ends_with("\";") || field.starts_with(";\"") {
            return Err(ExperimentError::Encoding {
                field: field.to_string(),
                reason: "touches the field delimiter".into(),
            });
        }
        if (idx != last || fields.len() == 1) && field.contains('\n') {
            return Err(ExperimentError::Encoding {
                field: field.to_string(),
                reason: "line breaks are only allowed in the last column".into(),
            });
        }
    }
    Ok(format!(
        "{QUOTE}{}{QUOTE}",
        fields.iter().map(AsRef::as_ref).join(DELIMITER)
    ))
}

/// Strips the enclosing quotes and splits on the delimiter. A line without any delimiter
/// comes back as a single field.
pub fn decode_line(line: &str) -> Vec<String> {
    let inner = line.strip_prefix(QUOTE).unwrap_or(line);
    let inner = inner.strip_suffix(QUOTE).unwrap_or(inner);
    inner.split(DELIMITER).map(str::to_string).collect()
}

/// Turns a comma separated solver line into fields, the way summary lines are stored.
pub fn split_commas(line: &str) -> Vec<String> {
    line.trim().split(',').map(|f| f.trim().to_string()).collect()
}
