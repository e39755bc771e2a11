//! Table serialization: RFC 4180 CSV and JSON lines.
//!
//! CSV output uses CRLF record terminators and a header row. Fields are
//! quoted only when they contain a comma, a double quote, CR or LF (or
//! are empty text, to keep them distinct from null). Null is an empty
//! field. Reading accepts CRLF or bare LF and infers each field's type
//! (empty → null, then integer, float, boolean, text); quoted fields are
//! always text.
//!
//! JSON lines writes one object per row with keys in column order and
//! explicit `null`s.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use thiserror::Error;

use crate::table::Table;
use crate::value::Value;

/// Errors reading or writing tables.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON encoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Input is not well-formed CSV.
    #[error("malformed CSV at record {record}: {reason}")]
    Malformed {
        /// 1-based record number (the header is record 1).
        record: usize,
        /// What went wrong.
        reason: String,
    },
    /// The requested encoding is not available.
    #[error("unsupported output format '{format}'")]
    Unsupported {
        /// The requested name.
        format: String,
    },
}

/// Output encoding selectable from the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// RFC 4180 comma-separated values.
    #[default]
    Csv,
    /// One JSON object per line.
    Jsonl,
}

impl OutputFormat {
    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
        }
    }

    /// Encode `table` in this format.
    pub fn write(self, table: &Table, w: &mut dyn Write) -> Result<(), CodecError> {
        match self {
            Self::Csv => write_csv(table, w),
            Self::Jsonl => write_jsonl(table, w),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "jsonl" | "json-lines" | "ndjson" => Ok(Self::Jsonl),
            other => Err(CodecError::Unsupported {
                format: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ── CSV writing ─────────────────────────────────────────────────

fn needs_quotes(s: &str) -> bool {
    s.is_empty() || s.contains([',', '"', '\r', '\n'])
}

fn write_field(w: &mut dyn Write, s: &str, force_check: bool) -> Result<(), CodecError> {
    if force_check && needs_quotes(s) {
        w.write_all(b"\"")?;
        w.write_all(s.replace('"', "\"\"").as_bytes())?;
        w.write_all(b"\"")?;
    } else {
        w.write_all(s.as_bytes())?;
    }
    Ok(())
}

fn write_value(w: &mut dyn Write, v: &Value) -> Result<(), CodecError> {
    match v {
        Value::Null => Ok(()),
        Value::Text(s) => write_field(w, s, true),
        other => write_field(w, &other.to_string(), false),
    }
}

/// Write `table` as RFC 4180 CSV with a header row.
pub fn write_csv(table: &Table, w: &mut dyn Write) -> Result<(), CodecError> {
    for (i, c) in table.columns().iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        write_field(w, c, true)?;
    }
    w.write_all(b"\r\n")?;
    for row in table.rows() {
        for (i, v) in row.iter().enumerate() {
            if i > 0 {
                w.write_all(b",")?;
            }
            write_value(w, v)?;
        }
        w.write_all(b"\r\n")?;
    }
    Ok(())
}

// ── CSV reading ─────────────────────────────────────────────────

struct Field {
    text: String,
    quoted: bool,
}

fn infer(field: Field) -> Value {
    if field.quoted {
        return Value::Text(field.text);
    }
    let s = field.text.as_str();
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(field.text),
    }
}

/// Split CSV text into records of raw fields.
fn parse_records(input: &str) -> Result<Vec<Vec<Field>>, CodecError> {
    let mut records = Vec::new();
    let mut record: Vec<Field> = Vec::new();
    let mut field = Field {
        text: String::new(),
        quoted: false,
    };
    let mut in_quotes = false;
    let mut after_quote = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.text.push('"');
                } else {
                    in_quotes = false;
                    after_quote = true;
                }
            } else {
                field.text.push(ch);
            }
            continue;
        }
        match ch {
            ',' => {
                record.push(std::mem::replace(
                    &mut field,
                    Field {
                        text: String::new(),
                        quoted: false,
                    },
                ));
                after_quote = false;
            }
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::replace(
                    &mut field,
                    Field {
                        text: String::new(),
                        quoted: false,
                    },
                ));
                records.push(std::mem::take(&mut record));
                after_quote = false;
            }
            '"' if field.text.is_empty() && !field.quoted => {
                in_quotes = true;
                field.quoted = true;
            }
            _ if after_quote => {
                return Err(CodecError::Malformed {
                    record: records.len() + 1,
                    reason: format!("unexpected '{ch}' after closing quote"),
                });
            }
            _ => field.text.push(ch),
        }
    }
    if in_quotes {
        return Err(CodecError::Malformed {
            record: records.len() + 1,
            reason: "unterminated quoted field".into(),
        });
    }
    if !record.is_empty() || !field.text.is_empty() || field.quoted {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// Read CSV written by [`write_csv`] (or any RFC 4180 producer).
///
/// # Errors
///
/// [`CodecError::Malformed`] on a missing header, an unterminated quote
/// or a record whose width differs from the header.
pub fn read_csv(r: &mut dyn Read) -> Result<Table, CodecError> {
    let mut input = String::new();
    r.read_to_string(&mut input)?;
    let mut records = parse_records(&input)?.into_iter();
    let header = records.next().ok_or_else(|| CodecError::Malformed {
        record: 1,
        reason: "missing header row".into(),
    })?;
    let mut table = Table::new(header.into_iter().map(|f| f.text));
    for (i, fields) in records.enumerate() {
        let row: Vec<Value> = fields.into_iter().map(infer).collect();
        table.push_row(row).map_err(|e| CodecError::Malformed {
            record: i + 2,
            reason: e.to_string(),
        })?;
    }
    Ok(table)
}

// ── JSON lines ──────────────────────────────────────────────────

/// Write one JSON object per row, keys in column order, nulls explicit.
pub fn write_jsonl(table: &Table, w: &mut dyn Write) -> Result<(), CodecError> {
    for row in table.rows() {
        let mut obj = serde_json::Map::with_capacity(row.len());
        for (c, v) in table.columns().iter().zip(row) {
            obj.insert(c.clone(), serde_json::to_value(v)?);
        }
        serde_json::to_writer(&mut *w, &serde_json::Value::Object(obj))?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(["tick", "reporter", "value"]);
        t.push_row(vec![0i64.into(), "gini".into(), 0.5.into()]).unwrap();
        t.push_row(vec![1i64.into(), "a,b".into(), Value::Null]).unwrap();
        t.push_row(vec![2i64.into(), "say \"hi\"\r\nbye".into(), true.into()])
            .unwrap();
        t
    }

    fn csv_string(t: &Table) -> String {
        let mut buf = Vec::new();
        write_csv(t, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn csv_uses_crlf_and_quotes_only_when_needed() {
        let s = csv_string(&sample());
        assert_eq!(
            s,
            "tick,reporter,value\r\n\
             0,gini,0.5\r\n\
             1,\"a,b\",\r\n\
             2,\"say \"\"hi\"\"\r\nbye\",true\r\n"
        );
    }

    #[test]
    fn csv_round_trip_preserves_values() {
        let t = sample();
        let back = read_csv(&mut csv_string(&t).as_bytes()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn empty_text_and_null_stay_distinct() {
        let mut t = Table::new(["a", "b"]);
        t.push_row(vec![Value::Text(String::new()), Value::Null]).unwrap();
        let s = csv_string(&t);
        assert_eq!(s, "a,b\r\n\"\",\r\n");
        assert_eq!(read_csv(&mut s.as_bytes()).unwrap(), t);
    }

    #[test]
    fn reads_bare_lf_and_missing_final_newline() {
        let t = read_csv(&mut "x,y\n1,2.0\n3,z".as_bytes()).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(0, "y"), Some(&Value::Float(2.0)));
        assert_eq!(t.get(1, "y"), Some(&Value::Text("z".into())));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        assert!(matches!(
            read_csv(&mut "".as_bytes()),
            Err(CodecError::Malformed { record: 1, .. })
        ));
        assert!(matches!(
            read_csv(&mut "a,b\r\n\"open,1\r\n".as_bytes()),
            Err(CodecError::Malformed { .. })
        ));
        assert!(matches!(
            read_csv(&mut "a,b\r\n1,2,3\r\n".as_bytes()),
            Err(CodecError::Malformed { record: 2, .. })
        ));
    }

    #[test]
    fn jsonl_writes_explicit_nulls_in_column_order() {
        let mut buf = Vec::new();
        write_jsonl(&sample(), &mut buf).unwrap();
        let s = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"tick":0,"reporter":"gini","value":0.5}"#);
        assert_eq!(lines[1], r#"{"tick":1,"reporter":"a,b","value":null}"#);
    }

    #[test]
    fn format_names() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert!(matches!(
            "parquet".parse::<OutputFormat>(),
            Err(CodecError::Unsupported { .. })
        ));
    }
}
