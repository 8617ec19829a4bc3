//! Splits comma-separated lines into fields.
//!
//! Standard double-quote rules apply: a quoted field may contain commas and
//! doubled (`""`) quotes. A quote only opens a quoted field at the start of
//! the field; anywhere else (`12" KNIFE`) it is an ordinary character.

use std::borrow::Cow;

/// Errors splitting a line into fields.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// Nothing but whitespace on the line.
    #[error("empty line")]
    Empty,

    /// A quoted field is never closed.
    #[error("unbalanced quotes")]
    UnbalancedQuotes,

    /// The CSV reader rejected the line.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Splits one line into its fields.
///
/// # Errors
///
/// Returns [`FieldError`] if the line is blank or its quoting is malformed.
pub fn extract_fields(line: &str) -> Result<Vec<String>, FieldError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(FieldError::Empty);
    }
    if ends_inside_quotes(line) {
        return Err(FieldError::UnbalancedQuotes);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Err(FieldError::Empty);
    }

    Ok(record.iter().map(str::to_owned).collect())
}

/// Whether a quoted field is still open at the end of `line`.
fn ends_inside_quotes(line: &str) -> bool {
    let mut bytes = line.bytes().peekable();
    let mut in_quotes = false;
    let mut at_field_start = true;
    while let Some(b) = bytes.next() {
        if in_quotes {
            if b == b'"' {
                if bytes.peek() == Some(&b'"') {
                    bytes.next();
                } else {
                    in_quotes = false;
                }
            }
        } else if b == b'"' && at_field_start {
            in_quotes = true;
        }
        at_field_start = !in_quotes && b == b',';
    }
    in_quotes
}

/// Joins fields into one comma-separated line that [`extract_fields`]
/// splits back into the same fields.
#[must_use]
pub fn join_fields(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| quote(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn quote(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
