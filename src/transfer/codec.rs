//! CSV reading and writing.

use crate::error::{DbError, DbResult};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use encoding_rs_io::DecodeReaderBytesBuilder;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub const DEFAULT_DELIMITER: u8 = b',';

/// Delimiters considered when sniffing, in tie-break order.
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Leading bytes examined to detect the encoding and the delimiter.
const SNIFF_SAMPLE_BYTES: u64 = 4096;

const UTF8_BOM: char = '\u{feff}';

/// A CSV file decoded into a header row and data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

/// Pick the candidate delimiter occurring most often outside quotes.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;

    for byte in header_line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(idx) = CANDIDATE_DELIMITERS.iter().position(|d| *d == byte) {
                counts[idx] += 1;
            }
        }
    }

    let mut best = 0;
    for idx in 1..counts.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    if counts[best] == 0 {
        DEFAULT_DELIMITER
    } else {
        CANDIDATE_DELIMITERS[best]
    }
}

/// Guess the text encoding of a file from its leading bytes.
///
/// A byte order mark wins. Otherwise valid UTF-8 is UTF-8 and anything else
/// is read as windows-1252, which accepts every byte.
pub fn detect_encoding(sample: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => UTF_8,
        // Multi-byte character cut off by the end of the sample
        Err(e) if e.error_len().is_none() => UTF_8,
        Err(_) => WINDOWS_1252,
    }
}

/// Resolve an encoding label such as "utf-8", "latin1" or "cp1252".
pub fn parse_encoding(label: &str) -> DbResult<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| DbError::invalid_input(format!("Unknown encoding '{}'", label)))
}

/// Printable name of a delimiter byte.
pub fn delimiter_name(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}

/// Parse a caller-supplied delimiter: one ASCII character, or `\t`/`tab`.
pub fn parse_delimiter(value: &str) -> DbResult<u8> {
    match value {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        other if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
        other => Err(DbError::invalid_input(format!(
            "Delimiter must be a single ASCII character, got '{}'",
            other
        ))),
    }
}

/// Read a CSV file with a header row.
///
/// Missing delimiter and encoding are detected from the first bytes of the
/// file. The content is transcoded to UTF-8 while it is parsed. Blocking;
/// async callers run it on the blocking pool.
pub fn read_csv(
    path: &Path,
    delimiter: Option<u8>,
    encoding: Option<&'static Encoding>,
) -> DbResult<DecodedTable> {
    let mut sample = Vec::new();
    open_existing(path)?
        .take(SNIFF_SAMPLE_BYTES)
        .read_to_end(&mut sample)
        .map_err(|e| DbError::io(path, e))?;

    let encoding = encoding.unwrap_or_else(|| detect_encoding(&sample));
    let delimiter = match delimiter {
        Some(d) => d,
        None => {
            let (text, _, _) = encoding.decode(&sample);
            sniff_delimiter(text.lines().next().unwrap_or(""))
        }
    };

    let reader = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .build(open_existing(path)?);
    let (headers, rows) = decode_csv(reader, delimiter, path)?;
    Ok(DecodedTable {
        headers,
        rows,
        delimiter,
        encoding,
    })
}

/// Decode CSV from any reader. `source` is only used in error messages.
pub fn decode_csv<R: std::io::Read>(
    reader: R,
    delimiter: u8,
    source: &Path,
) -> DbResult<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DbError::csv(source, e))?
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            if idx == 0 {
                h.trim_start_matches(UTF8_BOM).to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    validate_headers(&headers, source)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DbError::csv(source, e))?;
        rows.push(record.iter().map(String::from).collect());
    }

    Ok((headers, rows))
}

fn validate_headers(headers: &[String], source: &Path) -> DbResult<()> {
    if headers.is_empty() {
        return Err(DbError::invalid_input(format!(
            "'{}' has no header row",
            source.display()
        )));
    }

    let mut seen = HashSet::new();
    for (position, name) in headers.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(DbError::invalid_input(format!(
                "'{}' has an empty column name at position {}",
                source.display(),
                position
            )));
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(DbError::invalid_input(format!(
                "'{}' has duplicate column name '{}'",
                source.display(),
                name
            )));
        }
    }
    Ok(())
}

fn open_existing(path: &Path) -> DbResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DbError::file_not_found(path.display().to_string()),
        _ => DbError::io(path, e),
    })
}

/// Render a decoded SQLite value as a CSV field. NULL becomes an empty field.
pub fn field_from_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// CSV file writer. Any existing file at the path is overwritten.
pub struct CsvSink {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvSink {
    pub fn create(path: &Path, delimiter: u8) -> DbResult<Self> {
        let file = File::create(path).map_err(|e| DbError::io(path, e))?;
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(file);
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn write_row<I, T>(&mut self, fields: I) -> DbResult<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(fields)
            .map_err(|e| DbError::csv(&self.path, e))
    }

    pub fn finish(mut self) -> DbResult<()> {
        self.writer.flush().map_err(|e| DbError::io(&self.path, e))
    }
}

/// Write `header`, then every row received until all senders are dropped.
///
/// Blocking; meant to run on the blocking pool while an async task feeds
/// `rows`. Returns the number of data rows written.
pub fn write_csv(
    path: &Path,
    delimiter: u8,
    header: &[String],
    mut rows: mpsc::Receiver<Vec<String>>,
) -> DbResult<u64> {
    let mut sink = CsvSink::create(path, delimiter)?;
    sink.write_row(header)?;

    let mut written = 0u64;
    while let Some(fields) = rows.blocking_recv() {
        sink.write_row(&fields)?;
        written += 1;
    }
    sink.finish()?;
    Ok(written)
}
