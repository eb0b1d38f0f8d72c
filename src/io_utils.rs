//! CSV loading and writing for the command line.
//!
//! Inputs are decoded with `encoding_rs` (UTF-8 unless told otherwise) and
//! split with the `csv` crate. The delimiter comes from the command line,
//! then the file extension (`.tsv` is tab), then a look at the header line.
//! Cells that hold a null token (`""`, `NA`, `null`, ...) load as nulls.
//! Output always quotes every field.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{data::is_null_token, normalize::collapse_whitespace, table::Table};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Checked in order against the header line when nothing else decides.
const SNIFF_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Explicit delimiter, else `.tsv` means tab, else `None` so the caller sniffs.
pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> Option<u8> {
    provided.or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => Some(DEFAULT_TSV_DELIMITER),
        _ => None,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

/// First of `,` `;` tab that occurs in the header line; comma otherwise.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    SNIFF_DELIMITERS
        .iter()
        .copied()
        .find(|d| header.as_bytes().contains(d))
        .unwrap_or(DEFAULT_CSV_DELIMITER)
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn read_text(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading standard input")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    decode_bytes(&bytes, encoding).with_context(|| format!("Decoding {path:?}"))
}

/// Table name for a path: the file stem, or `stdin` for `-`.
pub fn table_name(path: &Path) -> String {
    if is_dash(path) {
        return "stdin".to_string();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn load_table(path: &Path, delimiter: Option<u8>, encoding: &'static Encoding) -> Result<Table> {
    let text = read_text(path, encoding)?;
    let delimiter = resolve_input_delimiter(path, delimiter).unwrap_or_else(|| sniff_delimiter(&text));
    debug!(
        "Loading {:?} with delimiter '{}'",
        path,
        crate::printable_delimiter(delimiter)
    );
    parse_table(&table_name(path), &text, delimiter).with_context(|| format!("Loading {path:?}"))
}

/// Parses decoded CSV text into a table named `name`.
pub fn parse_table(name: &str, text: &str, delimiter: u8) -> Result<Table> {
    let mut reader = open_csv_reader(text.as_bytes(), delimiter, true);
    let headers = reader
        .headers()
        .context("Reading header row")?
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let header = collapse_whitespace(header);
            if header.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                header.into_owned()
            }
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        rows.push(
            record
                .iter()
                .map(|cell| (!is_null_token(cell)).then(|| cell.to_string()))
                .collect(),
        );
    }
    Ok(Table::from_rows(name, headers, rows)?)
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

/// Writes `table` with headers; nulls become empty fields.
pub fn write_table(table: &Table, path: Option<&Path>, delimiter: u8) -> Result<()> {
    let mut writer = open_csv_writer(path, delimiter)?;
    writer
        .write_record(table.headers())
        .context("Writing output headers")?;
    for (row_idx, row) in table.rows().into_iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or_default()))
            .with_context(|| format!("Writing output row {}", row_idx + 1))?;
    }
    writer.flush().context("Flushing output")?;
    Ok(())
}
