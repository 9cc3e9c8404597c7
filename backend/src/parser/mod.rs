//! CSV reading with encoding and delimiter auto-detection, and ledger export.
//!
//! Converts CSV rows into JSON objects keyed by header. No feed-specific
//! logic here: the feed matrices decide what the columns mean.

use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::UnifiedLedgerEntry;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed records as JSON objects
    pub records: Vec<Value>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "big5" | "gb2312" | "gb18030" => charset.to_lowercase(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => s,
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        "big5" => encoding_rs::BIG5.decode(bytes).0.to_string(),
        "gb2312" | "gb18030" => encoding_rs::GB18030.decode(bytes).0.to_string(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.to_string(),
            // Fallback: try UTF-8 with lossy conversion
            None => String::from_utf8_lossy(bytes).to_string(),
        },
    };

    if decoded.is_empty() && !bytes.is_empty() {
        return Err(CsvError::Encoding(format!(
            "{} bytes decoded to nothing with '{}'",
            bytes.len(),
            encoding
        )));
    }

    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV into JSON objects with explicit delimiter.
///
/// Each row becomes a JSON object where keys are column headers.
///
/// # Example
/// ```ignore
/// use ltcheck::csv_to_json;
///
/// let csv = "Num,Item\nSO-1,\"S50, including X\"";
/// let rows = csv_to_json(csv, ',').unwrap();
///
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0]["Item"], "S50, including X");
/// ```
pub fn csv_to_json(csv: &str, delimiter: char) -> CsvResult<Vec<Value>> {
    parse_string_with_metadata(csv, delimiter, "utf-8".to_string()).map(|r| r.records)
}

/// Parse CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV string with explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();

    for result in reader.records() {
        let record = result?;

        // Skip completely blank rows
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let raw_value = record.get(i).map(str::trim).unwrap_or("");
            obj.insert(header.clone(), Value::String(raw_value.to_string()));
        }

        records.push(Value::Object(obj));
    }

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

// =============================================================================
// Ledger export
// =============================================================================

/// Column order of an exported ledger.
pub const LEDGER_COLUMNS: [&str; 10] = [
    "Order Date",
    "Ship Date",
    "QB Num",
    "P. O. #",
    "Name",
    "Qty(-)",
    "Qty(+)",
    "Item",
    "Inventory Site",
    "Remark",
];

/// Write a ledger as CSV with the fixed [`LEDGER_COLUMNS`] header.
pub fn write_ledger_csv<W: Write>(writer: W, ledger: &[UnifiedLedgerEntry]) -> CsvResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(LEDGER_COLUMNS)?;

    for entry in ledger {
        out.write_record([
            format_date(entry.order_date),
            format_date(entry.ship_date),
            entry.reference_number.clone(),
            entry.po_number.clone(),
            entry.party_name.clone(),
            format_qty(entry.qty_demand),
            format_qty(entry.qty_supply),
            entry.item_code.clone(),
            entry.site.clone(),
            entry.remark.clone(),
        ])?;
    }

    out.flush().map_err(|e| CsvError::Write(e.to_string()))
}

/// Write a ledger CSV to a file path.
pub fn write_ledger_csv_file<P: AsRef<Path>>(path: P, ledger: &[UnifiedLedgerEntry]) -> CsvResult<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_ledger_csv(file, ledger)
}

fn format_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y/%m/%d").to_string())
        .unwrap_or_default()
}

fn format_qty(qty: f64) -> String {
    if qty.fract() == 0.0 {
        format!("{}", qty as i64)
    } else {
        qty.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_simple_csv() {
        let csv = "Num;Item\nSO-1;A100\nSO-2;B200";
        let rows = csv_to_json(csv, ';').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Num"], "SO-1");
        assert_eq!(rows[1]["Item"], "B200");
    }

    #[test]
    fn test_quoted_commas_survive() {
        let csv = "Customer Ordering Model,Customer Ordering Desc.\nS50-KIT,\"S50, including X, 2xY\"";
        let rows = csv_to_json(csv, ',').unwrap();

        assert_eq!(rows[0]["Customer Ordering Desc."], "S50, including X, 2xY");
    }

    #[test]
    fn test_blank_rows_skipped() {
        let csv = "a,b\n1,2\n,\n3,4\n";
        let rows = csv_to_json(csv, ',').unwrap();

        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_short_and_long_rows() {
        let csv = "a,b,c\n1,,3\n4\n5,6,7,8";
        let rows = csv_to_json(csv, ',').unwrap();

        assert_eq!(rows[0]["b"], "");
        assert_eq!(rows[1]["c"], "");
        assert_eq!(rows[2]["c"], "7");
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(csv_to_json("", ','), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_auto_parse_strips_bom() {
        let csv = "\u{feff}Num,Item\nSO-1,A100";
        let result = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.headers, vec!["Num", "Item"]);
        assert_eq!(result.records[0]["Num"], "SO-1");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.contains("Soci"));
    }

    #[test]
    fn test_parse_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Num,Backordered").unwrap();
        writeln!(file, "PO-1,12").unwrap();

        let result = parse_csv_file_auto(file.path()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0]["Backordered"], "12");
    }

    #[test]
    fn test_write_ledger_csv() {
        let ledger = vec![UnifiedLedgerEntry {
            ship_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            reference_number: "PO-9".into(),
            qty_supply: 2.5,
            item_code: "A100".into(),
            site: "Main".into(),
            ..Default::default()
        }];

        let mut buf = Vec::new();
        write_ledger_csv(&mut buf, &ledger).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Order Date,Ship Date,QB Num,P. O. #,Name,Qty(-),Qty(+),Item,Inventory Site,Remark"
        );
        assert_eq!(lines.next().unwrap(), ",2025/03/01,PO-9,,,0,2.5,A100,Main,");
    }
}
