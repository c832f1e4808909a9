//! Calibration table files
//!
//! A table file is CSV with one `key,value` record per line and no header:
//! a decimal `i32` key and a decimal `u16` value. Fields may be quoted.
//! Blank lines are ignored. Rows may appear in any order.

use super::Table;
use crate::types::{CalError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;

/// Parse a table file for signal slot `sig_index`
pub fn parse_table(path: &Path, sig_index: u8) -> Result<Table> {
    log::info!("Parsing table {}: {:?}", sig_index, path);

    let content = std::fs::read_to_string(path).map_err(|e| {
        CalError::TableParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let name = path.display().to_string();
    let table = parse_rows(&content, sig_index, &name)?;

    log::info!("Parsed {} rows from {:?}", table.len(), path);
    Ok(table)
}

/// Parse table rows from a string
pub fn parse_table_str(content: &str, sig_index: u8) -> Result<Table> {
    parse_rows(content, sig_index, "<table>")
}

fn parse_rows(content: &str, sig_index: u8, name: &str) -> Result<Table> {
    let mut table = Table::new(sig_index)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    for record in reader.records() {
        let record = record.map_err(|e| {
            let line = e.position().map_or(0, |p| p.line());
            parse_error(name, line as usize, 1, &e.to_string())
        })?;
        let line_no = record.position().map_or(0, |p| p.line()) as usize;
        if is_blank(&record) {
            continue;
        }

        if record.len() != 2 {
            return Err(parse_error(name, line_no, 1, "malformed row"));
        }
        // Fields are stored back to back; the delimiter sits between them
        let val_col = record.range(1).map_or(1, |r| r.start + 2);

        let key: i32 = record[0]
            .parse()
            .map_err(|e| parse_error(name, line_no, 1, &format!("invalid key: {}", e)))?;
        let val: u16 = record[1]
            .parse()
            .map_err(|e| parse_error(name, line_no, val_col, &format!("invalid value: {}", e)))?;

        table
            .insert(key, val)
            .map_err(|e| parse_error(name, line_no, 1, &e.to_string()))?;
    }

    Ok(table)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty)
}

fn parse_error(name: &str, line: usize, col: usize, msg: &str) -> CalError {
    CalError::TableParseError(format!("{}:{}:{}: {}", name, line, col, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_unsorted_rows() {
        let table = parse_table_str("10,300\n-5,0\n\n0,150\n", 1).unwrap();
        assert_eq!(table.sig_index(), 1);
        let pairs: Vec<(i32, u16)> = table.entries().iter().map(|e| (e.key, e.val)).collect();
        assert_eq!(pairs, vec![(-5, 0), (0, 150), (10, 300)]);
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_crlf() {
        let table = parse_table_str(" 1 , 2\r\n3,4\r\n", 0).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_parse_quoted_fields() {
        let table = parse_table_str("\"10\",\"300\"\n\"-5\",0\n", 2).unwrap();
        let pairs: Vec<(i32, u16)> = table.entries().iter().map(|e| (e.key, e.val)).collect();
        assert_eq!(pairs, vec![(-5, 0), (10, 300)]);
    }

    #[test]
    fn test_quoted_comma_stays_in_field() {
        let err = parse_table_str("0,1\n\"1,5\",2\n", 0).unwrap_err();
        assert!(err.to_string().contains("<table>:2:1: invalid key"));
    }

    #[test]
    fn test_whitespace_only_line_is_blank() {
        let table = parse_table_str("1,2\n   \n3,4\n", 0).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_malformed_row() {
        let err = parse_table_str("1,2\n3\n", 0).unwrap_err();
        assert_eq!(err.to_string(), "Failed to parse table: <table>:2:1: malformed row");

        assert!(parse_table_str("1,2,3\n", 0).is_err());
    }

    #[test]
    fn test_value_out_of_range() {
        let err = parse_table_str("1,70000\n", 0).unwrap_err();
        assert!(err.to_string().contains("<table>:1:3: invalid value"));

        assert!(parse_table_str("3000000000,1\n", 0).is_err());
        assert!(parse_table_str("1,-1\n", 0).is_err());
    }

    #[test]
    fn test_duplicate_key_reports_line() {
        let err = parse_table_str("1,2\n5,6\n1,3\n", 0).unwrap_err();
        assert!(err.to_string().contains("<table>:3:1: Duplicate key 1"));
    }

    #[test]
    fn test_too_many_rows() {
        let content: String = (0..33).map(|k| format!("{},{}\n", k, k)).collect();
        let err = parse_table_str(&content, 0).unwrap_err();
        assert!(err.to_string().contains(":33:1:"));
    }

    #[test]
    fn test_parse_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"0,0\n1000,500\n").unwrap();
        temp_file.flush().unwrap();

        let table = parse_table(temp_file.path(), 3).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.sig_index(), 3);
    }

    #[test]
    fn test_missing_file() {
        let result = parse_table(Path::new("/nonexistent/table.csv"), 0);
        assert!(matches!(result, Err(CalError::TableParseError(_))));
    }
}
