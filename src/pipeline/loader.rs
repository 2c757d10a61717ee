//! Source loader: sales CSV -> ordered `SalesRow`s
//!
//! Header contract: `CustomerName, ProductName, SalesAmount, SalesDate, Region`
//! (any order, extra columns ignored). Every required field must be present
//! and non-empty, `SalesAmount` must be a decimal number and `SalesDate` must
//! match `YYYY-MM-DD`. The first bad row fails the whole load.

use super::error::PipelineError;
use super::types::{SalesRow, SALES_DATE_FORMAT};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Required source columns
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "CustomerName",
    "ProductName",
    "SalesAmount",
    "SalesDate",
    "Region",
];

/// One CSV line before typing
#[derive(Debug, Deserialize)]
struct RawSalesRow {
    #[serde(rename = "CustomerName")]
    customer_name: Option<String>,
    #[serde(rename = "ProductName")]
    product_name: Option<String>,
    #[serde(rename = "SalesAmount")]
    sales_amount: Option<String>,
    #[serde(rename = "SalesDate")]
    sales_date: Option<String>,
    #[serde(rename = "Region")]
    region: Option<String>,
}

/// Load the sales CSV at `path`
///
/// Returns `PipelineError::NotFound` if the file does not exist.
pub fn load_sales_csv(path: impl AsRef<Path>) -> Result<Vec<SalesRow>, PipelineError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::NotFound(path.to_path_buf()),
        _ => PipelineError::Io(e),
    })?;

    let rows = read_sales_csv(file)?;
    log::info!("📥 Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parse sales rows from any CSV reader
pub fn read_sales_csv<R: Read>(reader: R) -> Result<Vec<SalesRow>, PipelineError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(PipelineError::parse(
                1,
                format!("missing required column '{}'", column),
            ));
        }
    }

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let raw: RawSalesRow = record
            .deserialize(Some(&headers))
            .map_err(|e| PipelineError::parse(line, e.to_string()))?;
        rows.push(parse_row(raw, line)?);
    }

    Ok(rows)
}

fn parse_row(raw: RawSalesRow, line: u64) -> Result<SalesRow, PipelineError> {
    let customer_name = required(raw.customer_name, "CustomerName", line)?;
    let product_name = required(raw.product_name, "ProductName", line)?;
    let amount_str = required(raw.sales_amount, "SalesAmount", line)?;
    let date_str = required(raw.sales_date, "SalesDate", line)?;
    let region = required(raw.region, "Region", line)?;

    let sales_amount = Decimal::from_str(amount_str.trim())
        .or_else(|_| Decimal::from_scientific(amount_str.trim()))
        .map_err(|_| {
            PipelineError::parse(
                line,
                format!("SalesAmount '{}' is not a decimal number", amount_str),
            )
        })?;

    // chrono accepts unpadded fields, so require the exact YYYY-MM-DD text
    let sales_date = NaiveDate::parse_from_str(&date_str, SALES_DATE_FORMAT)
        .ok()
        .filter(|d| d.format(SALES_DATE_FORMAT).to_string() == date_str)
        .ok_or_else(|| {
            PipelineError::parse(
                line,
                format!("SalesDate '{}' does not match YYYY-MM-DD", date_str),
            )
        })?;

    Ok(SalesRow {
        customer_name,
        product_name,
        sales_amount,
        sales_date,
        region,
    })
}

fn required(value: Option<String>, column: &str, line: u64) -> Result<String, PipelineError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PipelineError::parse(
            line,
            format!("column '{}' is missing or empty", column),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "CustomerName,ProductName,SalesAmount,SalesDate,Region\n";

    fn parse(body: &str) -> Result<Vec<SalesRow>, PipelineError> {
        read_sales_csv(format!("{}{}", HEADER, body).as_bytes())
    }

    #[test]
    fn test_load_preserves_order_and_duplicates() {
        let rows = parse(
            "A,P1,10.00,2024-01-01,East\n\
             A,P1,10.00,2024-01-01,East\n\
             B,P2,5.00,2024-01-02,West\n",
        )
        .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], rows[1]);
        assert_eq!(rows[2].customer_name, "B");
        assert_eq!(rows[2].sales_amount, Decimal::from_str("5.00").unwrap());
        assert_eq!(rows[2].sales_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let rows = parse("").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_malformed_date_rejected() {
        let err = parse("A,P1,10.00,2024/01/01,East\n").unwrap_err();
        match err {
            PipelineError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("2024/01/01"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unpadded_date_rejected() {
        for date in ["2024-1-1", "2024-01-1", "24-01-01", "2024-02-30"] {
            let err = parse(&format!("A,P1,1,{},East\n", date)).unwrap_err();
            assert!(
                matches!(err, PipelineError::Parse { line: 2, .. }),
                "{} should be rejected",
                date
            );
        }
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let err = parse("A,P1,ten,2024-01-01,East\n").unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
        assert!(err.to_string().contains("SalesAmount"));
    }

    #[test]
    fn test_empty_field_rejected() {
        let err = parse("A,P1,10.00,2024-01-01,\n").unwrap_err();
        assert!(err.to_string().contains("Region"));
    }

    #[test]
    fn test_missing_column_rejected() {
        let input = "CustomerName,ProductName,SalesAmount,SalesDate\nA,P1,1,2024-01-01\n";
        let err = read_sales_csv(input.as_bytes()).unwrap_err();
        match err {
            PipelineError::Parse { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("Region"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_reordered_and_extra_columns() {
        let input = "Region,SalesDate,Notes,SalesAmount,ProductName,CustomerName\n\
                     East,2024-03-05,promo,12.5,P9,Zed\n";
        let rows = read_sales_csv(input.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_name, "Zed");
        assert_eq!(rows[0].region, "East");
    }

    #[test]
    fn test_keys_are_not_trimmed() {
        let rows = parse("A ,P1,1.00,2024-01-01,East\n").unwrap();
        assert_eq!(rows[0].customer_name, "A ");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_sales_csv("/nonexistent/dir/sales.csv").unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}C,P3,7.25,2024-02-29,North\n", HEADER).unwrap();

        let rows = load_sales_csv(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sales_date_str(), "2024-02-29");
    }
}
