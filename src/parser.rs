//! Parser for LODES workplace-area-characteristics (WAC) count tables.

use crate::error::{Result, StudyError};
use crate::source::EmploymentRecord;
use std::io::Read;

/// Decodes `(geocode, count)` pairs from a CSV stream with a header row.
///
/// The geocode is kept as the raw string: block codes begin with a state
/// FIPS code that may start with `0`, and numeric parsing would drop it.
///
/// # Errors
///
/// Returns [`StudyError::InvalidRecord`] if either column is missing from the
/// header or a count is not a non-negative integer.
pub fn parse_counts<R: Read>(
    reader: R,
    geocode_column: &str,
    count_column: &str,
) -> Result<Vec<EmploymentRecord>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| StudyError::InvalidRecord {
                line: 1,
                detail: format!("header has no `{name}` column"),
            })
    };
    let geocode_idx = column(geocode_column)?;
    let count_idx = column(count_column)?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let geocode = row.get(geocode_idx).unwrap_or_default().trim();
        let raw_count = row.get(count_idx).unwrap_or_default().trim();
        let jobs: u64 = raw_count.parse().map_err(|_| StudyError::InvalidRecord {
            line,
            detail: format!("`{count_column}` value `{raw_count}` is not a non-negative integer"),
        })?;

        records.push(EmploymentRecord {
            geocode: geocode.to_string(),
            jobs,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_leading_zero() {
        let csv = "w_geocode,C000,CA01\n010010201001000,12,3\n010010201001001,4,1\n";
        let records = parse_counts(csv.as_bytes(), "w_geocode", "C000").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].geocode, "010010201001000");
        assert_eq!(records[0].jobs, 12);
        assert_eq!(records[1].jobs, 4);
    }

    #[test]
    fn test_parse_empty_table() {
        let records = parse_counts("w_geocode,C000\n".as_bytes(), "w_geocode", "C000").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_missing_column() {
        let err = parse_counts("geocode,jobs\n1,2\n".as_bytes(), "w_geocode", "C000").unwrap_err();
        assert!(matches!(err, StudyError::InvalidRecord { line: 1, .. }));
    }

    #[test]
    fn test_parse_negative_count_is_rejected() {
        let csv = "w_geocode,C000\n530330053011000,-5\n";
        let err = parse_counts(csv.as_bytes(), "w_geocode", "C000").unwrap_err();
        assert!(matches!(err, StudyError::InvalidRecord { line: 2, .. }));
    }

    #[test]
    fn test_parse_column_order_does_not_matter() {
        let csv = "C000,createdate,w_geocode\n7,20190826,530330053011000\n";
        let records = parse_counts(csv.as_bytes(), "w_geocode", "C000").unwrap();
        assert_eq!(records[0].geocode, "530330053011000");
        assert_eq!(records[0].jobs, 7);
    }
}
