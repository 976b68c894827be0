//! Decoding of model replies into raw tables.
//!
//! Replies are expected to be a quoted CSV table with a header row. Cells are
//! kept as strings here; typing happens in the validator so that every check
//! can be reported against the whole sample.

use crate::error::ParseError;

/// A decoded but untyped reply table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    /// Each data row, padded to the header width.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Index of the first column whose header matches any of `names`,
    /// ignoring case.
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate the cells of one column.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |r| r[col].as_str())
    }
}

/// Decode a reply into a table.
///
/// Doubled quotes (`""`) are collapsed to single quotes first, since models
/// frequently double-escape every value when asked to quote them.
pub fn parse_reply(reply: &str) -> Result<RawTable, ParseError> {
    let text = reply.replace("\"\"", "\"");
    let text = text.trim();

    if text.is_empty() {
        return Err(ParseError::EmptyReply);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Csv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::Csv(e.to_string()))?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        if record.len() > headers.len() {
            return Err(ParseError::RowTooWide {
                row: rows.len() + 1,
                fields: record.len(),
                expected: headers.len(),
            });
        }

        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ParseError::NoRows);
    }

    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\"Start Year\",\"End Year\",\"Population\",\"Summary\",\"Freedom\",\"Health & Wellbeing\",\"Economic Opportunity\",\"Equality\",\"Culture & Leisure\",\"Peace\"";

    #[test]
    fn test_parse_quoted_table() {
        let reply = format!(
            "{}\n\"-1000\",\"-900\",\"2,300,000\",\"Bronze age kingdoms, small villages.\",\"3\",\"2\",\"2\",\"3\",\"3\",\"4\"\n\"-900\",\"-800\",\"2,400,000\",\"Iron tools spread.\",\"3\",\"3\",\"2\",\"3\",\"3\",\"4\"\n",
            HEADER
        );

        let table = parse_reply(&reply).unwrap();
        assert_eq!(table.headers.len(), 10);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][2], "2,300,000");
        assert_eq!(table.rows[0][3], "Bronze age kingdoms, small villages.");
        assert_eq!(table.column(&["population"]), Some(2));
        assert_eq!(table.column(&["Nope"]), None);
    }

    #[test]
    fn test_parse_doubled_quotes() {
        let reply = "\"\"Start Year\"\",\"\"End Year\"\"\n\"\"-1000\"\",\"\"-900\"\"\n";
        let table = parse_reply(reply).unwrap();
        assert_eq!(table.headers, vec!["Start Year", "End Year"]);
        assert_eq!(table.rows[0], vec!["-1000", "-900"]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = parse_reply("a,b,c\n1,2\n").unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
    }

    #[test]
    fn test_wide_row_fails() {
        let err = parse_reply("a,b\n1,2\n1,2,3\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::RowTooWide {
                row: 2,
                fields: 3,
                expected: 2
            }
        );
    }

    #[test]
    fn test_prose_reply_fails() {
        let reply = "Sure! Here is the table you asked for, covering every century:\n\"-1000\",\"-900\",\"2000\"";
        assert!(parse_reply(reply).is_err());
    }

    #[test]
    fn test_empty_and_header_only() {
        assert_eq!(parse_reply("  \n "), Err(ParseError::EmptyReply));
        assert_eq!(parse_reply(HEADER), Err(ParseError::NoRows));
    }
}
