//! Plain-text and CSV inputs.

use crate::error::ConversionError;
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use tracing::warn;

/// Read a text file; invalid UTF-8 sequences are replaced, not rejected.
pub async fn read_text(path: &Path) -> Result<String, ConversionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ConversionError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.strip_prefix('\u{FEFF}').unwrap_or(&text).to_string())
}

/// Render CSV as a GFM table. The first record is the header row.
///
/// `\n`, `\r\n` and bare `\r` all end a record; quoting follows RFC 4180.
/// Short rows are padded to the widest row; `|` inside a cell is escaped.
/// A record the reader cannot parse is logged and skipped.
pub fn csv_to_markdown(input: &str) -> String {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut rows: Vec<StringRecord> = Vec::new();
    for (row_num, result) in reader.records().enumerate() {
        match result {
            Ok(record) if record.iter().all(|f| f.trim().is_empty()) => {}
            Ok(record) => rows.push(record),
            Err(e) => warn!("Skipping CSV row {}: {}", row_num + 1, e),
        }
    }

    let Some(header) = rows.first() else {
        return String::new();
    };
    let width = rows.iter().map(StringRecord::len).max().unwrap_or(0);

    let render = |row: &StringRecord| {
        let mut cells: Vec<String> = row.iter().map(escape_cell).collect();
        cells.resize(width, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(render(header));
    out.push(format!("|{}", " --- |".repeat(width)));
    out.extend(rows[1..].iter().map(render));
    out.join("\n") + "\n"
}

fn escape_cell(cell: &str) -> String {
    cell.trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace(&['\n', '\r'][..], "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_table() {
        let md = csv_to_markdown("name,size\nbutton,44px\nicon,24px\n");
        assert_eq!(
            md,
            "| name | size |\n| --- | --- |\n| button | 44px |\n| icon | 24px |\n"
        );
    }

    #[test]
    fn quoted_fields_and_pipes() {
        let md = csv_to_markdown("rule,note\n\"spacing, grid\",\"say \"\"8px\"\"\"\nsep,a|b");
        assert!(md.contains("| spacing, grid | say \"8px\" |"));
        assert!(md.contains("| sep | a\\|b |"));
    }

    #[test]
    fn ragged_rows_are_padded() {
        let md = csv_to_markdown("a,b,c\n1\n");
        assert!(md.contains("| 1 |  |  |"));
    }

    #[test]
    fn blank_lines_skipped_and_empty_input() {
        assert_eq!(csv_to_markdown(""), "");
        let md = csv_to_markdown("h\r\n\r\nv\r\n");
        assert_eq!(md, "| h |\n| --- |\n| v |\n");
    }

    #[test]
    fn carriage_return_only_line_endings() {
        let md = csv_to_markdown("h1,h2\r1,2\r3,4\r");
        assert_eq!(md, "| h1 | h2 |\n| --- | --- |\n| 1 | 2 |\n| 3 | 4 |\n");
    }

    #[test]
    fn quoted_newline_becomes_line_break() {
        let md = csv_to_markdown("k,v\nnote,\"line one\nline two\"\n");
        assert!(md.contains("| note | line one<br>line two |"));
    }

    #[tokio::test]
    async fn reads_lossy_utf8_without_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.txt");
        std::fs::write(&path, b"\xEF\xBB\xBFok \xFF").unwrap();
        assert_eq!(read_text(&path).await.unwrap(), "ok \u{FFFD}");
    }
}
