//! JSON-lines row dumps.
//!
//! Format: one `RawRow` JSON object per line. Blank lines and lines starting
//! with `#` are skipped. Unlike a log replay, a malformed line is an error:
//! a dump is an export of a replica and must be complete.

use crate::record::RawRow;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("dump I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("dump line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("dump encode error: {0}")]
    Encode(serde_json::Error),
}

/// Read every row of a dump.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, DumpError> {
    let reader = BufReader::new(reader);
    let mut rows = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row = serde_json::from_str(trimmed).map_err(|source| DumpError::Parse {
            line: i + 1,
            source,
        })?;
        rows.push(row);
    }

    tracing::debug!("read {} row(s) from dump", rows.len());
    Ok(rows)
}

/// Read every row of the dump at `path`.
pub fn read_rows_from_file(path: &Path) -> Result<Vec<RawRow>, DumpError> {
    let file = std::fs::File::open(path)?;
    read_rows(file)
}

/// Write rows as a dump.
pub fn write_rows<'a, W: Write>(
    mut writer: W,
    rows: impl IntoIterator<Item = &'a RawRow>,
) -> Result<(), DumpError> {
    for row in rows {
        let line = serde_json::to_string(row).map_err(DumpError::Encode)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ReplicationColumns;
    use rtable_common::ViewId;

    #[test]
    fn test_read_rows_skips_blank_and_comments() {
        let dump = r#"
# exported from replica east
{"partition_key":"US","row_key":"1","etag":"e1"}

{"partition_key":"US","row_key":"2","etag":"e2","replication":{"tombstone":true}}
"#;
        let rows = read_rows(dump.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].etag, "e1");
        assert!(rows[1].replication.tombstone);
    }

    #[test]
    fn test_read_rows_reports_line() {
        let dump = "{\"partition_key\":\"US\",\"row_key\":\"1\"}\n{not json}\n";
        let err = read_rows(dump.as_bytes()).unwrap_err();
        assert!(matches!(err, DumpError::Parse { line: 2, .. }), "unexpected: {}", err);
    }

    #[test]
    fn test_write_then_read() {
        let rows = vec![
            RawRow::new("US", "1").with_etag("e1").with_replication(ReplicationColumns {
                view_id: ViewId::new(3),
                version: 7,
                ..ReplicationColumns::default()
            }),
            RawRow::new("EU", "9").with_property("Name", "b"),
        ];
        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();
        assert_eq!(read_rows(buf.as_slice()).unwrap(), rows);
    }

    #[test]
    fn test_read_rows_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("replica.jsonl");
        let rows = vec![RawRow::new("US", "1").with_etag("e1")];
        write_rows(std::fs::File::create(&path).unwrap(), &rows).unwrap();
        assert_eq!(read_rows_from_file(&path).unwrap(), rows);
    }

    #[test]
    fn test_read_rows_from_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read_rows_from_file(&dir.path().join("absent.jsonl")).unwrap_err();
        assert!(matches!(err, DumpError::Io(_)));
    }
}
