use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, ScrapeError};

/// A record that can be laid out against a fixed column schema.
pub trait Tabular {
    /// Cell for `column`, or `None` when the record has no such field.
    fn cell(&self, column: &str) -> Option<String>;
}

/// Spreadsheet hyperlink formula. Empty url → empty cell.
pub fn hyperlink(url: &str, label: &str) -> String {
    if url.is_empty() {
        String::new()
    } else {
        format!("=HYPERLINK(\"{url}\", \"{label}\")")
    }
}

/// Header plus one row per record. Unknown columns are written empty.
pub fn write_csv<W: Write, T: Tabular>(writer: W, schema: &[&str], rows: &[T]) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(schema)?;
    for row in rows {
        w.write_record(schema.iter().map(|col| row.cell(col).unwrap_or_default()))?;
    }
    w.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_csv_file<T: Tabular>(path: &Path, schema: &[&str], rows: &[T]) -> Result<()> {
    let file = create(path)?;
    write_csv(BufWriter::new(file), schema, rows).map_err(|e| at_path(path, e))
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer).map_err(serde_json::Error::io)?;
    Ok(())
}

pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = create(path)?;
    let mut writer = BufWriter::new(file);
    write_json(&mut writer, value).map_err(|e| at_path(path, e))?;
    writer.flush().map_err(|source| ScrapeError::SinkWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Attach `path` to io failures raised while encoding.
fn at_path(path: &Path, err: ScrapeError) -> ScrapeError {
    let source = match err {
        ScrapeError::Csv(e) if e.is_io_error() => std::io::Error::from(e),
        ScrapeError::Json(e) if e.is_io() => std::io::Error::from(e),
        other => return other,
    };
    ScrapeError::SinkWrite {
        path: path.to_path_buf(),
        source,
    }
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ScrapeError::SinkWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    File::create(path).map_err(|source| ScrapeError::SinkWrite {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        title: &'static str,
        url: &'static str,
        secret: &'static str,
    }

    impl Tabular for Row {
        fn cell(&self, column: &str) -> Option<String> {
            match column {
                "title" => Some(self.title.to_string()),
                "url" => Some(hyperlink(self.url, "url")),
                "secret" => Some(self.secret.to_string()),
                _ => None,
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                title: "Intro to RAG",
                url: "https://www.coursera.org/learn/rag",
                secret: "x",
            },
            Row {
                title: "No link, yet",
                url: "",
                secret: "y",
            },
        ]
    }

    #[test]
    fn every_schema_column_is_written() {
        let mut out = Vec::new();
        write_csv(&mut out, &["title", "rating", "url"], &rows()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "title,rating,url");
        assert_eq!(
            lines[1],
            r#"Intro to RAG,,"=HYPERLINK(""https://www.coursera.org/learn/rag"", ""url"")""#
        );
        assert_eq!(lines[2], r#""No link, yet",,"#);
        // Fields outside the schema never leak.
        assert!(!text.contains('x'));
    }

    #[test]
    fn hyperlink_formula() {
        assert_eq!(
            hyperlink("https://ollama.com/library/llama3:8b", "link"),
            r#"=HYPERLINK("https://ollama.com/library/llama3:8b", "link")"#
        );
        assert_eq!(hyperlink("", "link"), "");
    }

    #[test]
    fn json_file_is_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/data.json");
        write_json_file(&path, &serde_json::json!({"models": [1, 2]})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"models\""));
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["models"][1], 2);
    }

    #[test]
    fn unwritable_path_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a file.
        let err = write_csv_file(dir.path(), &["title"], &rows()).unwrap_err();
        assert!(matches!(err, ScrapeError::SinkWrite { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn full_device_reports_the_file() {
        let full = Path::new("/dev/full");
        let many: Vec<Row> = (0..2000).flat_map(|_| rows()).collect();
        let err = write_csv_file(full, &["title", "url"], &many).unwrap_err();
        assert!(matches!(&err, ScrapeError::SinkWrite { path, .. } if path == full));

        let big = serde_json::json!({ "models": vec!["llama3.2"; 5000] });
        let err = write_json_file(full, &big).unwrap_err();
        assert!(matches!(&err, ScrapeError::SinkWrite { path, .. } if path == full));
    }
}
