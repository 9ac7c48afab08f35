//! Flat-file persistence for the trending dataset.
//!
//! Every write replaces the destination in full; there is no append or merge
//! mode. Reading only checks structure (a header row, equal field counts) and
//! leaves semantic parsing to [`crate::preprocess`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::record::{COLUMNS, VideoRecord, encode_tags};
use crate::stats::SummaryTable;

/// A loaded file with only structural typing applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Writes every record to `destination`, overwriting whatever was there.
pub fn persist(records: &[VideoRecord], destination: &Path) -> Result<()> {
    let mut writer = open_writer(destination)?;
    let io_err = |source: io::Error| PipelineError::Io {
        path: destination.to_path_buf(),
        source,
    };

    writer
        .write_record(COLUMNS)
        .map_err(|err| io_err(err.into()))?;
    for record in records {
        let tags = encode_tags(&record.tags).map_err(|err| io_err(err.into()))?;
        let category_id = record.category_id.map(|id| id.to_string()).unwrap_or_default();
        let counters = [
            record.view_count,
            record.like_count,
            record.dislike_count,
            record.favorite_count,
            record.comment_count,
        ]
        .map(|count| count.to_string());
        let fields: [&str; 18] = [
            &record.video_id,
            &record.title,
            &record.description,
            &record.published_at,
            &record.channel_id,
            &record.channel_title,
            &category_id,
            &record.category_name,
            &tags,
            &record.duration,
            &record.definition,
            &record.caption,
            &counters[0],
            &counters[1],
            &counters[2],
            &counters[3],
            &counters[4],
            record.country.as_deref().unwrap_or_default(),
        ];
        writer
            .write_record(fields)
            .map_err(|err| io_err(err.into()))?;
    }
    writer.flush().map_err(io_err)?;

    info!(rows = records.len(), path = %destination.display(), "persisted trending dataset");
    Ok(())
}

/// Writes a descriptive-statistics table, overwriting `destination`.
pub fn write_summary(summary: &SummaryTable, destination: &Path) -> Result<()> {
    let mut writer = open_writer(destination)?;
    let io_err = |source: io::Error| PipelineError::Io {
        path: destination.to_path_buf(),
        source,
    };

    writer
        .write_record(summary.header())
        .map_err(|err| io_err(err.into()))?;
    for row in summary.rows() {
        writer.write_record(&row).map_err(|err| io_err(err.into()))?;
    }
    writer.flush().map_err(io_err)?;

    info!(path = %destination.display(), "wrote descriptive statistics");
    Ok(())
}

/// Reads a flat file back. The header row is mandatory and every row must
/// have as many fields as the header; nothing is returned on failure.
pub fn load(source: &Path) -> Result<RawTable> {
    if !source.exists() {
        return Err(PipelineError::MissingFile {
            path: source.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(source)
        .map_err(|err| classify_csv_error(source, err))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| classify_csv_error(source, err))?
        .iter()
        .map(str::to_owned)
        .collect();
    if headers.iter().all(|header| header.trim().is_empty()) {
        return Err(PipelineError::malformed_file(source, "missing header row"));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| classify_csv_error(source, err))?;
        rows.push(record.iter().map(str::to_owned).collect());
    }

    info!(rows = rows.len(), path = %source.display(), "loaded trending dataset");
    Ok(RawTable {
        source: source.to_path_buf(),
        headers,
        rows,
    })
}

fn open_writer(destination: &Path) -> Result<csv::Writer<fs::File>> {
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = fs::File::create(destination).map_err(|source| PipelineError::Io {
        path: destination.to_path_buf(),
        source,
    })?;
    Ok(csv::Writer::from_writer(file))
}

/// Shape problems become `MalformedFile`; plain I/O failures stay `Io`.
fn classify_csv_error(path: &Path, err: csv::Error) -> PipelineError {
    match err.kind() {
        csv::ErrorKind::Io(_) => PipelineError::Io {
            path: path.to_path_buf(),
            source: err.into(),
        },
        _ => PipelineError::malformed_file(path, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::tempdir;

    fn sample_record(id: &str, tags: &[&str]) -> VideoRecord {
        VideoRecord {
            video_id: id.into(),
            title: format!("Title {id}"),
            description: "line one\nline two, with comma".into(),
            published_at: "2024-03-05T17:45:00Z".into(),
            channel_id: "UC123".into(),
            channel_title: "Channel".into(),
            category_id: Some(24),
            category_name: "Entertainment".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            duration: "PT4M13S".into(),
            definition: "hd".into(),
            caption: "false".into(),
            view_count: 1000,
            like_count: 50,
            dislike_count: 0,
            favorite_count: 0,
            comment_count: 7,
            country: Some("US".into()),
        }
    }

    #[test]
    fn persist_writes_header_in_column_order() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        persist(&[sample_record("a", &["x"])], &path)?;

        let raw = load(&path)?;
        assert_eq!(raw.headers, COLUMNS.map(String::from).to_vec());
        assert_eq!(raw.rows.len(), 1);
        assert_eq!(raw.rows[0][raw.column_index("tags").unwrap()], r#"["x"]"#);
        assert_eq!(
            raw.rows[0][raw.column_index("description").unwrap()],
            "line one\nline two, with comma"
        );
        Ok(())
    }

    #[test]
    fn persist_overwrites_previous_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("out.csv");
        persist(
            &[sample_record("a", &[]), sample_record("b", &[])],
            &path,
        )?;
        persist(&[sample_record("c", &[])], &path)?;

        let raw = load(&path)?;
        assert_eq!(raw.rows.len(), 1);
        assert_eq!(raw.rows[0][0], "c");
        Ok(())
    }

    #[test]
    fn persist_leaves_missing_optionals_empty() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        let mut record = sample_record("a", &[]);
        record.category_id = None;
        record.country = None;
        persist(&[record], &path)?;

        let raw = load(&path)?;
        assert_eq!(raw.rows[0][raw.column_index("category_id").unwrap()], "");
        assert_eq!(raw.rows[0][raw.column_index("country").unwrap()], "");
        assert_eq!(raw.rows[0][raw.column_index("tags").unwrap()], "[]");
        Ok(())
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingFile { .. }));
    }

    #[test]
    fn load_rejects_ragged_rows() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("ragged.csv");
        let mut file = fs::File::create(&path)?;
        write!(file, "a,b,c\n1,2,3\n4,5\n")?;

        let err = load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedFile { .. }));
        Ok(())
    }

    #[test]
    fn load_rejects_empty_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.csv");
        fs::File::create(&path)?;

        let err = load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedFile { .. }));
        Ok(())
    }
}
