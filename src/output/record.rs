use crate::output::{OutputError, OutputResult};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// A CSV record file with a fixed header
///
/// Each record is flushed as it is written, so an interrupted crawl still
/// leaves every delivered item on disk.
pub struct RecordWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl RecordWriter {
    /// Creates `<base>.csv`, creating missing parent folders, and writes the header
    pub fn create(base: &Path, header: &[&str]) -> OutputResult<Self> {
        let mut path = base.as_os_str().to_owned();
        path.push(".csv");
        let path = PathBuf::from(path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| OutputError::FolderCreation {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header)?;
        writer.flush()?;
        tracing::info!("Created a new record file at: {}", path.display());

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written, header excluded
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn add<I, T>(&mut self, record: I) -> OutputResult<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_file_layout() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("jane.doe").join("likes");

        let mut record = RecordWriter::create(&base, &["name", "url"]).unwrap();
        record.add(["Rust", "https://example.com/rust"]).unwrap();
        record
            .add(["Quotes, \"and\" commas", "https://example.com/q"])
            .unwrap();
        assert_eq!(record.rows(), 2);

        let path = dir.path().join("jane.doe").join("likes.csv");
        assert_eq!(record.path(), path.as_path());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "name,url");
        assert_eq!(lines[1], "Rust,https://example.com/rust");
        assert_eq!(lines[2], "\"Quotes, \"\"and\"\" commas\",https://example.com/q");
    }
}
