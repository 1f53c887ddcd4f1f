//! Cached file contents and the line/column <-> byte offset index over them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::location::{FileLocationRange, Location};
use crate::snapshot::{Backend, Snapshot};

/// Byte offset of the first character of each line.
pub fn compute_line_offsets(text: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    offsets.extend(text.match_indices('\n').map(|(i, _)| i + 1));
    offsets
}

/// Converts a byte offset into a location using precomputed line offsets.
pub fn offset_to_location(line_offsets: &[usize], offset: usize) -> Location {
    let line = line_offsets.partition_point(|&start| start <= offset).max(1);
    Location::new(line, offset - line_offsets[line - 1])
}

/// The contents of one file together with its line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    text: String,
    line_offsets: Vec<usize>,
}

impl SourceFile {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_offsets = compute_line_offsets(&text);
        SourceFile { text, line_offsets }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_offsets(&self) -> &[usize] {
        &self.line_offsets
    }

    pub fn num_lines(&self) -> usize {
        self.line_offsets.len()
    }

    /// Offset one past the last character of `line`, excluding its newline.
    fn line_end(&self, line: usize) -> usize {
        match self.line_offsets.get(line) {
            Some(next) => next - 1,
            None => self.text.len(),
        }
    }

    pub fn line_col_to_offset(&self, line: usize, column: usize) -> Result<usize> {
        if line == 0 || line > self.num_lines() {
            return Err(Error::BadFormat(format!(
                "line {} is out of range (file has {} lines)",
                line,
                self.num_lines()
            )));
        }
        let offset = self.line_offsets[line - 1] + column;
        if offset > self.line_end(line) || !self.text.is_char_boundary(offset) {
            return Err(Error::BadFormat(format!("column {} is out of range on line {}", column, line)));
        }
        Ok(offset)
    }

    pub fn offset(&self, location: Location) -> Result<usize> {
        self.line_col_to_offset(location.line, location.column)
    }

    pub fn offset_to_line_col(&self, offset: usize) -> Result<Location> {
        if offset > self.text.len() {
            return Err(Error::BadFormat(format!("offset {} is beyond end of file", offset)));
        }
        Ok(offset_to_location(&self.line_offsets, offset))
    }

    /// The text of `line`, without its trailing newline.
    pub fn line(&self, line: usize) -> Result<&str> {
        let start = self.line_col_to_offset(line, 0)?;
        Ok(&self.text[start..self.line_end(line)])
    }

    /// The characters covered by `location`.
    pub fn chars(&self, location: &FileLocationRange) -> Result<&str> {
        let start = self.offset(location.start())?;
        let stop = self.offset(location.stop())?;
        self.text
            .get(start..stop)
            .ok_or_else(|| Error::BadFormat(format!("range stops before it starts: {}", location)))
    }
}

/// Per-(snapshot, file) cache of source files fetched from the backend.
pub struct SourceCache {
    backend: Arc<dyn Backend>,
    files: Mutex<HashMap<(String, String), Arc<SourceFile>>>,
}

impl SourceCache {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        SourceCache {
            backend,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches a file, consulting the cache first.
    pub fn file(&self, snapshot: &Snapshot, filepath: &str) -> Result<Arc<SourceFile>> {
        let key = (snapshot.name.clone(), filepath.to_string());
        if let Some(file) = self.files.lock().get(&key) {
            return Ok(Arc::clone(file));
        }

        // the lock is not held while the backend is busy
        debug!(snapshot = %snapshot.name, file = filepath, "reading file from backend");
        let file = Arc::new(SourceFile::new(self.backend.read_file(snapshot, filepath)?));
        let mut files = self.files.lock();
        Ok(Arc::clone(files.entry(key).or_insert(file)))
    }

    pub fn read(&self, snapshot: &Snapshot, filepath: &str) -> Result<String> {
        Ok(self.file(snapshot, filepath)?.text().to_string())
    }

    pub fn line_offsets(&self, snapshot: &Snapshot, filepath: &str) -> Result<Vec<usize>> {
        Ok(self.file(snapshot, filepath)?.line_offsets().to_vec())
    }

    pub fn num_lines(&self, snapshot: &Snapshot, filepath: &str) -> Result<usize> {
        Ok(self.file(snapshot, filepath)?.num_lines())
    }

    pub fn line_col_to_offset(&self, snapshot: &Snapshot, filepath: &str, line: usize, column: usize) -> Result<usize> {
        self.file(snapshot, filepath)?.line_col_to_offset(line, column)
    }

    pub fn offset_to_line_col(&self, snapshot: &Snapshot, filepath: &str, offset: usize) -> Result<Location> {
        self.file(snapshot, filepath)?.offset_to_line_col(offset)
    }

    pub fn read_line(&self, snapshot: &Snapshot, filepath: &str, line: usize) -> Result<String> {
        Ok(self.file(snapshot, filepath)?.line(line)?.to_string())
    }

    pub fn read_chars(&self, snapshot: &Snapshot, location: &FileLocationRange) -> Result<String> {
        Ok(self.file(snapshot, &location.filename)?.chars(location)?.to_string())
    }

    /// Warms the cache for every file in `filepaths`.
    pub fn prefetch<'a>(&self, snapshot: &Snapshot, filepaths: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for filepath in filepaths {
            self.file(snapshot, filepath)?;
        }
        Ok(())
    }

    pub fn forget(&self, snapshot: &Snapshot, filepath: &str) {
        self.files
            .lock()
            .remove(&(snapshot.name.clone(), filepath.to_string()));
    }

    pub fn forget_snapshot(&self, snapshot_name: &str) {
        self.files.lock().retain(|(name, _), _| name != snapshot_name);
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}
