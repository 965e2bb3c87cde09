//! Delimited file I/O
//!
//! Input files may be gzip-compressed; compression is detected from the
//! magic bytes rather than the file name. Output is written uncompressed
//! while a run is in progress and compressed in place once it finishes.

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum TabularError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: no column named {column}")]
    MissingColumn { path: PathBuf, column: String },
}

impl TabularError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| TabularError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path) -> impl FnOnce(csv::Error) -> Self + '_ {
        move |source| TabularError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Open a file for reading, decompressing it if it starts with the gzip magic
pub fn open_input(path: &Path) -> Result<Box<dyn Read + Send>, TabularError> {
    let file = File::open(path).map_err(TabularError::io(path))?;
    let mut reader = BufReader::new(file);
    let head = reader.fill_buf().map_err(TabularError::io(path))?;

    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

fn csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader)
}

/// Count data rows (header excluded)
pub fn count_rows(path: &Path, delimiter: u8) -> Result<u64, TabularError> {
    let mut reader = csv_reader(open_input(path)?, delimiter);
    let mut record = csv::ByteRecord::new();
    let mut count = 0;
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => count += 1,
            Ok(false) => break,
            Err(e) if e.is_io_error() => return Err(TabularError::csv(path)(e)),
            // Malformed rows still count toward progress
            Err(_) => count += 1,
        }
    }
    Ok(count)
}

/// One input row reduced to the two selected columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    /// 1-based data row number
    pub line: u64,
    pub id: String,
    pub text: String,
}

/// Reads the identifier and text columns of a delimited file
pub struct RowReader {
    path: PathBuf,
    reader: csv::Reader<Box<dyn Read + Send>>,
    id_pos: usize,
    text_pos: usize,
    record: csv::StringRecord,
    line: u64,
}

impl RowReader {
    pub fn open(
        path: &Path,
        delimiter: u8,
        id_col: &str,
        text_col: &str,
    ) -> Result<Self, TabularError> {
        let mut reader = csv_reader(open_input(path)?, delimiter);
        let headers = reader.headers().map_err(TabularError::csv(path))?.clone();
        let position = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| TabularError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })
        };

        Ok(Self {
            path: path.to_path_buf(),
            id_pos: position(id_col)?,
            text_pos: position(text_col)?,
            reader,
            record: csv::StringRecord::new(),
            line: 0,
        })
    }

    /// Next row
    ///
    /// `Some(Ok(Err(line)))` is a row that could not be decoded (bad UTF-8,
    /// missing cells) and should be skipped; `Some(Err(_))` is a read
    /// failure on the file itself.
    pub fn next_row(&mut self) -> Option<Result<Result<InputRow, u64>, TabularError>> {
        match self.reader.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                self.line += 1;
                let row = match (self.record.get(self.id_pos), self.record.get(self.text_pos)) {
                    (Some(id), Some(text)) => Ok(InputRow {
                        line: self.line,
                        id: id.to_string(),
                        text: text.to_string(),
                    }),
                    _ => Err(self.line),
                };
                Some(Ok(row))
            }
            Err(e) if e.is_io_error() => Some(Err(TabularError::csv(&self.path)(e))),
            Err(_) => {
                self.line += 1;
                Some(Ok(Err(self.line)))
            }
        }
    }
}

/// Writes the identifier column plus a fixed set of appended columns
pub struct RowWriter {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
    width: usize,
    absent: String,
}

impl RowWriter {
    pub fn create(
        path: &Path,
        delimiter: u8,
        id_col: &str,
        columns: &[String],
        absent: &str,
    ) -> Result<Self, TabularError> {
        let file = File::create(path).map_err(TabularError::io(path))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(BufWriter::new(file));

        let header = std::iter::once(id_col).chain(columns.iter().map(String::as_str));
        writer.write_record(header).map_err(TabularError::csv(path))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            width: columns.len(),
            absent: absent.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one row; `None` cells and missing trailing cells become the
    /// absent marker
    pub fn write_row(&mut self, id: &str, cells: &[Option<String>]) -> Result<(), TabularError> {
        let absent = self.absent.as_str();
        let cells = (0..self.width).map(|i| {
            cells
                .get(i)
                .and_then(|c| c.as_deref())
                .unwrap_or(absent)
        });
        self.writer
            .write_record(std::iter::once(id).chain(cells))
            .map_err(TabularError::csv(&self.path))
    }

    pub fn flush(&mut self) -> Result<(), TabularError> {
        self.writer.flush().map_err(TabularError::io(&self.path))
    }

    /// Flush and close the file
    pub fn close(self) -> Result<PathBuf, TabularError> {
        let path = self.path;
        let mut inner = self
            .writer
            .into_inner()
            .map_err(|e| TabularError::io(&path)(io::Error::other(e.to_string())))?;
        inner.flush().map_err(TabularError::io(&path))?;
        Ok(path)
    }
}

/// Gzip `path` to `path.gz` and remove the uncompressed file
pub fn compress_outfile(path: &Path) -> Result<PathBuf, TabularError> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let mut input = File::open(path).map_err(TabularError::io(path))?;
    let output = File::create(&target).map_err(TabularError::io(&target))?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder).map_err(TabularError::io(&target))?;
    encoder
        .finish()
        .and_then(|mut w| w.flush())
        .map_err(TabularError::io(&target))?;

    fs::remove_file(path).map_err(TabularError::io(path))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    const CSV: &str = "id,user,text\n1,a,The cat eats\n2,b,\"Hello, world\"\n3,c,Bye\n";

    #[test]
    fn test_reader_selects_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, CSV).unwrap();

        let mut reader = RowReader::open(&path, b',', "id", "text").unwrap();
        let first = reader.next_row().unwrap().unwrap().unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(first.text, "The cat eats");
        let second = reader.next_row().unwrap().unwrap().unwrap();
        assert_eq!(second.text, "Hello, world");
        assert_eq!(second.line, 2);
        assert!(reader.next_row().unwrap().is_ok());
        assert!(reader.next_row().is_none());

        assert_eq!(count_rows(&path, b',').unwrap(), 3);
    }

    #[test]
    fn test_gzip_input_detected_by_content() {
        let dir = tempfile::tempdir().unwrap();
        // No .gz suffix on purpose
        let path = dir.path().join("in.csv");
        fs::write(&path, gzip(CSV.as_bytes())).unwrap();

        assert_eq!(count_rows(&path, b',').unwrap(), 3);
        let mut reader = RowReader::open(&path, b',', "id", "text").unwrap();
        assert_eq!(reader.next_row().unwrap().unwrap().unwrap().id, "1");
    }

    #[test]
    fn test_missing_column_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, CSV).unwrap();

        assert!(matches!(
            RowReader::open(&path, b',', "id", "body"),
            Err(TabularError::MissingColumn { column, .. }) if column == "body"
        ));
        assert!(matches!(
            RowReader::open(&dir.path().join("nope.csv"), b',', "id", "text"),
            Err(TabularError::Io { .. })
        ));
    }

    #[test]
    fn test_short_row_is_skippable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.tsv");
        fs::write(&path, "id\ttext\n1\n2\tok\n").unwrap();

        let mut reader = RowReader::open(&path, b'\t', "id", "text").unwrap();
        assert_eq!(reader.next_row().unwrap().unwrap(), Err(1));
        assert_eq!(reader.next_row().unwrap().unwrap().unwrap().text, "ok");
    }

    #[test]
    fn test_writer_and_compression() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let columns = vec!["a".to_string(), "b".to_string()];

        let mut writer = RowWriter::create(&path, b',', "id", &columns, "NA").unwrap();
        writer.write_row("1", &[Some("x".into()), None]).unwrap();
        writer.write_row("2", &[None]).unwrap();
        let closed = writer.close().unwrap();
        assert_eq!(closed, path);

        let gz = compress_outfile(&path).unwrap();
        assert_eq!(gz, dir.path().join("out.csv.gz"));
        assert!(!path.exists());

        let mut text = String::new();
        MultiGzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "id,a,b\n1,x,NA\n2,NA,NA\n");
    }
}
