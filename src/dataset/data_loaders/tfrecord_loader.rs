//! Reader and writer for the TFRecord framing.
//!
//! Every record on disk is laid out as
//!
//! ```text
//! u64 length (little endian)
//! u32 masked crc32c of the 8 length bytes
//! [u8; length] data
//! u32 masked crc32c of data
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dataset::DataLoader;
use crate::error::{PipelineError, Result};

const MASK_DELTA: u32 = 0xa282_ead8;

pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Lazily reads the records of a list of files, one file after the other.
/// A file is only opened once the previous one has been fully read.
pub struct TfRecordLoader {
    paths: Vec<PathBuf>,
    verify_checksums: bool,
    next_file_index: usize,
    current: Option<(PathBuf, BufReader<File>)>,
    failed: bool,
}

impl TfRecordLoader {
    pub fn new(paths: Vec<PathBuf>, verify_checksums: bool) -> TfRecordLoader {
        TfRecordLoader {
            paths,
            verify_checksums,
            next_file_index: 0,
            current: None,
            failed: false,
        }
    }

    fn open_next_file(&mut self) -> Option<Result<()>> {
        let path = self.paths.get(self.next_file_index)?.clone();
        self.next_file_index += 1;
        debug!(path = %path.display(), "opening record file");
        Some(File::open(&path).map_err(PipelineError::from).map(|file| {
            self.current = Some((path, BufReader::new(file)));
        }))
    }
}

impl Iterator for TfRecordLoader {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if self.current.is_none() {
                if let Err(err) = self.open_next_file()? {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
            let (path, reader) = self.current.as_mut()?;
            match read_record(reader, path.as_path(), self.verify_checksums) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => self.current = None,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl DataLoader for TfRecordLoader {
    fn next_element_index(&self) -> usize {
        self.next_file_index
    }

    fn max_elem_index(&self) -> usize {
        self.paths.len()
    }
}

/// Reads one record. `Ok(None)` on a clean end of file.
fn read_record<R: Read>(
    reader: &mut R,
    path: &Path,
    verify_checksums: bool,
) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; 12];
    let header_bytes = read_fully(reader, &mut header)?;
    if header_bytes == 0 {
        return Ok(None);
    }
    if header_bytes < header.len() {
        return Err(corrupt(path, "truncated record header"));
    }
    let (length_bytes, length_crc) = header.split_at(8);
    if verify_checksums && masked_crc32c(length_bytes) != le_u32(length_crc) {
        return Err(corrupt(path, "length checksum mismatch"));
    }
    let mut length_le = [0u8; 8];
    length_le.copy_from_slice(length_bytes);
    let length = usize::try_from(u64::from_le_bytes(length_le))
        .map_err(|_| corrupt(path, "record length does not fit in memory"))?;

    let mut data = Vec::new();
    let data_bytes = (&mut *reader).take(length as u64).read_to_end(&mut data)?;
    if data_bytes < length {
        return Err(corrupt(path, "truncated record data"));
    }
    let mut footer = [0u8; 4];
    if read_fully(reader, &mut footer)? < footer.len() {
        return Err(corrupt(path, "truncated record footer"));
    }
    if verify_checksums && masked_crc32c(&data) != le_u32(&footer) {
        return Err(corrupt(path, "data checksum mismatch"));
    }
    Ok(Some(data))
}

// Like read_exact, but reports how many bytes were read before EOF.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut le = [0u8; 4];
    le.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(le)
}

fn corrupt(path: &Path, reason: &str) -> PipelineError {
    PipelineError::CorruptRecord {
        path: path.to_owned(),
        reason: reason.to_string(),
    }
}

/// Writes records in the TFRecord framing, used to produce fixtures
pub struct TfRecordWriter<W: Write> {
    writer: W,
}

impl TfRecordWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(TfRecordWriter::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> TfRecordWriter<W> {
    pub fn new(writer: W) -> Self {
        TfRecordWriter { writer }
    }

    pub fn write_record(&mut self, data: &[u8]) -> io::Result<()> {
        let length = (data.len() as u64).to_le_bytes();
        self.writer.write_all(&length)?;
        self.writer.write_all(&masked_crc32c(&length).to_le_bytes())?;
        self.writer.write_all(data)?;
        self.writer.write_all(&masked_crc32c(data).to_le_bytes())
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
