//! Helpers shared by the unit tests.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::dataset::data_loaders::tfrecord_loader::TfRecordWriter;

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// A fresh directory under the system temp dir, removed on drop
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(name: &str) -> TempDir {
        let path = std::env::temp_dir().join(format!(
            "recordloader_{}_{}_{}",
            name,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        TempDir { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one record file and returns its path
    pub fn write_records<I>(&self, name: &str, records: I) -> PathBuf
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let path = self.path.join(name);
        let mut writer = TfRecordWriter::create(&path).unwrap();
        for record in records {
            writer.write_record(&record).unwrap();
        }
        writer.into_inner().unwrap();
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
