use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::context::PipelineContext;
use crate::dataset::common_structs::{Batch, Split};
use crate::dataset::iterator::{Initializer, ReinitializableIterator};
use crate::dataset::stream::{RecordStream, StreamOptions};
use crate::error::Result;

/// Every entry of `dir` (not recursive), joined with `dir`, in the order the
/// platform lists them
pub fn list_record_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::read_dir(dir)?
        .map(|entry| Ok(dir.join(entry?.file_name())))
        .collect()
}

/// Two iterators and the six initializers that point them at the splits.
///
/// `iterator` serves the preprocessed streams, `iterator_raw` the raw ones.
/// Nothing has been read when this is returned; run an initializer, then
/// pull batches.
pub struct PreparedData {
    pub iterator: ReinitializableIterator,
    pub init_dataset_train: Initializer,
    pub init_dataset_valid: Initializer,
    pub init_dataset_test: Initializer,

    pub iterator_raw: ReinitializableIterator,
    pub init_dataset_train_raw: Initializer,
    pub init_dataset_valid_raw: Initializer,
    pub init_dataset_test_raw: Initializer,
}

impl PreparedData {
    /// Next preprocessed batch; its `images()`, `locations()` and `labels()`
    pub fn next_batch(&mut self) -> Result<Batch> {
        self.iterator.get_next()
    }

    pub fn next_raw_batch(&mut self) -> Result<Batch> {
        self.iterator_raw.get_next()
    }

    pub fn initialize(&mut self, split: Split) -> Result<()> {
        let initializer = match split {
            Split::Train => &self.init_dataset_train,
            Split::Valid => &self.init_dataset_valid,
            Split::Test => &self.init_dataset_test,
        };
        self.iterator.initialize(initializer)
    }

    pub fn initialize_raw(&mut self, split: Split) -> Result<()> {
        let initializer = match split {
            Split::Train => &self.init_dataset_train_raw,
            Split::Valid => &self.init_dataset_valid_raw,
            Split::Test => &self.init_dataset_test_raw,
        };
        self.iterator_raw.initialize(initializer)
    }
}

pub fn prepare_data_from_tfrecord<P: AsRef<Path>>(
    context: &PipelineContext,
    tfrecord_train_dir: P,
    tfrecord_valid_dir: P,
    tfrecord_test_dir: P,
    batch_size: usize,
    shuffle_buffer_size: usize,
) -> Result<PreparedData> {
    let dirs = [
        (Split::Train, tfrecord_train_dir.as_ref()),
        (Split::Valid, tfrecord_valid_dir.as_ref()),
        (Split::Test, tfrecord_test_dir.as_ref()),
    ];
    let mut path_lists = Vec::with_capacity(dirs.len());
    for (split, dir) in dirs.iter() {
        let paths = list_record_files(dir)?;
        if paths.is_empty() {
            warn!(%split, dir = %dir.display(), "no record files found");
        }
        info!(%split, files = paths.len(), "listed record files");
        path_lists.push(paths);
    }

    let stream = |paths: &[PathBuf], shuffle: bool, preprocess: bool| -> Result<Arc<RecordStream>> {
        let options = StreamOptions {
            batch_size,
            shuffle_buffer_size,
            shuffle,
            preprocess,
        };
        Ok(Arc::new(RecordStream::new(paths.to_vec(), options, context)?))
    };

    let dataset_train = stream(&path_lists[0], true, true)?;
    let dataset_valid = stream(&path_lists[1], false, true)?;
    let dataset_test = stream(&path_lists[2], false, true)?;

    // raw streams are never shuffled, not even for training
    let dataset_train_raw = stream(&path_lists[0], false, false)?;
    let dataset_valid_raw = stream(&path_lists[1], false, false)?;
    let dataset_test_raw = stream(&path_lists[2], false, false)?;

    let iterator = ReinitializableIterator::from_spec(dataset_train.element_spec());
    let iterator_raw = ReinitializableIterator::from_spec(dataset_train_raw.element_spec());

    let prepared = PreparedData {
        init_dataset_train: iterator.make_initializer(Split::Train, dataset_train)?,
        init_dataset_valid: iterator.make_initializer(Split::Valid, dataset_valid)?,
        init_dataset_test: iterator.make_initializer(Split::Test, dataset_test)?,
        init_dataset_train_raw: iterator_raw.make_initializer(Split::Train, dataset_train_raw)?,
        init_dataset_valid_raw: iterator_raw.make_initializer(Split::Valid, dataset_valid_raw)?,
        init_dataset_test_raw: iterator_raw.make_initializer(Split::Test, dataset_test_raw)?,
        iterator,
        iterator_raw,
    };
    info!(
        batch_size,
        shuffle_buffer_size,
        spec = %prepared.iterator.element_spec(),
        raw_spec = %prepared.iterator_raw.element_spec(),
        "prepared datasets"
    );
    Ok(prepared)
}

pub fn prepare_data_from_config(config: &PipelineConfig) -> Result<PreparedData> {
    prepare_data_from_tfrecord(
        &PipelineContext::from_config(config),
        &config.train_dir,
        &config.valid_dir,
        &config.test_dir,
        config.batch_size,
        config.shuffle_buffer_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::test_utils::TempDir;
    use std::collections::HashSet;

    #[test]
    fn lists_every_entry_joined_with_the_directory() {
        let dir = TempDir::new("prepare_listing");
        for name in ["a.rec", "b.rec", "c.tfrecord"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let listed: HashSet<PathBuf> = list_record_files(dir.path()).unwrap().into_iter().collect();
        let expected: HashSet<PathBuf> = ["a.rec", "b.rec", "c.tfrecord"]
            .iter()
            .map(|name| dir.path().join(name))
            .collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn missing_directory_fails() {
        let dir = TempDir::new("prepare_missing");
        let missing = dir.path().join("nope");
        assert!(matches!(list_record_files(&missing), Err(PipelineError::Io(_))));
        let result = prepare_data_from_tfrecord(
            &PipelineContext::default(),
            dir.path(),
            missing.as_path(),
            dir.path(),
            2,
            10,
        );
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[test]
    fn preparation_reads_no_records() {
        let dir = TempDir::new("prepare_lazy");
        // garbage that would fail to parse as soon as it is read
        fs::write(dir.path().join("broken.rec"), b"not a record").unwrap();
        let mut prepared = prepare_data_from_tfrecord(
            &PipelineContext::default(),
            dir.path(),
            dir.path(),
            dir.path(),
            2,
            10,
        )
        .unwrap();
        assert!(matches!(prepared.next_batch(), Err(PipelineError::Uninitialized)));
        prepared.initialize(Split::Valid).unwrap();
        assert!(matches!(prepared.next_batch(), Err(PipelineError::CorruptRecord { .. })));
    }
}
