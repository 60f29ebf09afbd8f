use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::context::PipelineContext;
use crate::dataset::common_structs::{Batch, ElementSpec, ParsedRecord};
use crate::dataset::data_loaders::tfrecord_loader::TfRecordLoader;
use crate::dataset::iterator_adapters::batching::Batching;
use crate::dataset::iterator_adapters::shuffling::Shuffling;
use crate::error::{PipelineError, Result};
use crate::preprocessing::{preprocess, TARGET_SIZE};

pub type BatchIter = Box<dyn Iterator<Item = Result<Batch>> + Send>;
type RecordIter = Box<dyn Iterator<Item = Result<ParsedRecord>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub batch_size: usize,
    /// Only used when `shuffle` is set
    pub shuffle_buffer_size: usize,
    pub shuffle: bool,
    pub preprocess: bool,
}

/// A lazy sequence of batches read from a list of record files.
///
/// Building a stream touches no file. Each call to [`RecordStream::batches`]
/// starts a new pass over the files: decode, optionally preprocess,
/// optionally shuffle, then batch.
pub struct RecordStream {
    paths: Vec<PathBuf>,
    options: StreamOptions,
    context: PipelineContext,
    spec: ElementSpec,
    passes: AtomicU64,
}

impl RecordStream {
    pub fn new(
        paths: Vec<PathBuf>,
        options: StreamOptions,
        context: &PipelineContext,
    ) -> Result<RecordStream> {
        if options.batch_size == 0 {
            return Err(PipelineError::InvalidArgument("batch_size must be positive".to_string()));
        }
        if options.shuffle && options.shuffle_buffer_size == 0 {
            return Err(PipelineError::InvalidArgument(
                "shuffle_buffer_size must be positive".to_string(),
            ));
        }
        let spec = if options.preprocess {
            ElementSpec::preprocessed(TARGET_SIZE, TARGET_SIZE)
        } else {
            ElementSpec::raw(context.decoder.image_dtype())
        };
        Ok(RecordStream {
            paths,
            options,
            context: context.clone(),
            spec,
            passes: AtomicU64::new(0),
        })
    }

    pub fn element_spec(&self) -> ElementSpec {
        self.spec
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn options(&self) -> StreamOptions {
        self.options
    }

    /// Starts a new pass over the stream
    pub fn batches(&self) -> BatchIter {
        let pass = self.passes.fetch_add(1, Ordering::Relaxed);
        debug!(
            files = self.paths.len(),
            pass,
            shuffle = self.options.shuffle,
            preprocess = self.options.preprocess,
            "starting pass over record stream"
        );

        let decoder = self.context.decoder.clone();
        let mut records: RecordIter = Box::new(
            TfRecordLoader::new(self.paths.clone(), self.context.verify_checksums)
                .map(move |raw| raw.and_then(|raw| decoder.decode(&raw))),
        );
        if self.options.preprocess {
            let resize = self.context.resize;
            records = Box::new(
                records.map(move |record| record.and_then(|record| preprocess(record, &resize))),
            );
        }
        if self.options.shuffle {
            // a different but reproducible order on every pass
            let seed = self.context.seed.map(|seed| seed.wrapping_add(pass));
            records = Box::new(records.shuffling(self.options.shuffle_buffer_size, seed));
        }
        Box::new(records.batching(self.options.batch_size).map(|batch| {
            batch
                .into_iter()
                .collect::<Result<Vec<_>>>()
                .map(Batch::from_records)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::common_structs::{DType, Image};
    use crate::dataset::data_loaders::example_decoder::RecordDecoder;
    use ndarray::Array3;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Decodes a record as one byte: the pixel value of a 2x2 image and its label
    #[derive(Default)]
    struct ByteDecoder {
        calls: AtomicUsize,
    }

    impl RecordDecoder for ByteDecoder {
        fn decode(&self, raw: &[u8]) -> Result<ParsedRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ParsedRecord {
                image: Image::U8(Array3::from_elem((2, 2, 1), raw[0])),
                location: vec![raw[0] as f32],
                label: vec![1.],
            })
        }

        fn image_dtype(&self) -> DType {
            DType::U8
        }
    }

    fn options(batch_size: usize, shuffle: bool, preprocess: bool) -> StreamOptions {
        StreamOptions {
            batch_size,
            shuffle_buffer_size: 4,
            shuffle,
            preprocess,
        }
    }

    fn fixture(name: &str, values: &[u8]) -> (crate::test_utils::TempDir, Vec<PathBuf>) {
        let dir = crate::test_utils::TempDir::new(name);
        let path = dir.write_records("records.rec", values.iter().map(|v| vec![*v]));
        (dir, vec![path])
    }

    fn locations(batch: &Batch) -> Vec<f32> {
        batch.locations().iter().map(|l| l[0]).collect()
    }

    #[test]
    fn stream_construction_is_lazy() {
        let decoder = Arc::new(ByteDecoder::default());
        let context = PipelineContext::new(decoder.clone());
        let stream = RecordStream::new(
            vec![PathBuf::from("/missing/file.rec")],
            options(2, true, true),
            &context,
        )
        .unwrap();
        let mut batches = stream.batches();
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(batches.next(), Some(Err(PipelineError::Io(_)))));
    }

    #[test]
    fn raw_stream_batches_in_file_order() {
        let (_dir, paths) = fixture("stream_raw", &[1, 2, 3, 4, 5]);
        let context = PipelineContext::new(Arc::new(ByteDecoder::default()));
        let stream = RecordStream::new(paths.clone(), options(2, false, false), &context).unwrap();
        assert_eq!(stream.paths(), paths.as_slice());
        assert_eq!(stream.options(), options(2, false, false));
        assert_eq!(stream.element_spec(), ElementSpec::raw(DType::U8));
        let batches: Vec<Batch> = stream.batches().map(|b| b.unwrap()).collect();
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(locations(&batches[0]), vec![1., 2.]);
        assert_eq!(locations(&batches[2]), vec![5.]);
        assert_eq!(batches[0].images()[0], Image::U8(Array3::from_elem((2, 2, 1), 1)));
    }

    #[test]
    fn preprocessed_shuffled_stream() {
        let values: Vec<u8> = (0..20).collect();
        let (_dir, paths) = fixture("stream_shuffled", &values);
        let context = PipelineContext::new(Arc::new(ByteDecoder::default())).with_seed(11);
        let stream = RecordStream::new(paths, options(6, true, true), &context).unwrap();
        assert_eq!(stream.element_spec(), ElementSpec::preprocessed(224, 224));

        let first_pass: Vec<Batch> = stream.batches().map(|b| b.unwrap()).collect();
        assert_eq!(first_pass.iter().map(Batch::len).collect::<Vec<_>>(), vec![6, 6, 6, 2]);
        let mut seen: Vec<f32> = first_pass.iter().flat_map(locations).collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, values.iter().map(|v| *v as f32).collect::<Vec<_>>());
        for batch in &first_pass {
            assert_eq!(batch.stacked_images().unwrap().dim(), (batch.len(), 224, 224, 1));
        }

        // a second pass still covers every record
        let second_pass: usize = stream.batches().map(|b| b.unwrap().len()).sum();
        assert_eq!(second_pass, values.len());
    }

    #[test]
    fn invalid_options_are_rejected() {
        let context = PipelineContext::new(Arc::new(ByteDecoder::default()));
        assert!(RecordStream::new(vec![], options(0, false, false), &context).is_err());
        let no_buffer = StreamOptions {
            shuffle_buffer_size: 0,
            ..options(1, true, false)
        };
        assert!(RecordStream::new(vec![], no_buffer, &context).is_err());
        let unused_buffer = StreamOptions {
            shuffle_buffer_size: 0,
            ..options(1, false, false)
        };
        assert!(RecordStream::new(vec![], unused_buffer, &context).is_ok());
    }
}
