use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::dataset::data_loaders::example_decoder::{ExampleDecoder, RecordDecoder};
use crate::preprocessing::ResizeConfig;

/// Everything the streams need besides their file lists.
/// Passed explicitly to the dataset preparer and cloned into every stream.
#[derive(Clone)]
pub struct PipelineContext {
    pub decoder: Arc<dyn RecordDecoder>,
    pub resize: ResizeConfig,
    /// Seed of the shuffle buffer, `None` draws one from the OS on every pass
    pub seed: Option<u64>,
    pub verify_checksums: bool,
}

impl PipelineContext {
    pub fn new(decoder: Arc<dyn RecordDecoder>) -> PipelineContext {
        PipelineContext {
            decoder,
            resize: ResizeConfig::default(),
            seed: None,
            verify_checksums: true,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> PipelineContext {
        PipelineContext {
            decoder: Arc::new(ExampleDecoder::new(config.decoder.clone())),
            resize: config.resize,
            seed: config.seed,
            verify_checksums: config.verify_checksums,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> PipelineContext {
        self.seed = Some(seed);
        self
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        PipelineContext::new(Arc::new(ExampleDecoder::default()))
    }
}
