use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::data_loaders::example_decoder::ExampleDecoderConfig;
use crate::error::Result;
use crate::preprocessing::ResizeConfig;

/// Settings of one dataset preparation, read from a json file.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub train_dir: PathBuf,
    pub valid_dir: PathBuf,
    pub test_dir: PathBuf,
    pub batch_size: usize,
    pub shuffle_buffer_size: usize,
    pub seed: Option<u64>,
    pub verify_checksums: bool,
    pub decoder: ExampleDecoderConfig,
    pub resize: ResizeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            train_dir: PathBuf::from("tfrecords/train"),
            valid_dir: PathBuf::from("tfrecords/valid"),
            test_dir: PathBuf::from("tfrecords/test"),
            batch_size: 64,
            shuffle_buffer_size: 5000,
            seed: None,
            verify_checksums: true,
            decoder: ExampleDecoderConfig::default(),
            resize: ResizeConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
