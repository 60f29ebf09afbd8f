use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use recordloader::config::PipelineConfig;
use recordloader::dataset::common_structs::Split;
use recordloader::dataset::data_loaders::tfrecord_loader::TfRecordLoader;
use recordloader::dataset::prepare::{list_record_files, prepare_data_from_config, PreparedData};
use recordloader::dataset::DataLoader;
use recordloader::error::PipelineError;
use tracing::info;

/// Runs every initializer of a prepared dataset and counts what comes out
#[derive(Debug, Parser)]
struct Args {
    /// Json config file, defaults are used for anything not set there
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    train_dir: Option<PathBuf>,
    #[arg(long)]
    valid_dir: Option<PathBuf>,
    #[arg(long)]
    test_dir: Option<PathBuf>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    shuffle_buffer_size: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Only check the record framing of every file, without decoding
    #[arg(long)]
    check_records: bool,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_path(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = self.train_dir {
            config.train_dir = dir;
        }
        if let Some(dir) = self.valid_dir {
            config.valid_dir = dir;
        }
        if let Some(dir) = self.test_dir {
            config.test_dir = dir;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(shuffle_buffer_size) = self.shuffle_buffer_size {
            config.shuffle_buffer_size = shuffle_buffer_size;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

#[derive(Debug, Default)]
struct Counts {
    batches: usize,
    records: usize,
}

fn drain(
    data: &mut PreparedData,
    raw: bool,
    split: Split,
) -> std::result::Result<Counts, PipelineError> {
    let mut counts = Counts::default();
    if raw {
        data.initialize_raw(split)?;
    } else {
        data.initialize(split)?;
    }
    loop {
        let batch = if raw {
            data.next_raw_batch()
        } else {
            data.next_batch()
        };
        match batch {
            Ok(batch) => {
                counts.batches += 1;
                counts.records += batch.len();
            }
            Err(PipelineError::OutOfRange) => return Ok(counts),
            Err(err) => return Err(err),
        }
    }
}

fn check_records(config: &PipelineConfig) -> Result<()> {
    let dirs = [
        (Split::Train, &config.train_dir),
        (Split::Valid, &config.valid_dir),
        (Split::Test, &config.test_dir),
    ];
    for (split, dir) in dirs.iter() {
        let paths = list_record_files(dir).with_context(|| format!("listing {}", dir.display()))?;
        let mut loader = TfRecordLoader::new(paths, config.verify_checksums);
        let mut records = 0;
        while let Some(record) = loader.next() {
            record.with_context(|| format!("reading {} split", split))?;
            records += 1;
            if records % 10_000 == 0 {
                info!(
                    %split,
                    records,
                    "file {}/{}",
                    loader.next_element_index(),
                    loader.max_elem_index()
                );
            }
        }
        println!(
            "{:>5}: {} files, {} records",
            split.to_string(),
            loader.max_elem_index(),
            records
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("recordloader=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let check_only = args.check_records;
    let config = args.into_config()?;

    if check_only {
        return check_records(&config);
    }

    let mut data = prepare_data_from_config(&config)?;
    let initializers = [
        &data.init_dataset_train,
        &data.init_dataset_valid,
        &data.init_dataset_test,
    ];
    for initializer in initializers {
        println!(
            "{:>5}: {} files",
            initializer.split().to_string(),
            initializer.stream().paths().len()
        );
    }
    for raw in [false, true] {
        for split in Split::ALL {
            let counts = drain(&mut data, raw, split)
                .with_context(|| format!("iterating {} split (raw: {})", split, raw))?;
            println!(
                "{:>5}{}: {} batches, {} records",
                split.to_string(),
                if raw { " raw" } else { "" },
                counts.batches,
                counts.records
            );
        }
    }
    Ok(())
}
