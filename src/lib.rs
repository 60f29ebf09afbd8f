//! Turns three directories of TFRecord files (train, valid, test) into
//! rebindable batch iterators, with an optional resize-and-normalize step for
//! the images.
//!
//! ```no_run
//! use recordloader::config::PipelineConfig;
//! use recordloader::dataset::common_structs::Split;
//! use recordloader::dataset::prepare::prepare_data_from_config;
//!
//! # fn main() -> recordloader::error::Result<()> {
//! let mut data = prepare_data_from_config(&PipelineConfig::default())?;
//! data.initialize(Split::Train)?;
//! let batch = data.next_batch()?;
//! println!("{} images", batch.images().len());
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod context;
pub mod dataset;
pub mod error;
pub mod preprocessing;

#[cfg(test)]
mod test_utils;
