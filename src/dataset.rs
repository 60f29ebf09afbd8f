pub mod common_structs;

pub mod data_loaders;
pub mod iterator;
pub mod iterator_adapters;
pub mod prepare;
pub mod stream;

/// Extends the iterator trait to make sure the loader has methods to display progress
pub trait DataLoader: Iterator {
    /// Returns the index of the next file to be opened, starting from 0
    fn next_element_index(&self) -> usize;
    /// Returns the number of files to be loaded
    fn max_elem_index(&self) -> usize;
}
