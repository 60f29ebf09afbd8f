pub mod batching;
pub mod shuffling;
