pub mod example_decoder;
pub mod example_proto;
pub mod tfrecord_loader;
