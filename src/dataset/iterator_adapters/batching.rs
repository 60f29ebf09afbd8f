pub trait Batching: Iterator {
    /// Groups consecutive elements into `Vec`s of `batch_size`.
    /// The last batch holds whatever is left (1..=batch_size elements).
    fn batching(self, batch_size: usize) -> Batcher<Self>
    where
        Self: std::marker::Sized,
    {
        assert!(batch_size > 0, "batch_size must be positive");
        Batcher {
            iterator: self,
            batch_size,
        }
    }
}

pub struct Batcher<T: Iterator> {
    iterator: T,
    batch_size: usize,
}

impl<T: Iterator> Iterator for Batcher<T> {
    type Item = Vec<T::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut output = Vec::with_capacity(self.batch_size);
        for _i in 0..self.batch_size {
            match self.iterator.next() {
                Some(element) => output.push(element),
                None => break,
            }
        }
        if output.is_empty() {
            None
        } else {
            Some(output)
        }
    }
}

impl<T: ?Sized> Batching for T where T: Iterator {}
