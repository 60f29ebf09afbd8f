use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait Shuffling: Iterator {
    /// Buffered shuffle: keeps up to `max_elements_to_buffer` elements and
    /// emits a random one of them each time, refilling its slot from the
    /// underlying iterator.
    fn shuffling(self, max_elements_to_buffer: usize, seed: Option<u64>) -> Shuffler<Self>
    where
        Self: std::marker::Sized,
    {
        assert!(max_elements_to_buffer > 0, "shuffle buffer must hold at least one element");
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Shuffler {
            iterator: self,
            max_elements_to_buffer,
            buffer: Vec::with_capacity(max_elements_to_buffer.min(4096)),
            rng,
        }
    }
}

pub struct Shuffler<T: Iterator> {
    iterator: T,
    max_elements_to_buffer: usize,
    buffer: Vec<T::Item>,
    rng: StdRng,
}

impl<T: Iterator> Iterator for Shuffler<T> {
    type Item = T::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.fill_buffer_if_needed();
        if self.buffer.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.buffer.len());
        match self.iterator.next() {
            Some(element) => Some(std::mem::replace(&mut self.buffer[index], element)),
            None => Some(self.buffer.swap_remove(index)),
        }
    }
}

impl<T: Iterator> Shuffler<T> {
    fn fill_buffer_if_needed(&mut self) {
        while self.buffer.len() < self.max_elements_to_buffer {
            match self.iterator.next() {
                None => break,
                Some(element) => self.buffer.push(element),
            }
        }
    }
}

impl<T: ?Sized> Shuffling for T where T: Iterator {}
