//! A cursor that can be re-pointed at any stream sharing its element spec.
//!
//! ```text
//! Unbound --initialize(x)--> Bound(x) --initialize(y)--> Bound(y)
//! ```
//!
//! `get_next` fails while unbound, and fails with [`PipelineError::OutOfRange`]
//! once the bound stream is exhausted until an initializer is run again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::dataset::common_structs::{Batch, ElementSpec, Split};
use crate::dataset::stream::{BatchIter, RecordStream};
use crate::error::{PipelineError, Result};

static NEXT_ITERATOR_ID: AtomicU64 = AtomicU64::new(0);

enum IteratorState {
    Unbound,
    Bound {
        split: Split,
        batches: BatchIter,
        exhausted: bool,
    },
}

pub struct ReinitializableIterator {
    id: u64,
    spec: ElementSpec,
    state: IteratorState,
}

/// Binds one particular iterator to one particular stream
pub struct Initializer {
    iterator_id: u64,
    split: Split,
    stream: Arc<RecordStream>,
}

impl Initializer {
    pub fn split(&self) -> Split {
        self.split
    }

    pub fn stream(&self) -> &Arc<RecordStream> {
        &self.stream
    }

    pub fn run(&self, iterator: &mut ReinitializableIterator) -> Result<()> {
        iterator.initialize(self)
    }
}

impl ReinitializableIterator {
    pub fn from_spec(spec: ElementSpec) -> ReinitializableIterator {
        ReinitializableIterator {
            id: NEXT_ITERATOR_ID.fetch_add(1, Ordering::Relaxed),
            spec,
            state: IteratorState::Unbound,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn element_spec(&self) -> ElementSpec {
        self.spec
    }

    /// Split of the currently bound stream, `None` while unbound
    pub fn bound_split(&self) -> Option<Split> {
        match &self.state {
            IteratorState::Unbound => None,
            IteratorState::Bound { split, .. } => Some(*split),
        }
    }

    pub fn make_initializer(&self, split: Split, stream: Arc<RecordStream>) -> Result<Initializer> {
        if stream.element_spec() != self.spec {
            return Err(PipelineError::ElementSpecMismatch {
                expected: self.spec,
                found: stream.element_spec(),
            });
        }
        Ok(Initializer {
            iterator_id: self.id,
            split,
            stream,
        })
    }

    /// Drops the current position and starts over at the first batch of the
    /// initializer's stream
    pub fn initialize(&mut self, initializer: &Initializer) -> Result<()> {
        if initializer.iterator_id != self.id {
            return Err(PipelineError::ForeignInitializer {
                owner: initializer.iterator_id,
                target: self.id,
            });
        }
        debug!(iterator = self.id, split = %initializer.split, "binding iterator");
        self.state = IteratorState::Bound {
            split: initializer.split,
            batches: initializer.stream.batches(),
            exhausted: false,
        };
        Ok(())
    }

    pub fn get_next(&mut self) -> Result<Batch> {
        match &mut self.state {
            IteratorState::Unbound => Err(PipelineError::Uninitialized),
            IteratorState::Bound { exhausted: true, .. } => Err(PipelineError::OutOfRange),
            IteratorState::Bound { batches, exhausted, .. } => match batches.next() {
                None => {
                    *exhausted = true;
                    Err(PipelineError::OutOfRange)
                }
                Some(Err(err)) => Err(err),
                Some(Ok(batch)) => {
                    let spec = self.spec;
                    if let Some(image) = batch.images().iter().find(|image| !spec.accepts(image)) {
                        return Err(PipelineError::ElementSpecMismatch {
                            expected: spec,
                            found: ElementSpec::of_image(image),
                        });
                    }
                    Ok(batch)
                }
            },
        }
    }

    /// Remaining batches of the bound stream, stops at the end of sequence
    pub fn batches(&mut self) -> impl Iterator<Item = Result<Batch>> + '_ {
        std::iter::from_fn(move || match self.get_next() {
            Err(PipelineError::OutOfRange) => None,
            other => Some(other),
        })
    }
}
