mod storage;
mod writer;

pub use storage::{Storage, StoreError, TrackSnapshot};
pub use writer::{drain, PointSink, PointWriter};

#[cfg(test)]
pub use writer::testing;
