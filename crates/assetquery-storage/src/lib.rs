pub mod mem;
pub mod snapshot;
pub mod traits;

pub use mem::InMemoryStore;
pub use snapshot::{read_snapshot, SnapshotFormat, SnapshotWriter};
pub use traits::*;
