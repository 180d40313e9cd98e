//! Mock collaborators for tests.
//!
//! Available to unit tests and, with the `test-support` feature, to the
//! integration tests under `tests/`.

pub mod clock;
pub mod content;
pub mod dht;
pub mod handler;
pub mod mirror;

pub use clock::MockClock;
pub use content::MockContentStore;
pub use dht::{MockDht, MockDhtFailure};
pub use handler::{HandledCall, RecordingAcks, RecordingHandler};
pub use mirror::MockMirror;
