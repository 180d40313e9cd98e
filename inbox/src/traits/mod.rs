//! Trait abstractions for the collaborators of the offline messaging core.
//!
//! The DHT, the content-addressed store, the HTTPS mirror client and the
//! clock are injected so the retrieval pipeline can be exercised without a
//! network.

pub mod clock;
pub mod content;
pub mod dht;
pub mod mirror;

pub use clock::{Clock, SystemClock};
pub use content::ContentStore;
pub use dht::PointerDht;
pub use mirror::{HttpsMirror, MirrorClient};
