pub mod harness;

pub use harness::{init_tracing, InboxHarness, Node};
