pub mod lines;
pub mod relay;
pub mod sse;

pub use relay::{RelayAccumulator, StreamRelay};
