//! Sample decoding and the producer/consumer handoff queue.

pub mod normalize;
pub mod queue;

pub use normalize::{parse_frame, smoothstep, Normalizer, Sample};
pub use queue::ValueQueue;
