//! Concurrent FIFO fan-out queues that connect the nodes of a media-processing
//! dataflow graph.
//!
//! A [`Fifo`] is a bounded or unbounded queue with condition-variable
//! backpressure. FIFOs can be wired together with [`mirror`]: every item
//! pushed into a source FIFO is also pushed into every FIFO mirrored from it,
//! forming an arbitrary, dynamically reconfigurable fan-out topology.

mod error;
mod flags;
mod handle_list;
mod item;

pub mod fifo;
pub mod frame;
pub mod packet;

pub use self::error::{Error, Result};
pub use self::fifo::{mirror, unmirror, unmirror_all, Capacity, Fifo, FifoConfig, PullMode, Status};
pub use self::flags::{BlockFlags, PullFlags};
pub use self::item::FifoItem;
