//! FIFO instantiation for decoded audio/video frames.
//!
//! Mirrors `fifo_frame.c`'s specialisation of the generic FIFO template over
//! `AVFrame`: a thin newtype wrapping a cheaply-clonable frame buffer.

use std::sync::Arc;

use crate::fifo::Fifo;
use crate::item::FifoItem;

/// A decoded media frame, as pushed through a [`FrameFifo`].
///
/// Wraps an `Arc<FrameData>` so that [`FifoItem::clone_item`] is a refcount
/// bump rather than a deep copy, matching the reference-counted `AVFrame`
/// buffers the original core clones on push/peek.
#[derive(Debug, Clone)]
pub struct Frame(Arc<FrameData>);

/// Placeholder payload for a decoded frame. The real sample/pixel buffers are
/// owned by the decoder node that produces them; this crate only needs the
/// buffer to be cheap to clone and safe to send across threads.
#[derive(Debug)]
pub struct FrameData {
    pub pts: i64,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(pts: i64, data: Vec<u8>) -> Frame {
        Frame(Arc::new(FrameData { pts, data }))
    }

    pub fn pts(&self) -> i64 {
        self.0.pts
    }

    pub fn data(&self) -> &[u8] {
        &self.0.data
    }
}

impl FifoItem for Frame {
    fn clone_item(&self) -> Frame {
        Frame(self.0.clone())
    }
}

/// A FIFO instantiated over [`Frame`] items.
pub type FrameFifo = Fifo<Frame>;
