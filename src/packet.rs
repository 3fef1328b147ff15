//! FIFO instantiation for compressed (encoded) packets.
//!
//! Mirrors `fifo_packet.c`'s specialisation of the generic FIFO template over
//! `AVPacket`: behaviourally identical to [`crate::frame::FrameFifo`], only
//! the item type differs.

use std::sync::Arc;

use crate::fifo::Fifo;
use crate::item::FifoItem;

/// A compressed packet, as pushed through a [`PacketFifo`].
#[derive(Debug, Clone)]
pub struct Packet(Arc<PacketData>);

/// Placeholder payload for a compressed packet.
#[derive(Debug)]
pub struct PacketData {
    pub dts: i64,
    pub data: Vec<u8>,
    pub keyframe: bool,
}

impl Packet {
    pub fn new(dts: i64, data: Vec<u8>, keyframe: bool) -> Packet {
        Packet(Arc::new(PacketData {
            dts,
            data,
            keyframe,
        }))
    }

    pub fn dts(&self) -> i64 {
        self.0.dts
    }

    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    pub fn is_keyframe(&self) -> bool {
        self.0.keyframe
    }
}

impl FifoItem for Packet {
    fn clone_item(&self) -> Packet {
        Packet(self.0.clone())
    }
}

/// A FIFO instantiated over [`Packet`] items.
pub type PacketFifo = Fifo<Packet>;
