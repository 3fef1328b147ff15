use bitflags::bitflags;

use crate::error::Error;

bitflags! {
    /// Persistent blocking behaviour of a [`crate::Fifo`], set at construction
    /// time via [`crate::FifoConfig`] or later via
    /// [`crate::Fifo::set_block_flags`].
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
    pub struct BlockFlags: u32 {
        /// `pull` blocks while the queue is empty instead of returning
        /// [`crate::Status::Again`] immediately.
        const BLOCK_NO_INPUT = 1 << 0;
        /// `push` blocks while the queue is over capacity instead of
        /// returning [`Error::QueueFull`].
        const BLOCK_MAX_OUTPUT = 1 << 1;
        /// String-grammar counterpart of [`PullFlags::PULL_NO_BLOCK`], kept
        /// here purely so the combined flag-string round-trips; `Fifo`'s own
        /// logic never consults this bit on a persistent block-flags value.
        const PULL_NO_BLOCK = 1 << 2;
    }

    /// Per-call flags passed to `pull`/`pop_flags`/`peek_flags`.
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
    pub struct PullFlags: u32 {
        /// Never block, even if `BLOCK_NO_INPUT` is set on the FIFO.
        const PULL_NO_BLOCK = 1 << 0;
        /// Distinguish a poke-wake from an item arrival: return
        /// [`crate::Status::Again`] with `None` on poke instead of
        /// transparently re-checking the queue.
        const PULL_POKE = 1 << 1;
    }
}

impl BlockFlags {
    /// Parses a comma-separated, lowercase list of block-flag tokens.
    ///
    /// Recognises `block_no_input`, `block_max_output`, and — for
    /// string-grammar compatibility with the original combined flag type —
    /// `pull_no_block`, which is retained in the returned bitset as
    /// [`BlockFlags::PULL_NO_BLOCK`] even though `Fifo`'s own logic never
    /// consults that bit (see the matching [`PullFlags`] token, which is
    /// what callers should actually pass to drive `pull`). Unknown tokens
    /// return [`Error::InvalidArgument`]. An empty string returns an empty
    /// set.
    pub fn from_str_list(input: &str) -> Result<BlockFlags, Error> {
        let mut flags = BlockFlags::empty();
        if input.is_empty() {
            return Ok(flags);
        }

        for token in input.split(',') {
            match token {
                "block_no_input" => flags |= BlockFlags::BLOCK_NO_INPUT,
                "block_max_output" => flags |= BlockFlags::BLOCK_MAX_OUTPUT,
                "pull_no_block" => flags |= BlockFlags::PULL_NO_BLOCK,
                _ => {
                    return Err(Error::invalid_argument(format!(
                        "unknown block flag token: {token}"
                    )))
                }
            }
        }

        Ok(flags)
    }
}
