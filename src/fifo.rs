use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

#[cfg(not(loom))]
use std::sync::{Condvar, Mutex, MutexGuard};

#[cfg(loom)]
use loom::sync::{Condvar, Mutex, MutexGuard};

use tracing::{instrument, trace};

use crate::error::Error;
use crate::flags::{BlockFlags, PullFlags};
use crate::handle_list::HandleList;
use crate::item::FifoItem;

/// Queue capacity, mirroring the original core's `-1`/`0`/`>0` integer
/// encoding for `max_queued`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Capacity {
    /// `max_queued == -1`: no bound, `push` never blocks and `is_full` is
    /// always `false`.
    Unbounded,
    /// `max_queued == 0`: the queue never retains items; every push is a
    /// transparent fan-out relay and `len` always reads `0`.
    Relay,
    /// `max_queued > 0`: bounded with the given maximum. The effective
    /// overshoot point is `n + 1`, not `n` (see [`Fifo::is_full`]).
    Bounded(usize),
}

impl Capacity {
    /// The value reported by [`Fifo::max_queued`]: the bound itself, or
    /// `usize::MAX` standing in for the original core's `INT_MAX` sentinel
    /// when unbounded.
    fn max_queued(self) -> usize {
        match self {
            Capacity::Unbounded => usize::MAX,
            Capacity::Relay => 0,
            Capacity::Bounded(n) => n,
        }
    }
}

/// Status returned by the pull/peek family alongside an optional item.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Status {
    Ok,
    /// A non-blocking pull found the queue empty, or a blocking pull that
    /// requested [`PullFlags::PULL_POKE`] observed a poke-wake.
    Again,
}

/// Which of the two pull-family operations to perform once the wait loop's
/// predicate is satisfied.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PullMode {
    Peek,
    Pop,
}

/// Construction parameters for a new [`Fifo`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct FifoConfig {
    pub capacity: Capacity,
    pub block_flags: BlockFlags,
}

impl Default for FifoConfig {
    fn default() -> FifoConfig {
        FifoConfig {
            capacity: Capacity::Unbounded,
            block_flags: BlockFlags::empty(),
        }
    }
}

struct State<T> {
    queue: VecDeque<Option<T>>,
    capacity: Capacity,
    block_flags: BlockFlags,
    poked: bool,
}

/// A bounded or unbounded concurrent queue with mirror-based fan-out.
///
/// Always accessed through `Arc<Fifo<T>>` so that mirror edges (which are
/// just more `Arc` clones stored in [`HandleList`]) can keep participants
/// alive for the lifetime of the relationship.
pub struct Fifo<T> {
    owner: String,
    state: Mutex<State<T>>,
    cond_in: Condvar,
    cond_out: Condvar,
    sources: HandleList<Fifo<T>>,
    dests: HandleList<Fifo<T>>,
}

impl<T> fmt::Debug for Fifo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fifo")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl<T: FifoItem> Fifo<T> {
    /// Creates a new FIFO. `owner` is an opaque, human-readable identity used
    /// only for log messages (the Rust equivalent of the original core's
    /// `opaque_owner`/`sp_class` logging hook).
    pub fn new(owner: impl Into<String>, config: FifoConfig) -> Arc<Fifo<T>> {
        Arc::new(Fifo {
            owner: owner.into(),
            state: Mutex::new(State {
                queue: VecDeque::new(),
                capacity: config.capacity,
                block_flags: config.block_flags,
                poked: false,
            }),
            cond_in: Condvar::new(),
            cond_out: Condvar::new(),
            sources: HandleList::new(),
            dests: HandleList::new(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pushes `item` into this FIFO and recursively fans it out to every
    /// mirrored destination.
    ///
    /// `item` is `None` to push a "null" marker through the graph (a `None`
    /// still takes a slot in the queue and wakes a waiter, but cloning it
    /// for fan-out is free); this matches the original core's nullable
    /// `TYPE *in`.
    pub fn push(&self, item: Option<T>) -> Result<(), Error> {
        self.push_ref(&item)
    }

    /// The actual push implementation, taking `item` by reference so that a
    /// fan-out chain passes the same borrow down the recursion instead of
    /// cloning an owned argument at every edge: each FIFO clones `item`
    /// exactly once, at the point it enqueues its own copy, matching the
    /// original core's `fifo_push`, which recurses on the same `in` pointer
    /// and only calls `CLONE_FN` once per FIFO that actually stores it.
    ///
    /// Holds this FIFO's lock for the entire call, including the recursive
    /// fan-out below: this is what guarantees that a concurrent `mirror`/
    /// `unmirror` on this FIFO's `dests` can never be observed mid-fan-out.
    /// It is also why the mirror graph must stay acyclic — see the lock
    /// ordering note in SPEC_FULL.md §5.
    #[instrument(level = "trace", skip_all, fields(owner = %self.owner))]
    fn push_ref(&self, item: &Option<T>) -> Result<(), Error> {
        let mut state = self.lock();

        if !matches!(state.capacity, Capacity::Relay) {
            if let (Some(_), Capacity::Bounded(cap)) = (item.as_ref(), state.capacity) {
                while state.queue.len() > cap + 1 {
                    if !state.block_flags.contains(BlockFlags::BLOCK_MAX_OUTPUT) {
                        return Err(Error::QueueFull);
                    }

                    state = self.cond_out.wait(state).unwrap_or_else(|e| e.into_inner());
                }
            }

            state
                .queue
                .push_back(item.as_ref().map(FifoItem::clone_item));
            self.cond_in.notify_one();
        }

        // `state` (and with it, this FIFO's lock) stays held across the
        // fan-out below.
        self.distribute(item)
    }

    fn distribute(&self, item: &Option<T>) -> Result<(), Error> {
        let mut first_err = None;

        for dest in self.dests.snapshot() {
            match dest.push_ref(item) {
                Ok(()) => {}
                Err(Error::OutOfMemory) => return Err(Error::OutOfMemory),
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Pops the oldest item, blocking according to `flags` and the FIFO's
    /// persistent block flags.
    pub fn pop_flags(&self, flags: PullFlags) -> (Option<T>, Status) {
        self.pull(flags, PullMode::Pop)
    }

    /// Pops the oldest item with no flags set, discarding the status.
    pub fn pop(&self) -> Option<T> {
        self.pop_flags(PullFlags::empty()).0
    }

    /// Clones the oldest item without removing it, blocking according to
    /// `flags` and the FIFO's persistent block flags.
    pub fn peek_flags(&self, flags: PullFlags) -> (Option<T>, Status) {
        self.pull(flags, PullMode::Peek)
    }

    /// Clones the oldest item with no flags set, discarding the status.
    pub fn peek(&self) -> Option<T> {
        self.peek_flags(PullFlags::empty()).0
    }

    #[instrument(level = "trace", skip_all, fields(owner = %self.owner))]
    fn pull(&self, flags: PullFlags, mode: PullMode) -> (Option<T>, Status) {
        let mut state = self.lock();

        while state.queue.is_empty() {
            let block_no_input = state.block_flags.contains(BlockFlags::BLOCK_NO_INPUT);

            if !block_no_input || flags.contains(PullFlags::PULL_NO_BLOCK) {
                return (None, Status::Again);
            }

            if !state.poked {
                state = self.cond_in.wait(state).unwrap_or_else(|e| e.into_inner());
            }

            if flags.contains(PullFlags::PULL_POKE) && state.poked {
                state.poked = false;
                return (None, Status::Again);
            }
            state.poked = false;
        }

        let item = match mode {
            PullMode::Pop => {
                let item = state.queue.pop_front().flatten();
                if matches!(state.capacity, Capacity::Bounded(_)) {
                    self.cond_out.notify_one();
                }
                item
            }
            PullMode::Peek => state.queue.front().and_then(|front| {
                front.as_ref().map(FifoItem::clone_item)
            }),
        };

        (item, Status::Ok)
    }

    /// Wakes a consumer blocked in `pull` without enqueuing an item, so it
    /// can re-check external conditions (e.g. shutdown).
    #[instrument(level = "trace", skip_all, fields(owner = %self.owner))]
    pub fn poke(&self) {
        trace!("poking fifo");
        let mut state = self.lock();
        state.poked = true;
        drop(state);
        self.cond_in.notify_one();
    }

    /// Whether the queue is over its capacity bound. Always `false` for
    /// `Unbounded`, always `true` for `Relay`.
    pub fn is_full(&self) -> bool {
        let state = self.lock();
        match state.capacity {
            Capacity::Unbounded => false,
            Capacity::Relay => true,
            Capacity::Bounded(cap) => state.queue.len() > cap + 1,
        }
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured capacity bound, or `usize::MAX` if unbounded.
    pub fn max_queued(&self) -> usize {
        self.lock().capacity.max_queued()
    }

    /// Updates the capacity bound. Does not wake waiters: a caller that
    /// raises the capacity must follow with a `push` or a `poke` if it wants
    /// existing waiters to re-evaluate.
    pub fn set_max_queued(&self, capacity: Capacity) {
        self.lock().capacity = capacity;
    }

    /// Updates the persistent block flags. Does not wake waiters, for the
    /// same reason as [`Fifo::set_max_queued`].
    pub fn set_block_flags(&self, block_flags: BlockFlags) {
        self.lock().block_flags = block_flags;
    }

    pub(crate) fn sources(&self) -> &HandleList<Fifo<T>> {
        &self.sources
    }

    pub(crate) fn dests(&self) -> &HandleList<Fifo<T>> {
        &self.dests
    }
}

impl<T> Drop for Fifo<T> {
    fn drop(&mut self) {
        // No live `Arc` can reach this FIFO anymore, so draining here without
        // signalling is safe; correct callers already ran `unmirror_all`.
        while self.sources.pop_first().is_some() {}
        while self.dests.pop_first().is_some() {}
    }
}

/// Registers a directed mirror edge `src -> dst`: every item pushed into
/// `src` is also pushed into `dst`. No deduplication is performed; callers
/// must not request duplicate edges.
#[instrument(level = "trace", skip_all, fields(src = %src.owner, dst = %dst.owner))]
pub fn mirror<T: FifoItem>(dst: &Arc<Fifo<T>>, src: &Arc<Fifo<T>>) {
    trace!("mirroring fifo");
    dst.sources().append(src.clone());
    src.dests().append(dst.clone());
}

/// Removes the single matching mirror edge `src -> dst`.
///
/// # Panics
///
/// Panics if the edge is not present on both `src.dests` and `dst.sources` —
/// callers are expected to unmirror exactly what they mirrored, matching the
/// original core's `assert`-and-abort contract.
#[instrument(level = "trace", skip_all, fields(src = %src.owner, dst = %dst.owner))]
pub fn unmirror<T: FifoItem>(dst: &Arc<Fifo<T>>, src: &Arc<Fifo<T>>) {
    let removed_dest = src.dests().pop_by(|h| Arc::ptr_eq(h, dst));
    assert!(
        removed_dest.is_some(),
        "unmirror called on a non-existent edge (src -> dst)"
    );

    let removed_source = dst.sources().pop_by(|h| Arc::ptr_eq(h, src));
    assert!(
        removed_source.is_some(),
        "unmirror called on a non-existent edge (dst <- src)"
    );
}

/// Drains every inbound and outbound mirror edge of `fifo`.
///
/// Unblocks any consumer waiting on a former destination by poking it (see
/// [`Fifo::poke`]) once its edge back to `fifo` is removed, so it observes
/// the topology changed and gets a [`Status::Again`] rather than waiting
/// indefinitely on input that can no longer arrive through this edge. A
/// plain `cond_in` signal without setting `poked` would not be enough here:
/// a consumer blocked with `BLOCK_NO_INPUT` and no `PULL_POKE` would wake,
/// find the queue still empty and `block_flags` unchanged, and loop right
/// back into the wait. No notification happens for former sources, since
/// removing a source from a sink cannot unblock the sink's own waiters.
#[instrument(level = "trace", skip_all, fields(owner = %fifo.owner))]
pub fn unmirror_all<T: FifoItem>(fifo: &Arc<Fifo<T>>) {
    trace!("unmirroring all edges");

    while let Some(src) = fifo.sources().pop_first() {
        src.dests().pop_by(|h| Arc::ptr_eq(h, fifo));
    }

    while let Some(dst) = fifo.dests().pop_first() {
        dst.sources().pop_by(|h| Arc::ptr_eq(h, fifo));
        dst.poke();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    #[cfg(not(loom))]
    use std::thread;
    #[cfg(not(loom))]
    use std::time::Duration;

    #[cfg(loom)]
    use loom::thread;

    use super::*;

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct Token(u32);

    impl FifoItem for Token {
        fn clone_item(&self) -> Token {
            Token(self.0)
        }
    }

    fn unbounded() -> Arc<Fifo<Token>> {
        Fifo::new("test", FifoConfig::default())
    }

    fn bounded(cap: usize, block_flags: BlockFlags) -> Arc<Fifo<Token>> {
        Fifo::new(
            "test",
            FifoConfig {
                capacity: Capacity::Bounded(cap),
                block_flags,
            },
        )
    }

    #[cfg(not(loom))]
    #[test]
    fn linear_relay() {
        let a = unbounded();
        let b = unbounded();
        mirror(&b, &a);

        for i in 1..=3 {
            a.push(Some(Token(i))).unwrap();
        }

        for i in 1..=3 {
            assert_eq!(a.pop(), Some(Token(i)));
        }
        for i in 1..=3 {
            assert_eq!(b.pop(), Some(Token(i)));
        }
    }

    #[cfg(not(loom))]
    #[test]
    fn fan_out_to_two_sinks() {
        let a = unbounded();
        let b = unbounded();
        let c = unbounded();
        mirror(&b, &a);
        mirror(&c, &a);

        a.push(Some(Token(42))).unwrap();

        assert_eq!(b.pop(), Some(Token(42)));
        assert_eq!(c.pop(), Some(Token(42)));
        assert_eq!(a.pop(), Some(Token(42)));
    }

    #[cfg(not(loom))]
    #[test]
    fn relay_never_retains_and_still_fans_out() {
        let a = Fifo::new(
            "relay",
            FifoConfig {
                capacity: Capacity::Relay,
                block_flags: BlockFlags::empty(),
            },
        );
        let b = unbounded();
        mirror(&b, &a);

        a.push(Some(Token(1))).unwrap();

        assert_eq!(a.len(), 0);
        assert_eq!(b.pop(), Some(Token(1)));
    }

    // Capacity's overshoot point is `c + 1` *before* the push that would
    // cross it, so a bounded FIFO actually accepts up to `c + 2` queued
    // items before a non-blocking push starts failing (see the `+1`
    // boundary note in SPEC_FULL.md's design notes).
    #[cfg(not(loom))]
    #[test]
    fn backpressure_errors_without_block_flag() {
        let a = bounded(2, BlockFlags::empty());

        for i in 1..=4 {
            assert!(a.push(Some(Token(i))).is_ok());
        }
        assert_eq!(a.push(Some(Token(5))), Err(Error::QueueFull));
    }

    #[cfg(not(loom))]
    #[test]
    fn backpressure_blocks_and_unblocks_with_flag() {
        let a = bounded(2, BlockFlags::BLOCK_MAX_OUTPUT);

        for i in 1..=4 {
            a.push(Some(Token(i))).unwrap();
        }

        let producer = {
            let a = a.clone();
            thread::spawn(move || {
                a.push(Some(Token(5))).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(a.pop(), Some(Token(1)));

        producer.join().unwrap();
        assert_eq!(a.pop(), Some(Token(2)));
        assert_eq!(a.pop(), Some(Token(3)));
        assert_eq!(a.pop(), Some(Token(4)));
        assert_eq!(a.pop(), Some(Token(5)));
    }

    #[cfg(not(loom))]
    #[test]
    fn unmirror_all_wakes_blocked_consumer() {
        let a = unbounded();
        let b = Fifo::new(
            "b",
            FifoConfig {
                capacity: Capacity::Unbounded,
                block_flags: BlockFlags::BLOCK_NO_INPUT,
            },
        );
        mirror(&b, &a);

        // A plain (non-`PULL_POKE`) consumer would loop straight back into
        // the wait after `unmirror_all`'s poke, since it has no way to
        // distinguish a poke-wake from a spurious one: `PULL_POKE` is what
        // makes the topology change observable as `Status::Again`.
        let consumer = {
            let b = b.clone();
            thread::spawn(move || b.pop_flags(PullFlags::PULL_POKE))
        };

        thread::sleep(Duration::from_millis(50));
        unmirror_all(&a);

        let (item, status) = consumer.join().unwrap();
        assert_eq!(item, None);
        assert_eq!(status, Status::Again);

        assert_eq!(b.pop_flags(PullFlags::PULL_NO_BLOCK).1, Status::Again);
    }

    #[cfg(not(loom))]
    #[test]
    fn poke_wakes_pull_poke_consumer() {
        let a = Fifo::new(
            "a",
            FifoConfig {
                capacity: Capacity::Unbounded,
                block_flags: BlockFlags::BLOCK_NO_INPUT,
            },
        );

        let consumer = {
            let a = a.clone();
            thread::spawn(move || a.pop_flags(PullFlags::PULL_POKE))
        };

        thread::sleep(Duration::from_millis(50));
        a.poke();

        let (item, status) = consumer.join().unwrap();
        assert_eq!(item, None);
        assert_eq!(status, Status::Again);

        a.push(Some(Token(7))).unwrap();
        assert_eq!(a.pop_flags(PullFlags::PULL_POKE), (Some(Token(7)), Status::Ok));
    }

    #[cfg(not(loom))]
    #[test]
    fn mirror_symmetry_holds_after_unmirror() {
        let a = unbounded();
        let b = unbounded();
        mirror(&b, &a);

        assert!(a.dests().snapshot().iter().any(|h| Arc::ptr_eq(h, &b)));
        assert!(b.sources().snapshot().iter().any(|h| Arc::ptr_eq(h, &a)));

        unmirror(&b, &a);

        assert!(a.dests().snapshot().is_empty());
        assert!(b.sources().snapshot().is_empty());
    }

    #[cfg(not(loom))]
    #[test]
    #[should_panic]
    fn unmirror_missing_edge_panics() {
        let a = unbounded();
        let b = unbounded();
        unmirror(&b, &a);
    }

    #[cfg(not(loom))]
    #[test]
    fn is_full_and_max_queued_reflect_capacity_variants() {
        let unbounded = unbounded();
        assert!(!unbounded.is_full());
        assert_eq!(unbounded.max_queued(), usize::MAX);

        let relay = Fifo::new(
            "relay",
            FifoConfig {
                capacity: Capacity::Relay,
                block_flags: BlockFlags::empty(),
            },
        );
        assert!(relay.is_full());
        assert_eq!(relay.max_queued(), 0);

        let bounded = bounded(1, BlockFlags::empty());
        assert_eq!(bounded.max_queued(), 1);
        bounded.push(Some(Token(1))).unwrap();
        bounded.push(Some(Token(2))).unwrap();
        assert!(!bounded.is_full());
        bounded.push(Some(Token(3))).unwrap();
        assert!(bounded.is_full());
        bounded.push(Some(Token(4))).unwrap_err();
    }

    // Model-checked variants of the two interleavings that matter most:
    // a blocked producer racing the pop that wakes it, and a poke racing
    // the push it is meant to preempt. `loom` exhaustively explores
    // schedulings instead of relying on `thread::sleep` to land a window.
    #[cfg(loom)]
    #[test]
    fn loom_backpressure_unblocks_on_pop() {
        loom::model(|| {
            let a = bounded(2, BlockFlags::BLOCK_MAX_OUTPUT);
            for i in 1..=4 {
                a.push(Some(Token(i))).unwrap();
            }

            let producer = {
                let a = a.clone();
                thread::spawn(move || a.push(Some(Token(5))).unwrap())
            };

            assert_eq!(a.pop(), Some(Token(1)));
            producer.join().unwrap();

            assert_eq!(a.pop(), Some(Token(2)));
        });
    }

    #[cfg(loom)]
    #[test]
    fn loom_poke_races_push() {
        loom::model(|| {
            let a = Fifo::new(
                "a",
                FifoConfig {
                    capacity: Capacity::Unbounded,
                    block_flags: BlockFlags::BLOCK_NO_INPUT,
                },
            );

            let producer = {
                let a = a.clone();
                thread::spawn(move || a.push(Some(Token(1))).unwrap())
            };
            let poker = {
                let a = a.clone();
                thread::spawn(move || a.poke())
            };

            producer.join().unwrap();
            poker.join().unwrap();

            let (item, status) = a.pop_flags(PullFlags::PULL_POKE);
            match status {
                Status::Ok => assert_eq!(item, Some(Token(1))),
                Status::Again => assert_eq!(item, None),
            }
        });
    }
}
