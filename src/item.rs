/// Payload carried through a [`crate::Fifo`].
///
/// The only operations the FIFO core needs are a cheap clone (items are
/// expected to wrap reference-counted buffers, so `clone_item` is typically
/// an `Arc`/refcount bump rather than a deep copy) and ordinary `Drop`-based
/// destruction.
pub trait FifoItem: Send + 'static {
    /// Clones the item. Expected to be cheap, matching the original core's
    /// reliance on reference-counted buffers under the hood.
    fn clone_item(&self) -> Self;
}
