//! Hand-off point between state mutators and the broadcast fan-out.

use crate::store::Snapshot;

/// Receives every committed snapshot for delivery to realtime clients.
///
/// Mutators call [`publish`](StatePublisher::publish) after releasing the
/// store lock. Two mutators can publish in the opposite order to the one
/// their mutations committed in; implementations use
/// [`Snapshot::version`] to keep the newest state last. Implementations
/// must not block: the broadcast hub enqueues onto its request queue and
/// returns.
pub trait StatePublisher: Send + Sync {
    /// Publish a complete, versioned facility snapshot.
    fn publish(&self, snapshot: &Snapshot);
}
