//! Reservation enforcement: recompute every subscriber's permission after a
//! reservation change and split off the ones that lost read access.

use crate::subscriber::SubscriberHandle;
use herald_core::{Permission, Reservation, SubscriberId, resolve_permission};
use std::collections::HashMap;

/// Revalidate all subscribers against `reservation`.
///
/// Must run under the topic lock. Subscribers that keep read access get
/// their permission snapshot refreshed; the rest are removed from the set
/// and returned so they can be closed once the lock is released.
pub(crate) fn sweep(
    subscribers: &mut HashMap<SubscriberId, SubscriberHandle>,
    reservation: Option<&Reservation>,
    default_access: Permission,
) -> Vec<SubscriberHandle> {
    let mut revoked = Vec::new();
    for (id, handle) in subscribers.iter_mut() {
        let permission = resolve_permission(handle.identity(), reservation, default_access);
        if permission.can_read() {
            handle.set_permission(permission);
        } else {
            revoked.push(*id);
        }
    }

    revoked
        .into_iter()
        .filter_map(|id| subscribers.remove(&id))
        .collect()
}
