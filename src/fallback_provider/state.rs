//! Shared endpoint state read by the call path and written by the consensus check.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{network::NetworkIdentity, transport::Transport};

/// Validity of an endpoint, as established by the last network consensus check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndpointStatus {
    /// No consensus check has completed yet.
    Unknown,
    /// The endpoint answered its identity query with the contained identity.
    Valid(NetworkIdentity),
    /// The endpoint's identity query failed.
    Invalid,
}

impl EndpointStatus {
    /// Whether the endpoint may serve calls.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, EndpointStatus::Valid(_))
    }

    /// Last identity reported by the endpoint, if it is valid.
    #[must_use]
    pub fn network(&self) -> Option<&NetworkIdentity> {
        match self {
            EndpointStatus::Valid(network) => Some(network),
            EndpointStatus::Unknown | EndpointStatus::Invalid => None,
        }
    }
}

/// One configured endpoint together with its status.
#[derive(Debug)]
pub(crate) struct EndpointSlot<T> {
    pub(crate) index: usize,
    pub(crate) transport: T,
    status: RwLock<EndpointStatus>,
}

impl<T: Transport> EndpointSlot<T> {
    pub(crate) fn new(index: usize, transport: T) -> Self {
        Self { index, transport, status: RwLock::new(EndpointStatus::Unknown) }
    }

    pub(crate) fn status(&self) -> EndpointStatus {
        self.status.read().clone()
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.status.read().is_valid()
    }

    pub(crate) fn set_status(&self, status: EndpointStatus) {
        *self.status.write() = status;
    }
}

/// Round-robin cursor over `len` endpoints.
///
/// The stored index always lies in `[0, len)`. Advancing is a compare-and-swap from the index
/// the caller actually used, so two callers failing on the same endpoint move the cursor once.
#[derive(Debug)]
pub(crate) struct ActiveCursor {
    index: AtomicUsize,
    len: usize,
}

impl ActiveCursor {
    pub(crate) fn new(len: usize) -> Self {
        debug_assert!(len > 0, "cursor needs at least one endpoint");
        Self { index: AtomicUsize::new(0), len }
    }

    pub(crate) fn get(&self) -> usize {
        self.index.load(Ordering::Acquire) % self.len
    }

    /// Moves the cursor from `from` to `to`. Returns `false` if another caller moved it first.
    pub(crate) fn move_from(&self, from: usize, to: usize) -> bool {
        self.index
            .compare_exchange(from, to % self.len, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Advances the cursor past `from`, wrapping around at the end of the list.
    pub(crate) fn advance_from(&self, from: usize) -> bool {
        self.move_from(from, from + 1)
    }
}

/// Finds the first valid slot not yet `tried`, scanning forward from `start` and wrapping around
/// once.
pub(crate) fn find_valid<T: Transport>(
    slots: &[EndpointSlot<T>],
    start: usize,
    tried: &[bool],
) -> Option<usize> {
    let len = slots.len();
    (0..len)
        .map(|offset| (start + offset) % len)
        .find(|&idx| slots[idx].is_valid() && !tried.get(idx).copied().unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::fallback_provider::errors::TransportError;

    struct NullTransport;

    impl Transport for NullTransport {
        fn url(&self) -> &str {
            "null://"
        }

        async fn call(&self, _method: &str, _params: &Value) -> Result<Value, TransportError> {
            Ok(Value::Null)
        }

        async fn network_identity(&self) -> Result<NetworkIdentity, TransportError> {
            Ok(NetworkIdentity::from_chain_id(1))
        }
    }

    fn slots(valid: &[bool]) -> Vec<EndpointSlot<NullTransport>> {
        valid
            .iter()
            .enumerate()
            .map(|(idx, valid)| {
                let slot = EndpointSlot::new(idx, NullTransport);
                if *valid {
                    slot.set_status(EndpointStatus::Valid(NetworkIdentity::from_chain_id(1)));
                } else {
                    slot.set_status(EndpointStatus::Invalid);
                }
                slot
            })
            .collect()
    }

    #[test]
    fn test_cursor_wraps_around() {
        let cursor = ActiveCursor::new(3);
        assert!(cursor.advance_from(0));
        assert!(cursor.advance_from(1));
        assert_eq!(cursor.get(), 2);
        assert!(cursor.advance_from(2));
        assert_eq!(cursor.get(), 0);
    }

    #[test]
    fn test_cursor_advances_once_for_concurrent_failures() {
        let cursor = ActiveCursor::new(3);
        assert!(cursor.advance_from(0));
        // a second caller that also failed on endpoint 0 must not skip endpoint 1
        assert!(!cursor.advance_from(0));
        assert_eq!(cursor.get(), 1);
    }

    #[test]
    fn test_find_valid_scans_forward_with_wraparound() {
        let slots = slots(&[true, false, false, true]);
        assert_eq!(find_valid(&slots, 0, &[]), Some(0));
        assert_eq!(find_valid(&slots, 1, &[]), Some(3));
        assert_eq!(find_valid(&slots, 3, &[]), Some(3));

        let slots = self::slots(&[true, false, false]);
        assert_eq!(find_valid(&slots, 1, &[]), Some(0));
    }

    #[test]
    fn test_find_valid_skips_tried_slots() {
        let slots = slots(&[true, true, true]);
        assert_eq!(find_valid(&slots, 0, &[true, false, true]), Some(1));
        assert_eq!(find_valid(&slots, 2, &[false, false, true]), Some(0));
        assert_eq!(find_valid(&slots, 1, &[true, true, true]), None);
    }

    #[test]
    fn test_find_valid_is_bounded_when_nothing_is_valid() {
        let slots = slots(&[false, false, false]);
        assert_eq!(find_valid(&slots, 2, &[]), None);
    }

    #[test]
    fn test_status_transitions() {
        let slot = EndpointSlot::new(0, NullTransport);
        assert_eq!(slot.status(), EndpointStatus::Unknown);
        assert!(!slot.is_valid());

        slot.set_status(EndpointStatus::Valid(NetworkIdentity::from_chain_id(1)));
        assert!(slot.is_valid());
        assert_eq!(slot.status().network().map(|n| n.chain_id), Some(1));

        slot.set_status(EndpointStatus::Invalid);
        assert!(!slot.is_valid());
        assert!(slot.status().network().is_none());
    }
}
