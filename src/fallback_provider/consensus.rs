//! Network consensus check across all configured endpoints.

use futures::future::join_all;

use super::{
    errors::Error,
    network::NetworkIdentity,
    state::{EndpointSlot, EndpointStatus},
    transport::Transport,
};

/// Queries every endpoint's network identity and checks that the reachable ones agree.
///
/// All queries run concurrently and each outcome is recorded independently: an endpoint that
/// answers is marked [`EndpointStatus::Valid`] with its identity, one that fails is marked
/// [`EndpointStatus::Invalid`]. Statuses are updated before agreement is checked, so a mismatch
/// leaves the disagreeing endpoints valid.
///
/// # Errors
///
/// * [`Error::NetworkMismatch`] - if two valid endpoints report different identities.
/// * [`Error::NoValidEndpoints`] - if no endpoint answered.
pub(crate) async fn check_all<T: Transport>(
    slots: &[EndpointSlot<T>],
) -> Result<NetworkIdentity, Error> {
    let results = join_all(slots.iter().map(|slot| slot.transport.network_identity())).await;

    let mut reported = Vec::with_capacity(slots.len());
    for (slot, result) in slots.iter().zip(results) {
        match result {
            Ok(network) => {
                trace!(endpoint_index = slot.index, network = %network, "Endpoint identified");
                slot.set_status(EndpointStatus::Valid(network.clone()));
                reported.push((slot.index, network));
            }
            Err(e) => {
                warn!(
                    endpoint_index = slot.index,
                    url = slot.transport.url(),
                    error = %e,
                    "Endpoint unreachable, marking invalid"
                );
                // ignore unused var warning when tracing disabled
                _ = e;
                slot.set_status(EndpointStatus::Invalid);
            }
        }
    }

    let mut reported = reported.into_iter();
    let Some((_, reference)) = reported.next() else {
        error!(endpoints = slots.len(), "No valid endpoints, all endpoints unreachable");
        return Err(Error::NoValidEndpoints);
    };

    for (index, network) in reported {
        if network != reference {
            error!(
                endpoint_index = index,
                expected = %reference,
                actual = %network,
                "Endpoint networks mismatch"
            );
            // ignore unused var warning when tracing disabled
            _ = index;
            return Err(Error::NetworkMismatch { expected: reference, actual: network });
        }
    }

    debug!(network = %reference, endpoints = slots.len(), "Endpoints agree on network");
    Ok(reference)
}
