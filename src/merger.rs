use std::collections::HashMap;

use crate::api::advertisement::Advertisement;
use crate::classifier;

/// Combine a new sighting with the previous one for the same `id`.
///
/// Signal fields (`rssi`, ranging info, `connectable`) take the newest value.
/// Service UUIDs, manufacturer data and service data accumulate; a newer
/// payload for an existing key replaces the older one. A name or TX power the
/// newer sighting does not carry is kept from the older one.
pub fn merge(incoming: Advertisement, previous: Option<&Advertisement>) -> Advertisement {
    let Some(previous) = previous else {
        return incoming;
    };
    if previous.id != incoming.id {
        log::warn!(
            "refusing to merge {} into unrelated observation {}",
            incoming.id,
            previous.id
        );
        return incoming;
    }

    let mut merged = incoming;

    if merged.display_name.is_empty() {
        merged.display_name = previous.display_name.clone();
    }
    if merged.tx_power == 0 {
        merged.tx_power = previous.tx_power;
    }

    merged
        .service_uuids
        .extend(previous.service_uuids.iter().cloned());
    for (key, value) in &previous.manufacturer_data {
        merged
            .manufacturer_data
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    for (key, value) in &previous.service_data {
        merged
            .service_data
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    merged.is_eddystone = classifier::is_eddystone(&merged.service_uuids);
    merged
}

/// Latest merged observation per identity.
///
/// Entries never expire here and are only dropped by [`clear`](Self::clear),
/// which the session calls at each start. Devices that rotate their address
/// add a new entry per address, so the cache grows for the length of a scan.
#[derive(Debug, Default)]
pub struct ObservationCache {
    observations: HashMap<String, Advertisement>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `incoming` with what is known about its id, remember and return
    /// the result.
    pub fn observe(&mut self, incoming: Advertisement) -> Advertisement {
        let previous = self.observations.remove(&incoming.id);
        let merged = merge(incoming, previous.as_ref());
        self.observations.insert(merged.id.clone(), merged.clone());
        merged
    }

    pub fn get(&self, id: &str) -> Option<&Advertisement> {
        self.observations.get(id)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn clear(&mut self) {
        self.observations.clear();
    }
}
