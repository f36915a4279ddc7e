//! Per-PCHID capacity snapshot supplied by the caller on each selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Allocation counters of one physical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PchidCapacity {
    /// Devices already allocated on this PCHID.
    pub allocated: i64,
    /// Maximum devices this PCHID may serve.
    pub max: i64,
}

impl PchidCapacity {
    /// Create a new capacity entry.
    pub fn new(allocated: i64, max: i64) -> Self {
        Self { allocated, max }
    }

    /// Remaining capacity, which may be negative when over-committed.
    /// Saturates at the `i64` bounds.
    pub fn free(&self) -> i64 {
        self.max.saturating_sub(self.allocated)
    }
}

/// PCHID → capacity map. Keys are normalized to upper case.
///
/// Never persisted; the JSON form is
/// `{"AAAA": {"allocated": 0, "max": 2}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, PchidCapacity>")]
pub struct CapacitySnapshot(BTreeMap<String, PchidCapacity>);

impl CapacitySnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the counters of one PCHID.
    pub fn insert(&mut self, pchid: &str, capacity: PchidCapacity) {
        self.0.insert(pchid.to_ascii_uppercase(), capacity);
    }

    /// Builder-style variant of [`CapacitySnapshot::insert`].
    pub fn with(mut self, pchid: &str, allocated: i64, max: i64) -> Self {
        self.insert(pchid, PchidCapacity::new(allocated, max));
        self
    }

    /// Look up one PCHID.
    pub fn get(&self, pchid: &str) -> Option<&PchidCapacity> {
        self.0.get(&pchid.to_ascii_uppercase())
    }

    /// Free capacity of a PCHID; unknown PCHIDs have none.
    pub fn free(&self, pchid: &str) -> i64 {
        self.get(pchid).map(PchidCapacity::free).unwrap_or(0)
    }

    /// Build a snapshot giving every listed PCHID the same empty capacity.
    pub fn uniform<'a, I>(pchids: I, max: i64) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut snapshot = Self::new();
        for pchid in pchids {
            snapshot.insert(pchid, PchidCapacity::new(0, max));
        }
        snapshot
    }

    /// Iterate entries in PCHID order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PchidCapacity)> {
        self.0.iter()
    }

    /// Whether the snapshot has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, PchidCapacity>> for CapacitySnapshot {
    fn from(raw: BTreeMap<String, PchidCapacity>) -> Self {
        Self(
            raw.into_iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), v))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keys_are_normalized() {
        let snapshot: CapacitySnapshot =
            serde_json::from_str(r#"{"aaaa": {"allocated": 1, "max": 3}}"#).unwrap();
        assert_eq!(snapshot.free("AAAA"), 2);
        assert_eq!(snapshot.free("aaaa"), 2);
    }

    #[test]
    fn test_unknown_pchid_has_no_capacity() {
        let snapshot = CapacitySnapshot::new().with("AAAA", 0, 2);
        assert_eq!(snapshot.free("BBBB"), 0);
    }

    #[test]
    fn test_over_committed_is_negative() {
        assert_eq!(PchidCapacity::new(5, 3).free(), -2);
    }

    #[test]
    fn test_extreme_counters_saturate() {
        let snapshot: CapacitySnapshot = serde_json::from_str(&format!(
            r#"{{"AAAA": {{"allocated": -1, "max": {}}}, "BBBB": {{"allocated": {}, "max": 0}}}}"#,
            i64::MAX,
            i64::MAX
        ))
        .unwrap();
        assert_eq!(snapshot.free("AAAA"), i64::MAX);
        assert_eq!(snapshot.free("BBBB"), -i64::MAX);
        assert_eq!(PchidCapacity::new(1, i64::MIN).free(), i64::MIN);
    }
}
