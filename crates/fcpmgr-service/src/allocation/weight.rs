//! Capacity weights of PCHID combinations.
//!
//! The weight of a PCHID within a combination is its free capacity divided
//! by how many paths of the combination use it; the weight of the
//! combination is the minimum over its PCHIDs. A combination is usable only
//! when that minimum is at least 1.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use fcpmgr_core::types::CapacitySnapshot;

/// An exact rational with a positive denominator.
#[derive(Debug, Clone, Copy)]
pub struct Weight {
    num: i64,
    den: i64,
}

impl Weight {
    /// `free / uses`. `uses` is always at least 1.
    pub fn new(free: i64, uses: i64) -> Self {
        Self {
            num: free,
            den: uses.max(1),
        }
    }

    /// Whether one more allocation fits.
    pub fn is_sufficient(&self) -> bool {
        self.num >= self.den
    }
}

impl PartialEq for Weight {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Weight {}

impl PartialOrd for Weight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Weight {
    fn cmp(&self, other: &Self) -> Ordering {
        (i128::from(self.num) * i128::from(other.den))
            .cmp(&(i128::from(other.num) * i128::from(self.den)))
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// PCHIDs found without enough free capacity, with that capacity.
#[derive(Debug, Clone, Default)]
pub struct CapacityShortfall {
    pchids: BTreeMap<String, i64>,
}

impl CapacityShortfall {
    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.pchids.is_empty()
    }

    /// Recorded PCHIDs and their free capacity.
    pub fn pchids(&self) -> &BTreeMap<String, i64> {
        &self.pchids
    }

    /// Diagnostic for an empty selection.
    pub fn describe(&self, template_id: &str) -> String {
        let listed = self
            .pchids
            .iter()
            .map(|(pchid, free)| format!("{pchid}: {free}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Not enough free capacity of the following PCHIDs left. Their free capacity is \
             {{{listed}}}. To use FCP multipath template (id={template_id}), increase the free \
             capacity of these PCHIDs or add free FCP devices on PCHIDs with enough free \
             capacity by editing the template."
        )
    }
}

/// Weight of a combination given the PCHID used by each of its paths.
/// PCHIDs with a per-PCHID weight below 1 are recorded in `shortfall`.
pub fn combination_weight<'a, I>(
    pchids: I,
    capacity: &CapacitySnapshot,
    shortfall: &mut CapacityShortfall,
) -> Weight
where
    I: IntoIterator<Item = &'a str>,
{
    let mut uses: BTreeMap<String, i64> = BTreeMap::new();
    for pchid in pchids {
        *uses.entry(pchid.to_uppercase()).or_default() += 1;
    }

    let mut min: Option<Weight> = None;
    for (pchid, count) in uses {
        let free = capacity.free(&pchid);
        let weight = Weight::new(free, count);
        if !weight.is_sufficient() {
            shortfall.pchids.insert(pchid, free);
        }
        min = Some(match min {
            Some(current) if current <= weight => current,
            _ => weight,
        });
    }
    min.unwrap_or(Weight::new(0, 1))
}
