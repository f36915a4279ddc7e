//! Textual device-list forms used by operators.
//!
//! Templates are configured with strings such as `"0011-0013;0015;0017-0018"`
//! (paths separated by `;`, ranges by `-`, items by `,`) and device sets are
//! reported back as `"1A01 - 1A03, 1B05"`.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::AppError;
use crate::types::fcp_id::FcpId;

/// Devices of a template keyed by 0-based path index.
pub type DevicesByPath = BTreeMap<u32, BTreeSet<FcpId>>;

/// Expand the textual template form into devices per path.
///
/// Empty path segments are skipped, so `"1A00;;1B00"` yields two paths.
/// A device may appear in at most one path.
pub fn expand_fcp_list(raw: &str) -> Result<DevicesByPath, AppError> {
    let mut paths = DevicesByPath::new();
    let mut seen = BTreeSet::new();

    let segments = raw.split(';').map(str::trim).filter(|s| !s.is_empty());
    for (path, segment) in segments.enumerate() {
        let mut devices = BTreeSet::new();
        for item in segment.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            for id in expand_item(item)? {
                if !seen.insert(id.clone()) {
                    return Err(AppError::invalid_input(format!(
                        "FCP device {id} appears in more than one path of '{raw}'"
                    )));
                }
                devices.insert(id);
            }
        }
        paths.insert(path as u32, devices);
    }

    Ok(paths)
}

fn expand_item(item: &str) -> Result<Vec<FcpId>, AppError> {
    match item.split_once('-') {
        Some((start, end)) => {
            let start = FcpId::parse(start)?.number();
            let end = FcpId::parse(end)?.number();
            if start > end {
                return Err(AppError::invalid_input(format!(
                    "Invalid FCP device range '{item}': start is greater than end"
                )));
            }
            Ok((start..=end).map(FcpId::from_number).collect())
        }
        None => Ok(vec![FcpId::parse(item)?]),
    }
}

/// Collapse a device set into consecutive ranges, e.g. `"1A01 - 1A03, 1B05"`.
pub fn shrink_fcp_list<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a FcpId>,
{
    let numbers: BTreeSet<u16> = ids.into_iter().map(FcpId::number).collect();

    let mut ranges: Vec<(u16, u16)> = Vec::new();
    for n in numbers {
        match ranges.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(n) => *end = n,
            _ => ranges.push((n, n)),
        }
    }

    ranges
        .into_iter()
        .map(|(start, end)| {
            if start == end {
                format!("{start:04X}")
            } else {
                format!("{start:04X} - {end:04X}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
