//! Usage columns of a device.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The four mutable usage columns of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FcpUsage {
    /// Guest holding the device, or empty.
    pub assigner_id: String,
    /// 1 while reserved.
    pub reserved: i64,
    /// Active attachments.
    pub connections: i64,
    /// Template the device was allocated from, or empty.
    pub tmpl_id: String,
}
