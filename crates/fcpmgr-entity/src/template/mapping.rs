//! Template device mapping rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use fcpmgr_core::types::FcpId;

/// One row of `template_fcp_mapping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TemplateFcpMapping {
    /// Device number.
    pub fcp_id: FcpId,
    /// Owning template.
    pub tmpl_id: String,
    /// 0-based path index.
    pub path: i64,
}
