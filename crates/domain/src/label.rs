//! Label assignments: user tags attached to campaigns, ad groups or ads.

use serde::{Deserialize, Serialize};

use crate::id::LabelId;
use crate::rule::Scope;

/// One platform object carrying a label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelAssignment {
    pub label_id: LabelId,
    pub level: Scope,
    pub object_id: String,
}
