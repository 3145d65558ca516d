//! Resource model - the subject or object of a statement.

use serde::{Deserialize, Serialize};

/// Store-assigned resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

/// A named resource: a content identifier, a tag string, etc.
///
/// The model does not distinguish subjects from objects; the same record
/// can appear in either role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Store-assigned identifier
    pub id: ResourceId,

    /// Name (unique)
    pub name: String,
}

impl Resource {
    /// Create a new resource record.
    pub fn new(id: ResourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
