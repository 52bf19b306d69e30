//! Network participants that may hold or store content.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A network entity that might already hold, or might be asked to
/// store, a piece of content.
///
/// Participants are read-only references: they identify an endpoint but
/// own no network state themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Participant {
    /// Local pinning service, addressed by daemon index.
    PinningService { index: u32 },
    /// Full network node, addressed by node index.
    Node { index: u32 },
    /// Storage provider, addressed by its on-chain address.
    StorageProvider { address: String },
}

impl Participant {
    /// Short human-readable label, used in logs and display rows.
    pub fn label(&self) -> String {
        match self {
            Participant::PinningService { index } => format!("pin-{index}"),
            Participant::Node { index } => format!("node-{index}"),
            Participant::StorageProvider { address } => format!("provider-{address}"),
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
