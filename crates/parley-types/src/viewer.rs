//! The authenticated user looking at a chat view.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Platform role of the current user.
///
/// Decides booking ownership checks and which extra capabilities
/// (e.g. sending on behalf of another user) a chat view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewerRole {
    Client,
    Consultant,
    Admin,
}

impl fmt::Display for ViewerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerRole::Client => write!(f, "client"),
            ViewerRole::Consultant => write!(f, "consultant"),
            ViewerRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for ViewerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(ViewerRole::Client),
            "consultant" => Ok(ViewerRole::Consultant),
            "admin" => Ok(ViewerRole::Admin),
            other => Err(format!("invalid viewer role: '{other}'")),
        }
    }
}

/// The current user as seen by the messaging core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    /// Platform user id (matches `senderId` on messages this user sends).
    pub id: String,
    pub role: ViewerRole,
}

impl Viewer {
    pub fn new(id: impl Into<String>, role: ViewerRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ViewerRole::Admin
    }
}
