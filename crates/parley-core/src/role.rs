//! Per-role routing and capabilities.
//!
//! Client, consultant and admin views share one chat core; they differ only
//! in where they live, where redirects go and whether admins may send on
//! behalf of another participant.

use serde::Serialize;

use parley_types::viewer::ViewerRole;

use crate::session::RedirectReason;

const FORBIDDEN_MESSAGE: &str = "You do not have access to this conversation.";

/// Route layout and capabilities for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleProfile {
    pub role: ViewerRole,
    /// Prefix of chat routes, e.g. `/client/messages`.
    pub route_prefix: &'static str,
    pub can_send_as: bool,
}

impl RoleProfile {
    pub fn for_role(role: ViewerRole) -> Self {
        match role {
            ViewerRole::Client => Self {
                role,
                route_prefix: "/client/messages",
                can_send_as: false,
            },
            ViewerRole::Consultant => Self {
                role,
                route_prefix: "/consultant/messages",
                can_send_as: false,
            },
            ViewerRole::Admin => Self {
                role,
                route_prefix: "/admin/messages",
                can_send_as: true,
            },
        }
    }

    /// The conversation list, used as the redirect target.
    pub fn list_route(&self) -> &'static str {
        self.route_prefix
    }

    pub fn chat_route(&self, identity: &str) -> String {
        format!("{}/{identity}", self.route_prefix)
    }

    pub fn session_route(&self, session_id: &str) -> String {
        format!("{}/session/{session_id}", self.route_prefix)
    }

    /// Build the redirect for `reason`.
    pub fn redirect(&self, reason: RedirectReason, navigate: bool) -> Redirect {
        Redirect {
            reason,
            target: self.list_route().to_string(),
            message: match reason {
                RedirectReason::Forbidden => Some(FORBIDDEN_MESSAGE.to_string()),
                RedirectReason::NotFound => None,
            },
            navigate,
        }
    }
}

/// A navigation away from the current chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub reason: RedirectReason,
    pub target: String,
    /// User-facing notice. Not-found redirects are silent.
    pub message: Option<String>,
    /// False when the navigation already fired for this identity.
    pub navigate: bool,
}
