//! Booking types as seen by the messaging core.
//!
//! Only the fields needed for ownership checks and session derivation are
//! modeled; everything else the backend returns is ignored.

use serde::{Deserialize, Serialize};

use crate::viewer::{Viewer, ViewerRole};

/// A user attached to a booking (client or consultant side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingParty {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The service a booking was made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingService {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Booking lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// A paid consultation booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub client: BookingParty,
    pub consultant: BookingParty,
    #[serde(default)]
    pub service: Option<BookingService>,
    pub status: BookingStatus,
}

impl Booking {
    /// Whether `viewer` may open this booking's chat.
    ///
    /// Clients must own the client side, consultants the consultant side.
    /// Admins bypass the check.
    pub fn is_accessible_by(&self, viewer: &Viewer) -> bool {
        match viewer.role {
            ViewerRole::Client => self.client.user_id == viewer.id,
            ViewerRole::Consultant => self.consultant.user_id == viewer.id,
            ViewerRole::Admin => true,
        }
    }

    /// Participant ids in (client, consultant) order.
    pub fn participants(&self) -> Vec<String> {
        vec![self.client.user_id.clone(), self.consultant.user_id.clone()]
    }
}
