//! Route parameters that open a chat view.
//!
//! A chat can be opened through three route shapes:
//!
//! - `/{role}/messages/{id}` -- ambiguous, `id` may be a booking or a session
//! - `/{role}/messages/session/{id}` -- explicitly a direct session
//! - `/{role}/messages?session={id}` -- explicitly a direct session

use serde::{Deserialize, Serialize};

use std::fmt;

/// Which route shape supplied the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteShape {
    /// `/messages/{id}`: booking id or session id.
    Ambiguous,
    /// `/messages/session/{id}`.
    SessionPath,
    /// `/messages?session={id}`.
    SessionQuery,
}

impl RouteShape {
    pub fn is_explicit_direct(self) -> bool {
        matches!(self, RouteShape::SessionPath | RouteShape::SessionQuery)
    }
}

/// An identity extracted from the route, together with the shape it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteParam {
    pub identity: String,
    pub shape: RouteShape,
}

impl RouteParam {
    pub fn ambiguous(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            shape: RouteShape::Ambiguous,
        }
    }

    pub fn direct(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            shape: RouteShape::SessionPath,
        }
    }

    /// Parse a chat route such as `/client/messages/session/abc`.
    ///
    /// Returns `None` when the path is not a chat route or carries no identity.
    pub fn from_path(path: &str) -> Option<Self> {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let messages_at = segments.iter().position(|s| *s == "messages")?;
        let rest = &segments[messages_at + 1..];

        match rest {
            ["session", id] => Some(Self {
                identity: (*id).to_string(),
                shape: RouteShape::SessionPath,
            }),
            [id] if *id != "session" => Some(Self::ambiguous(*id)),
            [] => query.and_then(|q| {
                q.split('&')
                    .filter_map(|pair| pair.split_once('='))
                    .find(|(k, v)| (*k == "session" || *k == "sessionId") && !v.is_empty())
                    .map(|(_, v)| Self {
                        identity: v.to_string(),
                        shape: RouteShape::SessionQuery,
                    })
            }),
            _ => None,
        }
    }
}

impl fmt::Display for RouteParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            RouteShape::Ambiguous => write!(f, "{}", self.identity),
            RouteShape::SessionPath | RouteShape::SessionQuery => {
                write!(f, "session/{}", self.identity)
            }
        }
    }
}
