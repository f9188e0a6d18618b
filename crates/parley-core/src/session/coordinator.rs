//! Fetch coordinator for a single open chat view.
//!
//! Enforces single-flight resolution per identity, rejects resolution of a
//! new identity while another is still in flight, memoizes identities that
//! resolved to "not found", and latches redirects so the navigation side
//! effect fires at most once per identity transition.
//!
//! All state lives in one tagged union ([`FetchState`]) plus a handful of
//! per-view fields, and every change goes through [`FetchCoordinator::reduce`].

use std::collections::HashSet;

use parley_types::error::FailureKind;

use super::resolver::{RedirectReason, ResolvedSession};

/// Resolution state of the view.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    Idle,
    /// A resolve for `identity` is in flight.
    Fetching { identity: String },
    Resolved {
        identity: String,
        session: ResolvedSession,
    },
    Failed {
        identity: String,
        kind: FailureKind,
    },
}

/// Inputs to the reducer.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    /// The route now points at `identity`.
    Navigate(String),
    /// Ask permission to resolve `identity`.
    Request(String),
    /// An in-flight resolve finished successfully.
    Succeeded {
        identity: String,
        session: ResolvedSession,
    },
    /// An in-flight resolve failed.
    Failed {
        identity: String,
        kind: FailureKind,
    },
    /// The message poll for the active identity hit a terminal failure.
    FeedFailed { kind: FailureKind },
}

/// What the caller should do after an event was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing changed.
    Noop,
    /// The route moved to a new identity; per-identity state was discarded.
    Reset,
    /// Go ahead and resolve; the identity is now `Fetching`.
    Proceed,
    /// Same identity already in flight; do not start another request.
    AlreadyFetching,
    /// Same identity already resolved; reuse the result.
    AlreadyResolved(ResolvedSession),
    /// Another identity is still in flight; retry once it settles.
    Rejected { in_flight: String },
    /// Request for an identity the route no longer points at.
    Stale,
    /// The result was accepted for the active identity.
    Applied(ResolvedSession),
    /// The result belonged to an identity the route has moved away from.
    Discarded,
    /// Redirect away from the active identity. `navigate` is true only the
    /// first time per identity transition.
    Redirect {
        reason: RedirectReason,
        navigate: bool,
    },
    /// Transient failure; the identity is back to `Idle` and may be retried.
    Retryable,
}

/// Per-view fetch coordinator.
#[derive(Debug)]
pub struct FetchCoordinator {
    state: FetchState,
    active: Option<String>,
    failed: HashSet<String>,
    access_denied: bool,
    redirecting: bool,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self {
            state: FetchState::Idle,
            active: None,
            failed: HashSet::new(),
            access_denied: false,
            redirecting: false,
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn active_identity(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Identity with a resolve in flight, if any.
    pub fn fetching_identity(&self) -> Option<&str> {
        match &self.state {
            FetchState::Fetching { identity } => Some(identity),
            _ => None,
        }
    }

    pub fn is_known_missing(&self, identity: &str) -> bool {
        self.failed.contains(identity)
    }

    pub fn access_denied(&self) -> bool {
        self.access_denied
    }

    pub fn is_redirecting(&self) -> bool {
        self.redirecting
    }

    /// The resolved session for the active identity.
    pub fn resolved(&self) -> Option<&ResolvedSession> {
        match &self.state {
            FetchState::Resolved { identity, session } if self.is_active(identity) => Some(session),
            _ => None,
        }
    }

    /// Replace the resolved session for the active identity (e.g. after the
    /// session for a booking was created by the first send).
    pub fn update_resolved(&mut self, session: ResolvedSession) -> bool {
        match &mut self.state {
            FetchState::Resolved {
                identity,
                session: current,
            } if self.active.as_deref() == Some(identity.as_str()) => {
                *current = session;
                true
            }
            _ => false,
        }
    }

    fn is_active(&self, identity: &str) -> bool {
        self.active.as_deref() == Some(identity)
    }

    /// Fire the redirect latch. Returns true only on the first call per transition.
    fn latch_redirect(&mut self) -> bool {
        !std::mem::replace(&mut self.redirecting, true)
    }

    /// Apply one event.
    pub fn reduce(&mut self, event: FetchEvent) -> Transition {
        match event {
            FetchEvent::Navigate(identity) => self.navigate(identity),
            FetchEvent::Request(identity) => self.request(identity),
            FetchEvent::Succeeded { identity, session } => self.succeeded(identity, session),
            FetchEvent::Failed { identity, kind } => self.failed(identity, kind),
            FetchEvent::FeedFailed { kind } => self.feed_failed(kind),
        }
    }

    fn navigate(&mut self, identity: String) -> Transition {
        if self.is_active(&identity) {
            return Transition::Noop;
        }

        self.active = Some(identity);
        self.redirecting = false;
        self.access_denied = false;

        // An in-flight resolve keeps its slot until it settles; its result
        // will be discarded because it no longer matches the active identity.
        if !matches!(self.state, FetchState::Fetching { .. }) {
            self.state = FetchState::Idle;
        }
        Transition::Reset
    }

    fn request(&mut self, identity: String) -> Transition {
        if !self.is_active(&identity) {
            return Transition::Stale;
        }

        if self.failed.contains(&identity) {
            let navigate = self.latch_redirect();
            if !matches!(self.state, FetchState::Fetching { .. }) {
                self.state = FetchState::Failed {
                    identity,
                    kind: FailureKind::NotFound,
                };
            }
            return Transition::Redirect {
                reason: RedirectReason::NotFound,
                navigate,
            };
        }

        match &self.state {
            FetchState::Fetching { identity: in_flight } if *in_flight == identity => {
                Transition::AlreadyFetching
            }
            FetchState::Fetching { identity: in_flight } => Transition::Rejected {
                in_flight: in_flight.clone(),
            },
            FetchState::Resolved {
                identity: resolved,
                session,
            } if *resolved == identity => Transition::AlreadyResolved(session.clone()),
            FetchState::Failed {
                identity: failed,
                kind: FailureKind::Forbidden,
            } if *failed == identity => Transition::Redirect {
                reason: RedirectReason::Forbidden,
                navigate: self.latch_redirect(),
            },
            _ => {
                self.state = FetchState::Fetching { identity };
                Transition::Proceed
            }
        }
    }

    fn succeeded(&mut self, identity: String, session: ResolvedSession) -> Transition {
        if self.fetching_identity() != Some(identity.as_str()) {
            return Transition::Noop;
        }
        if !self.is_active(&identity) {
            self.state = FetchState::Idle;
            return Transition::Discarded;
        }
        self.state = FetchState::Resolved {
            identity,
            session: session.clone(),
        };
        Transition::Applied(session)
    }

    fn failed(&mut self, identity: String, kind: FailureKind) -> Transition {
        if kind == FailureKind::NotFound {
            // A missing identity stays missing regardless of where the route went.
            self.failed.insert(identity.clone());
        }

        if self.fetching_identity() != Some(identity.as_str()) {
            return Transition::Noop;
        }
        if !self.is_active(&identity) {
            self.state = FetchState::Idle;
            return Transition::Discarded;
        }

        match kind {
            FailureKind::Transient => {
                self.state = FetchState::Idle;
                Transition::Retryable
            }
            FailureKind::NotFound | FailureKind::Forbidden => {
                if kind == FailureKind::Forbidden {
                    self.access_denied = true;
                }
                self.state = FetchState::Failed { identity, kind };
                Transition::Redirect {
                    reason: redirect_reason(kind),
                    navigate: self.latch_redirect(),
                }
            }
        }
    }

    fn feed_failed(&mut self, kind: FailureKind) -> Transition {
        let Some(identity) = self.active.clone() else {
            return Transition::Noop;
        };
        match kind {
            FailureKind::Transient => Transition::Noop,
            FailureKind::NotFound | FailureKind::Forbidden => {
                if kind == FailureKind::NotFound {
                    self.failed.insert(identity.clone());
                } else {
                    self.access_denied = true;
                }
                if !matches!(self.state, FetchState::Fetching { .. }) {
                    self.state = FetchState::Failed { identity, kind };
                }
                Transition::Redirect {
                    reason: redirect_reason(kind),
                    navigate: self.latch_redirect(),
                }
            }
        }
    }
}

fn redirect_reason(kind: FailureKind) -> RedirectReason {
    match kind {
        FailureKind::Forbidden => RedirectReason::Forbidden,
        FailureKind::NotFound | FailureKind::Transient => RedirectReason::NotFound,
    }
}

impl Default for FetchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
