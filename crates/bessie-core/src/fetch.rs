//! Fetch bookkeeping shared by the loaders: tickets, liveness, outcomes.
//!
//! A state owner never awaits. It hands out a [`FetchTicket`] describing
//! the request, someone else runs it, and the result comes back as a
//! [`Completion`]. Each ticket carries a [`LiveToken`] captured when it
//! was issued; once the owner revokes its [`Liveness`] (dispose, mode
//! switch, re-initialize) every outstanding completion is stale and is
//! dropped without touching state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::source::SourceError;
use crate::types::{ClusterEntry, ImagePage};

/// Owner side of a liveness flag.
#[derive(Debug)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Capture the flag for an operation starting now.
    pub fn token(&self) -> LiveToken {
        LiveToken {
            alive: Arc::clone(&self.alive),
        }
    }

    /// Mark every token handed out so far as stale.
    pub fn revoke(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Revoke the current flag and start a fresh one.
    pub fn renew(&mut self) {
        self.revoke();
        *self = Self::new();
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Liveness {
    fn drop(&mut self) {
        self.revoke();
    }
}

/// Operation side of a liveness flag.
#[derive(Debug, Clone)]
pub struct LiveToken {
    alive: Arc<AtomicBool>,
}

impl LiveToken {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// What a ticket asks the backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Images { offset: usize, limit: usize },
    Clusters,
    Clustered { offset: usize, limit: usize },
}

/// A fetch issued by a state owner and not yet applied.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    /// Owner-local sequence number; a completion only applies to the
    /// ticket its owner is currently waiting on.
    pub seq: u64,
    pub request: Request,
    token: LiveToken,
}

impl FetchTicket {
    pub(crate) fn new(seq: u64, request: Request, token: LiveToken) -> Self {
        Self {
            seq,
            request,
            token,
        }
    }

    /// False once the issuing owner has been torn down or superseded.
    pub fn is_live(&self) -> bool {
        self.token.is_alive()
    }
}

/// Successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Page(ImagePage),
    Clusters(Vec<ClusterEntry>),
}

/// A finished fetch, on its way back to the owner.
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: FetchTicket,
    pub outcome: Result<Payload, SourceError>,
}

/// Outcome of the most recent operation of a state owner.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState<T> {
    #[default]
    Idle,
    Pending,
    Success(T),
    Failure(SourceError),
}

impl<T> FetchState<T> {
    /// Move from `Pending` to a terminal state, unless the operation's
    /// owner is gone. Returns `None` for a stale completion.
    pub fn resolve(token_live: bool, outcome: Result<T, SourceError>) -> Option<Self> {
        if !token_live {
            return None;
        }
        Some(match outcome {
            Ok(value) => FetchState::Success(value),
            Err(err) => FetchState::Failure(err),
        })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_follows_revoke() {
        let live = Liveness::new();
        let token = live.token();
        assert!(token.is_alive());
        live.revoke();
        assert!(!token.is_alive());
    }

    #[test]
    fn test_renew_keeps_old_tokens_dead() {
        let mut live = Liveness::new();
        let old = live.token();
        live.renew();
        let new = live.token();
        assert!(!old.is_alive());
        assert!(new.is_alive());
        assert!(live.is_alive());
    }

    #[test]
    fn test_drop_revokes() {
        let live = Liveness::new();
        let token = live.token();
        drop(live);
        assert!(!token.is_alive());
    }

    #[test]
    fn test_resolve_discards_stale() {
        let state: Option<FetchState<u32>> = FetchState::resolve(false, Ok(3));
        assert!(state.is_none());
        assert_eq!(FetchState::resolve(true, Ok(3)), Some(FetchState::Success(3)));
        assert_eq!(
            FetchState::<u32>::resolve(true, Err(SourceError::Unauthorized)),
            Some(FetchState::Failure(SourceError::Unauthorized))
        );
    }
}
