//! Handshake state of one pull user.
//!
//! ```text
//! Unattached --attach--> Attached{seed} --authorize--> Authorized{token}
//!      ^                       |                              |
//!      +------- any attach restarts from a fresh seed --------+
//! ```
//!
//! The proof sent with `authorize` is `H(encoded_pat + seed)` where `H` is
//! SHA-512 rendered as padded standard base64.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use sha2::{Digest, Sha512};
use spokes_domain::id::{UserId, new_secret};
use spokes_domain::time::{self, Timestamp};

use crate::queue::CommandQueue;

/// `{uid, pat}`: registration payload of the pull variant. `pat` is
/// already encoded by the hub.
#[derive(Debug, Clone, Deserialize)]
pub struct PatAuth {
    pub uid: UserId,
    pub pat: String,
}

/// `SHA-512` of the UTF-8 bytes, as padded standard base64.
#[must_use]
pub fn hash(message: &str) -> String {
    STANDARD.encode(Sha512::digest(message.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Unattached,
    Attached { seed: String },
    Authorized { token: String },
}

/// Everything the pull variant keeps per user besides the common fields.
#[derive(Debug, Clone)]
pub struct PullSession {
    encoded_pat: String,
    pub handshake: Handshake,
    pub queue: CommandQueue,
    /// Ask the device for its device list on the next idle poll.
    pub need_devices: bool,
    /// When the device last polled, `None` until its first poll.
    pub last_poll: Option<Timestamp>,
}

/// Why an `authorize` was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeError {
    /// No seed has been issued since registration or the last authorize.
    NotAttached,
    BadProof,
}

impl PullSession {
    #[must_use]
    pub fn new(encoded_pat: impl Into<String>) -> Self {
        Self {
            encoded_pat: encoded_pat.into(),
            handshake: Handshake::Unattached,
            queue: CommandQueue::default(),
            need_devices: false,
            last_poll: None,
        }
    }

    /// Issue a fresh seed, dropping any earlier seed or token.
    pub fn attach(&mut self) -> String {
        let seed = new_secret();
        self.handshake = Handshake::Attached { seed: seed.clone() };
        seed
    }

    /// Check the proof against the current seed and mint a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizeError::NotAttached`] without a pending seed and
    /// [`AuthorizeError::BadProof`] when the proof does not match. Neither
    /// changes the state.
    pub fn authorize(&mut self, patencoded: &str) -> Result<String, AuthorizeError> {
        let Handshake::Attached { seed } = &self.handshake else {
            return Err(AuthorizeError::NotAttached);
        };
        if hash(&format!("{}{seed}", self.encoded_pat)) != patencoded {
            return Err(AuthorizeError::BadProof);
        }
        let token = new_secret();
        self.handshake = Handshake::Authorized {
            token: token.clone(),
        };
        self.need_devices = true;
        Ok(token)
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match &self.handshake {
            Handshake::Authorized { token } => Some(token),
            _ => None,
        }
    }

    pub fn record_poll(&mut self) {
        self.last_poll = Some(time::now());
    }

    /// Time since the last poll as seen at `now`; `None` if it never polled.
    #[must_use]
    pub fn idle_for(&self, now: Timestamp) -> Option<Duration> {
        let last = self.last_poll?;
        Some((now - last).to_std().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_hash_with_sha512_base64() {
        let digest = hash("abc");
        assert_eq!(
            digest,
            "3a81oZNherrMQXNJriBBMRLm+k6JqX6iCp7u5ktV05ohkpkqJ0/BqDa6PCOj/uu9RU1EI2Q86A4qmslPpUyknw=="
        );
        assert_eq!(digest.len(), 88);
    }

    #[test]
    fn should_authorize_with_correct_proof() {
        let mut session = PullSession::new("ENCODED");
        let seed = session.attach();
        assert_eq!(seed.len(), 32);

        let token = session.authorize(&hash(&format!("ENCODED{seed}"))).unwrap();

        assert_eq!(token.len(), 32);
        assert_eq!(session.token(), Some(token.as_str()));
        assert!(session.need_devices);
    }

    #[test]
    fn should_refuse_wrong_proof_and_stay_attached() {
        let mut session = PullSession::new("ENCODED");
        let seed = session.attach();

        let result = session.authorize(&hash("something else"));

        assert_eq!(result, Err(AuthorizeError::BadProof));
        assert_eq!(session.handshake, Handshake::Attached { seed });
        assert!(session.token().is_none());
        assert!(!session.need_devices);
    }

    #[test]
    fn should_refuse_authorize_before_attach() {
        let mut session = PullSession::new("ENCODED");
        assert_eq!(
            session.authorize(&hash("ENCODED")),
            Err(AuthorizeError::NotAttached)
        );
    }

    #[test]
    fn should_drop_token_on_reattach() {
        let mut session = PullSession::new("P");
        let seed = session.attach();
        session.authorize(&hash(&format!("P{seed}"))).unwrap();

        let new_seed = session.attach();

        assert_ne!(new_seed, seed);
        assert!(session.token().is_none());
    }

    #[test]
    fn should_measure_idle_time_since_last_poll() {
        let mut session = PullSession::new("P");
        let now: Timestamp = "2026-03-01T12:10:00Z".parse().unwrap();
        assert_eq!(session.idle_for(now), None);

        session.last_poll = Some("2026-03-01T12:00:00Z".parse().unwrap());
        assert_eq!(session.idle_for(now), Some(Duration::from_secs(600)));

        session.record_poll();
        assert_eq!(session.idle_for(now), Some(Duration::ZERO));
    }

    #[test]
    fn should_not_reuse_seed_after_authorize() {
        let mut session = PullSession::new("P");
        let seed = session.attach();
        let proof = hash(&format!("P{seed}"));
        session.authorize(&proof).unwrap();
        assert_eq!(session.authorize(&proof), Err(AuthorizeError::NotAttached));
    }
}
