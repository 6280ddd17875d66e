//! Authentication handshake state machine.
//!
//! # Sequence
//!
//! ```text
//! server                                   client
//!   │ {connectUrl}  ───────────────────────► │  redirect, reconnect elsewhere
//!   │ {nonce}       ───────────────────────► │  sign nonce
//!   │ ◄─────────────── AuthenticatedConnectRequest {hmac, authToken?, sessionId?, platform, os}
//!   │ {sessionId}   ───────────────────────► │  authenticated
//! ```
//!
//! The machine is pure: it consumes a [`HandshakeFrame`], updates the
//! [`Session`], and returns the [`HandshakeAction`] the session task must
//! carry out. It restarts from [`HandshakeState::AwaitingChallenge`] on
//! every socket open; a stored auth token and session id are replayed as
//! hints so the server can fast-path re-authentication.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::auth::NonceSigner;
use crate::identifiers::SessionId;
use crate::identity::IdentityProvider;
use crate::protocol::{AuthenticatedConnectRequest, HandshakeFrame};

use super::session::Session;

// ============================================================================
// Types
// ============================================================================

/// Handshake progress on the current socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Socket open, waiting for redirect or nonce.
    AwaitingChallenge,
    /// Nonce received, computing the signature.
    SigningNonce,
    /// Signed reply sent, waiting for the session id.
    AwaitingSession,
    /// Session granted.
    Authenticated,
}

/// What the session task must do after a handshake frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Close the socket and connect to this URL instead.
    Redirect(String),
    /// Transmit the signed reply.
    Authenticate(AuthenticatedConnectRequest),
    /// The session is authenticated under this id.
    Authenticated(SessionId),
    /// Nothing to do.
    Ignore,
}

// ============================================================================
// Handshake
// ============================================================================

/// Drives authentication for one session.
pub(crate) struct Handshake {
    state: HandshakeState,
    signer: Arc<dyn NonceSigner>,
    identity: Arc<dyn IdentityProvider>,
}

impl Handshake {
    /// Creates a machine waiting for its first challenge.
    pub(crate) fn new(signer: Arc<dyn NonceSigner>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            state: HandshakeState::AwaitingChallenge,
            signer,
            identity,
        }
    }

    /// Returns the current state.
    #[inline]
    pub(crate) fn state(&self) -> HandshakeState {
        self.state
    }

    /// Restarts the handshake for a freshly opened socket.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.state = HandshakeState::AwaitingChallenge;
    }

    /// Applies a handshake frame.
    ///
    /// Only the first present field of `connectUrl`, `nonce`, `sessionId`
    /// is acted on; empty strings count as absent.
    pub(crate) fn on_frame(&mut self, frame: HandshakeFrame, session: &mut Session) -> HandshakeAction {
        if let Some(url) = frame.connect_url.filter(|url| !url.is_empty()) {
            self.state = HandshakeState::AwaitingChallenge;
            return HandshakeAction::Redirect(url);
        }

        if let Some(nonce) = frame.nonce.filter(|nonce| !nonce.is_empty()) {
            self.state = HandshakeState::SigningNonce;
            let hmac = self.signer.sign(&nonce);
            let request = AuthenticatedConnectRequest::new(
                hmac,
                session.auth_token.clone(),
                session.session_id.clone(),
                self.identity.platform(),
                self.identity.operating_system(),
            );
            self.state = HandshakeState::AwaitingSession;
            return HandshakeAction::Authenticate(request);
        }

        if let Some(session_id) = frame.session_id.filter(|id| !id.as_str().is_empty()) {
            session.session_id = Some(session_id.clone());
            session.authenticated = true;
            self.state = HandshakeState::Authenticated;
            return HandshakeAction::Authenticated(session_id);
        }

        HandshakeAction::Ignore
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HmacSigner;
    use crate::identity::StaticIdentity;

    fn machine() -> Handshake {
        Handshake::new(
            Arc::new(HmacSigner::new("abc")),
            Arc::new(StaticIdentity::new("Rust", "Linux")),
        )
    }

    #[test]
    fn test_redirect_takes_priority() {
        let mut handshake = machine();
        let mut session = Session::default();
        let frame = HandshakeFrame {
            connect_url: Some("wss://node-7/ws".into()),
            nonce: Some("n1".into()),
            session_id: Some("s".into()),
        };

        assert_eq!(
            handshake.on_frame(frame, &mut session),
            HandshakeAction::Redirect("wss://node-7/ws".into())
        );
        assert_eq!(handshake.state(), HandshakeState::AwaitingChallenge);
        assert!(!session.authenticated);
    }

    #[test]
    fn test_nonce_produces_signed_request() {
        let mut handshake = machine();
        let mut session = Session::default();
        let frame = HandshakeFrame {
            nonce: Some("n1".into()),
            ..Default::default()
        };

        let HandshakeAction::Authenticate(request) = handshake.on_frame(frame, &mut session) else {
            panic!("expected authenticate");
        };
        assert_eq!(request.hmac, HmacSigner::new("abc").sign("n1"));
        assert_eq!(request.auth_token, None);
        assert_eq!(request.session_id, None);
        assert_eq!(request.platform, "Rust");
        assert_eq!(request.os, "Linux");
        assert_eq!(handshake.state(), HandshakeState::AwaitingSession);
    }

    #[test]
    fn test_nonce_replays_stored_hints() {
        let mut handshake = machine();
        let mut session = Session {
            auth_token: Some("tok".into()),
            session_id: Some(SessionId::from("old")),
            authenticated: false,
        };
        let frame = HandshakeFrame {
            nonce: Some("n2".into()),
            ..Default::default()
        };

        let HandshakeAction::Authenticate(request) = handshake.on_frame(frame, &mut session) else {
            panic!("expected authenticate");
        };
        assert_eq!(request.auth_token.as_deref(), Some("tok"));
        assert_eq!(request.session_id, Some(SessionId::from("old")));
    }

    #[test]
    fn test_custom_signer_overrides_hmac() {
        let mut handshake = Handshake::new(
            Arc::new(|nonce: &str| format!("custom-{nonce}")),
            Arc::new(StaticIdentity::new("Rust", "Linux")),
        );
        let frame = HandshakeFrame {
            nonce: Some("n1".into()),
            ..Default::default()
        };

        let HandshakeAction::Authenticate(request) =
            handshake.on_frame(frame, &mut Session::default())
        else {
            panic!("expected authenticate");
        };
        assert_eq!(request.hmac, "custom-n1");
    }

    #[test]
    fn test_session_id_authenticates() {
        let mut handshake = machine();
        let mut session = Session::default();
        let frame = HandshakeFrame {
            session_id: Some("sess-1".into()),
            ..Default::default()
        };

        assert_eq!(
            handshake.on_frame(frame, &mut session),
            HandshakeAction::Authenticated(SessionId::from("sess-1"))
        );
        assert!(session.authenticated);
        assert_eq!(session.session_id, Some(SessionId::from("sess-1")));
        assert_eq!(handshake.state(), HandshakeState::Authenticated);

        handshake.reset();
        assert_eq!(handshake.state(), HandshakeState::AwaitingChallenge);
    }

    #[test]
    fn test_empty_frame_is_ignored() {
        let mut handshake = machine();
        let mut session = Session::default();
        let frame = HandshakeFrame {
            connect_url: Some(String::new()),
            nonce: Some(String::new()),
            session_id: None,
        };

        assert_eq!(handshake.on_frame(frame, &mut session), HandshakeAction::Ignore);
        assert_eq!(handshake.state(), HandshakeState::AwaitingChallenge);
    }
}
