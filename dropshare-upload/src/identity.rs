use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Profile of the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: Option<String>,
    pub primary_email: Option<String>,
}

impl UserProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_full_name<S: Into<String>>(mut self, name: S) -> Self {
        self.full_name = Some(name.into());
        self
    }

    pub fn with_primary_email<S: Into<String>>(mut self, email: S) -> Self {
        self.primary_email = Some(email.into());
        self
    }

    /// Full name, or empty
    pub fn name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("")
    }

    /// Primary email, or empty
    pub fn email(&self) -> &str {
        self.primary_email.as_deref().unwrap_or("")
    }
}

/// What the identity provider currently knows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    pub is_loaded: bool,
    pub is_signed_in: bool,
    pub user: Option<UserProfile>,
}

impl IdentityState {
    /// Still resolving the session
    pub fn loading() -> Self {
        Self::default()
    }

    pub fn signed_out() -> Self {
        Self {
            is_loaded: true,
            is_signed_in: false,
            user: None,
        }
    }

    pub fn signed_in(user: UserProfile) -> Self {
        Self {
            is_loaded: true,
            is_signed_in: true,
            user: Some(user),
        }
    }

    /// Loading finished and nobody is signed in
    pub fn requires_sign_in(&self) -> bool {
        self.is_loaded && !self.is_signed_in
    }
}

/// Source of identity state; every change is pushed to subscribers
pub trait IdentityProvider: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<IdentityState>;
}

/// Identity provider driven by the embedding application
#[derive(Clone)]
pub struct SessionIdentity {
    state: Arc<watch::Sender<IdentityState>>,
}

impl SessionIdentity {
    pub fn new(initial: IdentityState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn loading() -> Self {
        Self::new(IdentityState::loading())
    }

    pub fn current(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    pub fn set(&self, state: IdentityState) {
        self.state.send_replace(state);
    }

    pub fn sign_in(&self, user: UserProfile) {
        self.set(IdentityState::signed_in(user));
    }

    pub fn sign_out(&self) {
        self.set(IdentityState::signed_out());
    }
}

impl IdentityProvider for SessionIdentity {
    fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }
}
