//! Authentication state as seen by the cart.
//!
//! The cart only needs to know whether someone is signed in and who. Identity
//! is injected through [`AuthProvider`] so that mode resolution is a pure
//! function of its inputs.

use std::sync::{Arc, PoisonError, RwLock};

use cartsync_core::UserId;
use serde::{Deserialize, Serialize};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User's ID in the cart service.
    pub id: UserId,
    /// User's email address.
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Create a user with only an ID.
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// Source of the current authentication state.
///
/// Read on every cart operation; implementations must not cache on the
/// reconciler's behalf.
pub trait AuthProvider: Send + Sync {
    /// The currently signed-in user, or `None` for a guest.
    fn current_user(&self) -> Option<User>;
}

impl AuthProvider for Option<User> {
    fn current_user(&self) -> Option<User> {
        self.clone()
    }
}

impl<P: AuthProvider + ?Sized> AuthProvider for Arc<P> {
    fn current_user(&self) -> Option<User> {
        (**self).current_user()
    }
}

/// Mutable authentication state shared between the auth flow and the cart.
///
/// Login and registration call [`SessionAuth::login`]; logout calls
/// [`SessionAuth::logout`]. Wrap in an `Arc` to share with a reconciler.
#[derive(Debug, Default)]
pub struct SessionAuth {
    user: RwLock<Option<User>>,
}

impl SessionAuth {
    /// Create an anonymous session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session that is already signed in.
    #[must_use]
    pub fn signed_in(user: User) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    /// Record a successful login or registration.
    pub fn login(&self, user: User) {
        tracing::debug!(user_id = %user.id, "Session signed in");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// Record a logout.
    pub fn logout(&self) {
        tracing::debug!("Session signed out");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }
}

impl AuthProvider for SessionAuth {
    fn current_user(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
