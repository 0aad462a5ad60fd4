//! Caller identity and role checks.
//!
//! Authentication happens in the fronting application, which forwards the user id and role
//! as headers. Every route that needs a caller takes a [`Caller`] and asks it for a
//! [`Capability`].

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::Unauthorized),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    RequestQuote,
    BookStay,
    ViewOwnReservations,
    CancelOwnReservation,
    /// Any reservation, any user: listings, reactivation, cache control
    ManageReservations,
}

impl Role {
    pub fn permits(self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Admin, _) => true,
            (Role::Client, Capability::ManageReservations) => false,
            (Role::Client, _) => true,
        }
    }
}

/// Authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.role.permits(capability) {
            Ok(())
        } else {
            tracing::debug!("{:?} denied {:?} to user {}", self.role, capability, self.user_id);
            Err(AppError::Forbidden)
        }
    }

    /// Allow managers on anything, and owners with `capability` on their own records
    pub fn require_owner(&self, owner_id: Uuid, capability: Capability) -> Result<(), AppError> {
        if self.role.permits(Capability::ManageReservations) {
            return Ok(());
        }
        if owner_id != self.user_id {
            tracing::debug!("User {} is not the owner of the requested record", self.user_id);
            return Err(AppError::Forbidden);
        }
        self.require(capability)
    }

    /// Owner of a new booking: the caller, or the client a manager books on behalf of
    pub fn booking_owner(&self, on_behalf_of: Option<Uuid>) -> Result<Uuid, AppError> {
        match on_behalf_of {
            None => Ok(self.user_id),
            Some(user_id) => {
                self.require(Capability::ManageReservations)?;
                Ok(user_id)
            }
        }
    }

    fn from_parts(parts: &Parts) -> Result<Self, AppError> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .ok_or(AppError::Unauthorized)
        };

        let user_id = Uuid::parse_str(header(USER_ID_HEADER)?.trim())
            .map_err(|_| AppError::Unauthorized)?;
        let role = header(USER_ROLE_HEADER)?.parse()?;

        Ok(Self { user_id, role })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Caller::from_parts(parts)
    }
}
