//! Resource services
//!
//! Each operation receives the caller's resolved `Identity` (when it needs
//! one), settles existence first, then applies the role or ownership gate,
//! then validates and writes. Handlers in `routes` only translate HTTP.

pub mod admin;
pub mod amenities;
pub mod auth;
pub mod bookings;
pub mod images;
pub mod properties;
pub mod users;

use serde::{Deserialize, Serialize};

/// `{"msg": ...}` acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}
