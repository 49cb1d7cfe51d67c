//! Persistence
//!
//! One repository trait per aggregate. `PgStore` is the production backend;
//! `InMemoryStore` keeps everything behind a mutex for local runs and tests.
//! Both implement every trait, and `Repositories` hands them out as trait
//! objects so a single repository can be swapped without touching the rest.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use crate::auth::TokenType;
use crate::domain::{
    Amenity, Booking, BookingStatus, CredentialsUpdate, ImagePatch, NewBooking, NewImage,
    NewProperty, NewUser, ProfilePatch, Property, PropertyFilter, PropertyImage, User, UserProfile,
};
use crate::error::AppError;

/// A persisted session token. Only the digest of the token is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub token_id: i64,
    pub user_id: i64,
    pub token_type: TokenType,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub token_type: TokenType,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts the user together with an empty profile, atomically.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn update_credentials(&self, user_id: i64, update: CredentialsUpdate) -> Result<User, AppError>;
    async fn list_non_admin_users(&self) -> Result<Vec<User>, AppError>;
    /// Removes the user and everything hanging off it. Returns false if absent.
    async fn delete_user(&self, user_id: i64) -> Result<bool, AppError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Replaces every token row of `user_id` with `tokens` in one transaction.
    /// On error nothing changes.
    async fn replace_tokens(&self, user_id: i64, tokens: Vec<NewToken>) -> Result<(), AppError>;
    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRecord>, AppError>;
    async fn tokens_for_user(&self, user_id: i64) -> Result<Vec<TokenRecord>, AppError>;
    /// Returns how many rows were removed.
    async fn delete_tokens(&self, user_id: i64) -> Result<u64, AppError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError>;
    async fn create_profile(&self, user_id: i64, fields: ProfilePatch) -> Result<UserProfile, AppError>;
    async fn save_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError>;
    async fn delete_profile(&self, user_id: i64) -> Result<bool, AppError>;
}

#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn create_property(&self, owner_id: i64, property: NewProperty) -> Result<Property, AppError>;
    async fn find_property(&self, property_id: i64) -> Result<Option<Property>, AppError>;
    async fn save_property(&self, property: &Property) -> Result<Property, AppError>;
    async fn delete_property(&self, property_id: i64) -> Result<bool, AppError>;
    /// Matching properties ordered by id.
    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, AppError>;
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn create_image(&self, property_id: i64, image: NewImage) -> Result<PropertyImage, AppError>;
    async fn find_image(&self, image_id: i64) -> Result<Option<PropertyImage>, AppError>;
    async fn update_image(&self, image_id: i64, patch: ImagePatch) -> Result<PropertyImage, AppError>;
    async fn delete_image(&self, image_id: i64) -> Result<bool, AppError>;
    async fn images_for_property(&self, property_id: i64) -> Result<Vec<PropertyImage>, AppError>;
}

#[async_trait]
pub trait AmenityRepository: Send + Sync {
    async fn list_amenities(&self) -> Result<Vec<Amenity>, AppError>;
    async fn find_amenity(&self, amenity_id: i64) -> Result<Option<Amenity>, AppError>;
    async fn create_amenity(&self, name: &str) -> Result<Amenity, AppError>;
    async fn rename_amenity(&self, amenity_id: i64, name: &str) -> Result<Amenity, AppError>;
    async fn delete_amenity(&self, amenity_id: i64) -> Result<bool, AppError>;
    /// Replaces the property's amenity links in one transaction.
    async fn set_property_amenities(&self, property_id: i64, amenity_ids: &[i64]) -> Result<(), AppError>;
    async fn amenities_for_property(&self, property_id: i64) -> Result<Vec<Amenity>, AppError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Inserts the booking unless a date-holding booking already overlaps it.
    /// Returns `None` on overlap.
    async fn create_booking(&self, booking: NewBooking) -> Result<Option<Booking>, AppError>;
    async fn find_booking(&self, booking_id: i64) -> Result<Option<Booking>, AppError>;
    async fn set_booking_status(&self, booking_id: i64, status: BookingStatus) -> Result<Booking, AppError>;
    async fn bookings_for_traveler(&self, traveler_id: i64) -> Result<Vec<Booking>, AppError>;
    async fn bookings_for_property(&self, property_id: i64) -> Result<Vec<Booking>, AppError>;
}

/// Trait-object handles to every repository.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub properties: Arc<dyn PropertyRepository>,
    pub images: Arc<dyn ImageRepository>,
    pub amenities: Arc<dyn AmenityRepository>,
    pub bookings: Arc<dyn BookingRepository>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + SessionRepository
            + ProfileRepository
            + PropertyRepository
            + ImageRepository
            + AmenityRepository
            + BookingRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            profiles: store.clone(),
            properties: store.clone(),
            images: store.clone(),
            amenities: store.clone(),
            bookings: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()))
    }
}
