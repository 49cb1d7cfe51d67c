//! Marketplace entities and the write-side inputs that create or patch them.

mod amenity;
mod booking;
mod image;
mod profile;
mod property;
mod user;

pub use amenity::{Amenity, AmenityInput};
pub use booking::{Booking, BookingRequest, BookingStatus, NewBooking, StatusUpdate};
pub use image::{ImagePatch, NewImage, PropertyImage};
pub use profile::{ProfilePatch, UserProfile, DEFAULT_LANGUAGE};
pub use property::{NewProperty, Property, PropertyFilter, PropertyPatch, PropertyType};
pub use user::{CredentialsUpdate, NewUser, User, UserResponse};
