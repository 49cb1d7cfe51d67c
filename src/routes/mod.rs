pub mod admin;
pub mod amenities;
pub mod auth;
pub mod bookings;
mod health_check;
pub mod images;
pub mod properties;
pub mod users;

pub use health_check::health_check;
