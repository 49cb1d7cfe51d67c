use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Owned;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Cancelled bookings release their dates.
    pub fn holds_dates(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            _ => Err(ValidationError::InvalidFormat("status".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: i64,
    pub traveler_id: i64,
    pub property_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub guests: i32,
    pub status: BookingStatus,
    pub total_price: f64,
}

impl Booking {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date < end && start < self.end_date
    }
}

impl Owned for Booking {
    fn owner_id(&self) -> i64 {
        self.traveler_id
    }
}

/// Body of `POST /bookings`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookingRequest {
    pub property_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub guests: i32,
}

impl BookingRequest {
    /// Whole nights between check-in and check-out dates.
    pub fn nights(&self) -> i64 {
        (self.end_date.date_naive() - self.start_date.date_naive()).num_days()
    }
}

/// Priced booking ready to persist.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub traveler_id: i64,
    pub property_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub guests: i32,
    pub total_price: f64,
}

impl NewBooking {
    pub fn into_booking(self, booking_id: i64) -> Booking {
        Booking {
            booking_id,
            traveler_id: self.traveler_id,
            property_id: self.property_id,
            start_date: self.start_date,
            end_date: self.end_date,
            guests: self.guests,
            status: BookingStatus::Pending,
            total_price: self.total_price,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusUpdate {
    pub status: BookingStatus,
}
