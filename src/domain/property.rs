use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::Owned;
use crate::error::ValidationError;
use crate::validators::required_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    Villa,
    House,
    Condo,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::Villa => "villa",
            PropertyType::House => "house",
            PropertyType::Condo => "condo",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apartment" => Ok(PropertyType::Apartment),
            "villa" => Ok(PropertyType::Villa),
            "house" => Ok(PropertyType::House),
            "condo" => Ok(PropertyType::Condo),
            _ => Err(ValidationError::InvalidFormat("property_type".to_string())),
        }
    }
}

/// A rental listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub property_id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price_per_night: f64,
    pub address: String,
    pub city: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_guests: i32,
    pub property_type: PropertyType,
    pub is_available: bool,
}

fn available_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewProperty {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_per_night: f64,
    pub address: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub max_guests: i32,
    pub property_type: PropertyType,
    #[serde(default = "available_by_default")]
    pub is_available: bool,
}

impl NewProperty {
    pub fn validated(self) -> Result<Self, ValidationError> {
        check_price(self.price_per_night)?;
        check_guests(self.max_guests)?;
        check_coordinates(self.latitude, self.longitude)?;

        Ok(Self {
            title: required_text("title", &self.title)?,
            address: required_text("address", &self.address)?,
            city: required_text("city", &self.city)?,
            country: required_text("country", &self.country)?,
            ..self
        })
    }

    pub fn into_property(self, property_id: i64, owner_id: i64) -> Property {
        Property {
            property_id,
            owner_id,
            title: self.title,
            description: self.description,
            price_per_night: self.price_per_night,
            address: self.address,
            city: self.city,
            country: self.country,
            latitude: self.latitude,
            longitude: self.longitude,
            max_guests: self.max_guests,
            property_type: self.property_type,
            is_available: self.is_available,
        }
    }
}

/// Partial property body. Ownership is not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_per_night: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_guests: Option<i32>,
    pub property_type: Option<PropertyType>,
    pub is_available: Option<bool>,
}

impl PropertyPatch {
    pub fn validated(self) -> Result<Self, ValidationError> {
        if let Some(price) = self.price_per_night {
            check_price(price)?;
        }
        if let Some(guests) = self.max_guests {
            check_guests(guests)?;
        }
        check_coordinates(self.latitude, self.longitude)?;

        let required = |field: &str, value: Option<String>| {
            value.map(|v| required_text(field, &v)).transpose()
        };

        Ok(Self {
            title: required("title", self.title)?,
            address: required("address", self.address)?,
            city: required("city", self.city)?,
            country: required("country", self.country)?,
            ..self
        })
    }
}

impl Property {
    pub fn apply(&mut self, patch: PropertyPatch) {
        let PropertyPatch {
            title,
            description,
            price_per_night,
            address,
            city,
            country,
            latitude,
            longitude,
            max_guests,
            property_type,
            is_available,
        } = patch;

        if let Some(title) = title {
            self.title = title;
        }
        if description.is_some() {
            self.description = description;
        }
        if let Some(price) = price_per_night {
            self.price_per_night = price;
        }
        if let Some(address) = address {
            self.address = address;
        }
        if let Some(city) = city {
            self.city = city;
        }
        if let Some(country) = country {
            self.country = country;
        }
        if latitude.is_some() {
            self.latitude = latitude;
        }
        if longitude.is_some() {
            self.longitude = longitude;
        }
        if let Some(guests) = max_guests {
            self.max_guests = guests;
        }
        if let Some(kind) = property_type {
            self.property_type = kind;
        }
        if let Some(available) = is_available {
            self.is_available = available;
        }
    }
}

impl Owned for Property {
    fn owner_id(&self) -> i64 {
        self.owner_id
    }
}

/// Public listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyFilter {
    pub city: Option<String>,
    pub country: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub is_available: Option<bool>,
}

impl PropertyFilter {
    /// Listings default to available properties only.
    pub fn normalized(self) -> Self {
        let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            city: blank_to_none(self.city),
            country: blank_to_none(self.country),
            is_available: self.is_available.or(Some(true)),
            ..self
        }
    }

    pub fn matches(&self, property: &Property) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| match needle {
            Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        };

        contains(&property.city, &self.city)
            && contains(&property.country, &self.country)
            && self.min_price.map_or(true, |min| property.price_per_night >= min)
            && self.max_price.map_or(true, |max| property.price_per_night <= max)
            && self.is_available.map_or(true, |a| property.is_available == a)
    }
}

fn check_price(price: f64) -> Result<(), ValidationError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ValidationError::Rule(
            "price_per_night must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn check_guests(guests: i32) -> Result<(), ValidationError> {
    if guests < 1 {
        return Err(ValidationError::Rule("max_guests must be at least 1".to_string()));
    }
    Ok(())
}

fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), ValidationError> {
    if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        return Err(ValidationError::Rule("latitude must be within -90..=90".to_string()));
    }
    if longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
        return Err(ValidationError::Rule("longitude must be within -180..=180".to_string()));
    }
    Ok(())
}
