use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validators::required_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    pub amenity_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmenityInput {
    pub name: String,
}

impl AmenityInput {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required_text("name", &self.name)?,
        })
    }
}
