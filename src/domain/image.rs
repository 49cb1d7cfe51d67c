use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validators::required_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyImage {
    pub image_id: i64,
    pub property_id: i64,
    pub image_url: String,
    pub is_cover: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewImage {
    pub image_url: String,
    #[serde(default)]
    pub is_cover: bool,
}

impl NewImage {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            image_url: required_text("image_url", &self.image_url)?,
            ..self
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagePatch {
    pub image_url: Option<String>,
    pub is_cover: Option<bool>,
}

impl ImagePatch {
    pub fn validated(self) -> Result<Self, ValidationError> {
        let image_url = self
            .image_url
            .map(|url| required_text("image_url", &url))
            .transpose()?;
        Ok(Self { image_url, ..self })
    }
}

impl PropertyImage {
    pub fn apply(&mut self, patch: ImagePatch) {
        if let Some(url) = patch.image_url {
            self.image_url = url;
        }
        if let Some(is_cover) = patch.is_cover {
            self.is_cover = is_cover;
        }
    }
}
