use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Owned;

pub const DEFAULT_LANGUAGE: &str = "en";

/// Optional personal details attached 1:1 to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub profile_id: i64,
    pub user_id: i64,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub nationality: Option<String>,
    pub preferred_language: String,
}

/// Partial profile body. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub nationality: Option<String>,
    pub preferred_language: Option<String>,
}

impl UserProfile {
    pub fn empty(profile_id: i64, user_id: i64) -> Self {
        Self {
            profile_id,
            user_id,
            full_name: None,
            phone_number: None,
            gender: None,
            birth_date: None,
            bio: None,
            profile_picture: None,
            nationality: None,
            preferred_language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn apply(&mut self, patch: ProfilePatch) {
        let ProfilePatch {
            full_name,
            phone_number,
            gender,
            birth_date,
            bio,
            profile_picture,
            nationality,
            preferred_language,
        } = patch;

        if full_name.is_some() {
            self.full_name = full_name;
        }
        if phone_number.is_some() {
            self.phone_number = phone_number;
        }
        if gender.is_some() {
            self.gender = gender;
        }
        if birth_date.is_some() {
            self.birth_date = birth_date;
        }
        if bio.is_some() {
            self.bio = bio;
        }
        if profile_picture.is_some() {
            self.profile_picture = profile_picture;
        }
        if nationality.is_some() {
            self.nationality = nationality;
        }
        if let Some(language) = preferred_language {
            self.preferred_language = language;
        }
    }
}

impl Owned for UserProfile {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}
