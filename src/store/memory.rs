use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    AmenityRepository, BookingRepository, ImageRepository, NewToken, ProfileRepository,
    PropertyRepository, SessionRepository, TokenRecord, UserRepository,
};
use crate::domain::{
    Amenity, Booking, BookingStatus, CredentialsUpdate, ImagePatch, NewBooking, NewImage,
    NewProperty, NewUser, ProfilePatch, Property, PropertyFilter, PropertyImage, User, UserProfile,
};
use crate::error::{AppError, DatabaseError};

#[derive(Default)]
struct Sequences {
    user: i64,
    profile: i64,
    token: i64,
    property: i64,
    image: i64,
    amenity: i64,
    booking: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Default)]
struct MemoryState {
    seq: Sequences,
    users: BTreeMap<i64, User>,
    /// keyed by user id
    profiles: BTreeMap<i64, UserProfile>,
    tokens: Vec<TokenRecord>,
    properties: BTreeMap<i64, Property>,
    images: BTreeMap<i64, PropertyImage>,
    amenities: BTreeMap<i64, Amenity>,
    property_amenities: BTreeMap<i64, BTreeSet<i64>>,
    bookings: BTreeMap<i64, Booking>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.user_id) != except)
    }

    fn require_user(&self, user_id: i64) -> Result<(), AppError> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(foreign_key("user", user_id))
        }
    }

    fn require_property(&self, property_id: i64) -> Result<(), AppError> {
        if self.properties.contains_key(&property_id) {
            Ok(())
        } else {
            Err(foreign_key("property", property_id))
        }
    }

    fn remove_property(&mut self, property_id: i64) -> bool {
        let existed = self.properties.remove(&property_id).is_some();
        self.images.retain(|_, image| image.property_id != property_id);
        self.property_amenities.remove(&property_id);
        self.bookings.retain(|_, booking| booking.property_id != property_id);
        existed
    }
}

fn foreign_key(table: &str, id: i64) -> AppError {
    AppError::Database(DatabaseError::QueryExecution(format!(
        "foreign key violation: {} {} does not exist",
        table, id
    )))
}

/// Process-local store. All state sits behind one mutex, so every method is
/// atomic with respect to every other.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }

    /// Flips the elevated flags of a user. There is no HTTP route for this;
    /// it exists for seeding local runs and tests.
    pub fn set_roles(&self, user_id: i64, is_admin: bool, is_staff: bool) -> Result<(), AppError> {
        let mut state = self.state()?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("User"))?;
        user.is_admin = is_admin;
        user.is_staff = is_staff;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let mut state = self.state()?;

        if state.email_taken(&new.email, None) {
            return Err(AppError::duplicate("Email already registered"));
        }
        if state.users.values().any(|u| u.username == new.username) {
            return Err(AppError::duplicate("Username already taken"));
        }

        let user_id = next(&mut state.seq.user);
        let profile_id = next(&mut state.seq.profile);
        let user = User {
            user_id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            is_admin: new.is_admin,
            is_staff: new.is_staff,
        };

        state.users.insert(user_id, user.clone());
        state.profiles.insert(user_id, UserProfile::empty(profile_id, user_id));
        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        Ok(self.state()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .state()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_credentials(&self, user_id: i64, update: CredentialsUpdate) -> Result<User, AppError> {
        let mut state = self.state()?;

        if let Some(email) = &update.email {
            if state.email_taken(email, Some(user_id)) {
                return Err(AppError::duplicate("Email already registered"));
            }
        }

        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("User"))?;
        user.apply(update);
        Ok(user.clone())
    }

    async fn list_non_admin_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self
            .state()?
            .users
            .values()
            .filter(|u| !u.is_admin)
            .cloned()
            .collect())
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, AppError> {
        let mut state = self.state()?;
        if state.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        state.profiles.remove(&user_id);
        state.tokens.retain(|t| t.user_id != user_id);
        state.bookings.retain(|_, b| b.traveler_id != user_id);

        let owned: Vec<i64> = state
            .properties
            .values()
            .filter(|p| p.owner_id == user_id)
            .map(|p| p.property_id)
            .collect();
        for property_id in owned {
            state.remove_property(property_id);
        }

        Ok(true)
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn replace_tokens(&self, user_id: i64, tokens: Vec<NewToken>) -> Result<(), AppError> {
        let mut state = self.state()?;
        state.require_user(user_id)?;

        state.tokens.retain(|t| t.user_id != user_id);
        for token in tokens {
            let token_id = next(&mut state.seq.token);
            state.tokens.push(TokenRecord {
                token_id,
                user_id,
                token_type: token.token_type,
                token_hash: token.token_hash,
                expires_at: token.expires_at,
            });
        }
        Ok(())
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRecord>, AppError> {
        Ok(self
            .state()?
            .tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn tokens_for_user(&self, user_id: i64) -> Result<Vec<TokenRecord>, AppError> {
        Ok(self
            .state()?
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_tokens(&self, user_id: i64) -> Result<u64, AppError> {
        let mut state = self.state()?;
        let before = state.tokens.len();
        state.tokens.retain(|t| t.user_id != user_id);
        Ok((before - state.tokens.len()) as u64)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError> {
        Ok(self.state()?.profiles.get(&user_id).cloned())
    }

    async fn create_profile(&self, user_id: i64, fields: ProfilePatch) -> Result<UserProfile, AppError> {
        let mut state = self.state()?;
        state.require_user(user_id)?;
        if state.profiles.contains_key(&user_id) {
            return Err(AppError::duplicate("Profile already exists"));
        }

        let mut profile = UserProfile::empty(next(&mut state.seq.profile), user_id);
        profile.apply(fields);
        state.profiles.insert(user_id, profile.clone());
        Ok(profile)
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError> {
        let mut state = self.state()?;
        let slot = state
            .profiles
            .get_mut(&profile.user_id)
            .ok_or_else(|| AppError::not_found("Profile"))?;
        *slot = profile.clone();
        Ok(profile.clone())
    }

    async fn delete_profile(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.state()?.profiles.remove(&user_id).is_some())
    }
}

#[async_trait]
impl PropertyRepository for InMemoryStore {
    async fn create_property(&self, owner_id: i64, property: NewProperty) -> Result<Property, AppError> {
        let mut state = self.state()?;
        state.require_user(owner_id)?;

        let property = property.into_property(next(&mut state.seq.property), owner_id);
        state.properties.insert(property.property_id, property.clone());
        Ok(property)
    }

    async fn find_property(&self, property_id: i64) -> Result<Option<Property>, AppError> {
        Ok(self.state()?.properties.get(&property_id).cloned())
    }

    async fn save_property(&self, property: &Property) -> Result<Property, AppError> {
        let mut state = self.state()?;
        let slot = state
            .properties
            .get_mut(&property.property_id)
            .ok_or_else(|| AppError::not_found("Property"))?;
        *slot = property.clone();
        Ok(property.clone())
    }

    async fn delete_property(&self, property_id: i64) -> Result<bool, AppError> {
        Ok(self.state()?.remove_property(property_id))
    }

    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, AppError> {
        Ok(self
            .state()?
            .properties
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ImageRepository for InMemoryStore {
    async fn create_image(&self, property_id: i64, image: NewImage) -> Result<PropertyImage, AppError> {
        let mut state = self.state()?;
        state.require_property(property_id)?;

        let image = PropertyImage {
            image_id: next(&mut state.seq.image),
            property_id,
            image_url: image.image_url,
            is_cover: image.is_cover,
        };
        state.images.insert(image.image_id, image.clone());
        Ok(image)
    }

    async fn find_image(&self, image_id: i64) -> Result<Option<PropertyImage>, AppError> {
        Ok(self.state()?.images.get(&image_id).cloned())
    }

    async fn update_image(&self, image_id: i64, patch: ImagePatch) -> Result<PropertyImage, AppError> {
        let mut state = self.state()?;
        let image = state
            .images
            .get_mut(&image_id)
            .ok_or_else(|| AppError::not_found("Image"))?;
        image.apply(patch);
        Ok(image.clone())
    }

    async fn delete_image(&self, image_id: i64) -> Result<bool, AppError> {
        Ok(self.state()?.images.remove(&image_id).is_some())
    }

    async fn images_for_property(&self, property_id: i64) -> Result<Vec<PropertyImage>, AppError> {
        Ok(self
            .state()?
            .images
            .values()
            .filter(|i| i.property_id == property_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AmenityRepository for InMemoryStore {
    async fn list_amenities(&self) -> Result<Vec<Amenity>, AppError> {
        Ok(self.state()?.amenities.values().cloned().collect())
    }

    async fn find_amenity(&self, amenity_id: i64) -> Result<Option<Amenity>, AppError> {
        Ok(self.state()?.amenities.get(&amenity_id).cloned())
    }

    async fn create_amenity(&self, name: &str) -> Result<Amenity, AppError> {
        let mut state = self.state()?;
        if state.amenities.values().any(|a| a.name == name) {
            return Err(AppError::duplicate("Amenity already exists"));
        }

        let amenity = Amenity {
            amenity_id: next(&mut state.seq.amenity),
            name: name.to_string(),
        };
        state.amenities.insert(amenity.amenity_id, amenity.clone());
        Ok(amenity)
    }

    async fn rename_amenity(&self, amenity_id: i64, name: &str) -> Result<Amenity, AppError> {
        let mut state = self.state()?;
        if state
            .amenities
            .values()
            .any(|a| a.name == name && a.amenity_id != amenity_id)
        {
            return Err(AppError::duplicate("Amenity already exists"));
        }

        let amenity = state
            .amenities
            .get_mut(&amenity_id)
            .ok_or_else(|| AppError::not_found("Amenity"))?;
        amenity.name = name.to_string();
        Ok(amenity.clone())
    }

    async fn delete_amenity(&self, amenity_id: i64) -> Result<bool, AppError> {
        let mut state = self.state()?;
        let existed = state.amenities.remove(&amenity_id).is_some();
        for links in state.property_amenities.values_mut() {
            links.remove(&amenity_id);
        }
        Ok(existed)
    }

    async fn set_property_amenities(&self, property_id: i64, amenity_ids: &[i64]) -> Result<(), AppError> {
        let mut state = self.state()?;
        state.require_property(property_id)?;
        if let Some(missing) = amenity_ids.iter().find(|id| !state.amenities.contains_key(id)) {
            return Err(foreign_key("amenity", *missing));
        }

        state
            .property_amenities
            .insert(property_id, amenity_ids.iter().copied().collect());
        Ok(())
    }

    async fn amenities_for_property(&self, property_id: i64) -> Result<Vec<Amenity>, AppError> {
        let state = self.state()?;
        Ok(state
            .property_amenities
            .get(&property_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.amenities.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create_booking(&self, booking: NewBooking) -> Result<Option<Booking>, AppError> {
        let mut state = self.state()?;
        state.require_user(booking.traveler_id)?;
        state.require_property(booking.property_id)?;

        let clash = state.bookings.values().any(|b| {
            b.property_id == booking.property_id
                && b.status.holds_dates()
                && b.overlaps(booking.start_date, booking.end_date)
        });
        if clash {
            return Ok(None);
        }

        let booking = booking.into_booking(next(&mut state.seq.booking));
        state.bookings.insert(booking.booking_id, booking.clone());
        Ok(Some(booking))
    }

    async fn find_booking(&self, booking_id: i64) -> Result<Option<Booking>, AppError> {
        Ok(self.state()?.bookings.get(&booking_id).cloned())
    }

    async fn set_booking_status(&self, booking_id: i64, status: BookingStatus) -> Result<Booking, AppError> {
        let mut state = self.state()?;
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::not_found("Booking"))?;
        booking.status = status;
        Ok(booking.clone())
    }

    async fn bookings_for_traveler(&self, traveler_id: i64) -> Result<Vec<Booking>, AppError> {
        Ok(self
            .state()?
            .bookings
            .values()
            .filter(|b| b.traveler_id == traveler_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_property(&self, property_id: i64) -> Result<Vec<Booking>, AppError> {
        Ok(self
            .state()?
            .bookings
            .values()
            .filter(|b| b.property_id == property_id)
            .cloned()
            .collect())
    }
}
