use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use super::{
    AmenityRepository, BookingRepository, ImageRepository, NewToken, ProfileRepository,
    PropertyRepository, SessionRepository, TokenRecord, UserRepository,
};
use crate::auth::TokenType;
use crate::configuration::DatabaseSettings;
use crate::domain::{
    Amenity, Booking, BookingStatus, CredentialsUpdate, ImagePatch, NewBooking, NewImage,
    NewProperty, NewUser, ProfilePatch, Property, PropertyFilter, PropertyImage, User, UserProfile,
};
use crate::error::{AppError, DatabaseError};

const USER_COLUMNS: &str = "user_id, username, email, password_hash, is_admin, is_staff";
const TOKEN_COLUMNS: &str = "token_id, user_id, token_type, token_hash, expires_at";
const PROFILE_COLUMNS: &str = "profile_id, user_id, full_name, phone_number, gender, birth_date, \
     bio, profile_picture, nationality, preferred_language";
const PROPERTY_COLUMNS: &str = "property_id, owner_id, title, description, price_per_night, \
     address, city, country, latitude, longitude, max_guests, property_type, is_available";
const IMAGE_COLUMNS: &str = "image_id, property_id, image_url, is_cover";
const BOOKING_COLUMNS: &str = "booking_id, traveler_id, property_id, start_date, end_date, guests, \
     status, total_price";

/// PostgreSQL backend.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.connection_string())
            .await
            .map_err(|e| AppError::Database(DatabaseError::ConnectionPool(e.to_string())))?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::UnexpectedError(e.to_string())))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn corrupt(column: &str, value: &str) -> AppError {
    AppError::Database(DatabaseError::UnexpectedError(format!(
        "unexpected {} value '{}' in database",
        column, value
    )))
}

/// Ends a transaction that failed part-way, logging if the rollback itself fails.
async fn abort(tx: Transaction<'_, Postgres>, err: sqlx::Error) -> AppError {
    if let Err(rollback) = tx.rollback().await {
        tracing::error!(error = %rollback, "Rollback failed");
    }
    err.into()
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards in the input escaped.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// ============================================================================
// ROWS
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    username: String,
    email: String,
    password_hash: String,
    is_admin: bool,
    is_staff: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            user_id: row.user_id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            is_admin: row.is_admin,
            is_staff: row.is_staff,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    token_id: i64,
    user_id: i64,
    token_type: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = AppError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let token_type =
            TokenType::parse(&row.token_type).ok_or_else(|| corrupt("token_type", &row.token_type))?;
        Ok(TokenRecord {
            token_id: row.token_id,
            user_id: row.user_id,
            token_type,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    profile_id: i64,
    user_id: i64,
    full_name: Option<String>,
    phone_number: Option<String>,
    gender: Option<String>,
    birth_date: Option<DateTime<Utc>>,
    bio: Option<String>,
    profile_picture: Option<String>,
    nationality: Option<String>,
    preferred_language: String,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        UserProfile {
            profile_id: row.profile_id,
            user_id: row.user_id,
            full_name: row.full_name,
            phone_number: row.phone_number,
            gender: row.gender,
            birth_date: row.birth_date,
            bio: row.bio,
            profile_picture: row.profile_picture,
            nationality: row.nationality,
            preferred_language: row.preferred_language,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PropertyRow {
    property_id: i64,
    owner_id: i64,
    title: String,
    description: Option<String>,
    price_per_night: f64,
    address: String,
    city: String,
    country: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    max_guests: i32,
    property_type: String,
    is_available: bool,
}

impl TryFrom<PropertyRow> for Property {
    type Error = AppError;

    fn try_from(row: PropertyRow) -> Result<Self, Self::Error> {
        let property_type = row
            .property_type
            .parse()
            .map_err(|_| corrupt("property_type", &row.property_type))?;
        Ok(Property {
            property_id: row.property_id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            price_per_night: row.price_per_night,
            address: row.address,
            city: row.city,
            country: row.country,
            latitude: row.latitude,
            longitude: row.longitude,
            max_guests: row.max_guests,
            property_type,
            is_available: row.is_available,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    image_id: i64,
    property_id: i64,
    image_url: String,
    is_cover: bool,
}

impl From<ImageRow> for PropertyImage {
    fn from(row: ImageRow) -> Self {
        PropertyImage {
            image_id: row.image_id,
            property_id: row.property_id,
            image_url: row.image_url,
            is_cover: row.is_cover,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AmenityRow {
    amenity_id: i64,
    name: String,
}

impl From<AmenityRow> for Amenity {
    fn from(row: AmenityRow) -> Self {
        Amenity {
            amenity_id: row.amenity_id,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    booking_id: i64,
    traveler_id: i64,
    property_id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    guests: i32,
    status: String,
    total_price: f64,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row.status.parse().map_err(|_| corrupt("status", &row.status))?;
        Ok(Booking {
            booking_id: row.booking_id,
            traveler_id: row.traveler_id,
            property_id: row.property_id,
            start_date: row.start_date,
            end_date: row.end_date,
            guests: row.guests,
            status,
            total_price: row.total_price,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// USERS
// ============================================================================

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, email, password_hash, is_admin, is_staff) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.is_admin)
        .bind(new.is_staff)
        .fetch_one(&mut *tx)
        .await;

        let user = match inserted {
            Ok(row) => User::from(row),
            Err(e) => return Err(abort(tx, e).await),
        };

        if let Err(e) = sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await
        {
            return Err(abort(tx, e).await);
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn update_credentials(&self, user_id: i64, update: CredentialsUpdate) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET email = COALESCE($2, email), \
             username = CASE WHEN username = email THEN COALESCE($2, username) ELSE username END, \
             password_hash = COALESCE($3, password_hash) \
             WHERE user_id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(update.email)
        .bind(update.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from).ok_or_else(|| AppError::not_found("User"))
    }

    async fn list_non_admin_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE is_admin = FALSE ORDER BY user_id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// SESSIONS
// ============================================================================

async fn write_tokens(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    tokens: &[NewToken],
) -> Result<(), sqlx::Error> {
    // Concurrent logins for one user queue here until the first commits.
    sqlx::query("SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    for token in tokens {
        sqlx::query(
            "INSERT INTO tokens (user_id, token_type, token_hash, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(token.token_type.as_str())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn replace_tokens(&self, user_id: i64, tokens: Vec<NewToken>) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        if let Err(e) = write_tokens(&mut tx, user_id, &tokens).await {
            tracing::warn!(user_id, error = %e, "Token replacement failed, rolling back");
            return Err(abort(tx, e).await);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRecord>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {} FROM tokens WHERE token_hash = $1",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TokenRecord::try_from).transpose()
    }

    async fn tokens_for_user(&self, user_id: i64) -> Result<Vec<TokenRecord>, AppError> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {} FROM tokens WHERE user_id = $1 ORDER BY token_id",
            TOKEN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn delete_tokens(&self, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// PROFILES
// ============================================================================

#[async_trait]
impl ProfileRepository for PgStore {
    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {} FROM user_profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserProfile::from))
    }

    async fn create_profile(&self, user_id: i64, fields: ProfilePatch) -> Result<UserProfile, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO user_profiles (user_id, full_name, phone_number, gender, birth_date, bio, \
             profile_picture, nationality, preferred_language) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, 'en')) RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .bind(fields.full_name)
        .bind(fields.phone_number)
        .bind(fields.gender)
        .bind(fields.birth_date)
        .bind(fields.bio)
        .bind(fields.profile_picture)
        .bind(fields.nationality)
        .bind(fields.preferred_language)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE user_profiles SET full_name = $2, phone_number = $3, gender = $4, \
             birth_date = $5, bio = $6, profile_picture = $7, nationality = $8, \
             preferred_language = $9 WHERE user_id = $1 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(profile.user_id)
        .bind(&profile.full_name)
        .bind(&profile.phone_number)
        .bind(&profile.gender)
        .bind(profile.birth_date)
        .bind(&profile.bio)
        .bind(&profile.profile_picture)
        .bind(&profile.nationality)
        .bind(&profile.preferred_language)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserProfile::from)
            .ok_or_else(|| AppError::not_found("Profile"))
    }

    async fn delete_profile(&self, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[async_trait]
impl PropertyRepository for PgStore {
    async fn create_property(&self, owner_id: i64, property: NewProperty) -> Result<Property, AppError> {
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            "INSERT INTO properties (owner_id, title, description, price_per_night, address, city, \
             country, latitude, longitude, max_guests, property_type, is_available) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            PROPERTY_COLUMNS
        ))
        .bind(owner_id)
        .bind(&property.title)
        .bind(&property.description)
        .bind(property.price_per_night)
        .bind(&property.address)
        .bind(&property.city)
        .bind(&property.country)
        .bind(property.latitude)
        .bind(property.longitude)
        .bind(property.max_guests)
        .bind(property.property_type.as_str())
        .bind(property.is_available)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_property(&self, property_id: i64) -> Result<Option<Property>, AppError> {
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {} FROM properties WHERE property_id = $1",
            PROPERTY_COLUMNS
        ))
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Property::try_from).transpose()
    }

    async fn save_property(&self, property: &Property) -> Result<Property, AppError> {
        let row = sqlx::query_as::<_, PropertyRow>(&format!(
            "UPDATE properties SET title = $2, description = $3, price_per_night = $4, \
             address = $5, city = $6, country = $7, latitude = $8, longitude = $9, \
             max_guests = $10, property_type = $11, is_available = $12 \
             WHERE property_id = $1 RETURNING {}",
            PROPERTY_COLUMNS
        ))
        .bind(property.property_id)
        .bind(&property.title)
        .bind(&property.description)
        .bind(property.price_per_night)
        .bind(&property.address)
        .bind(&property.city)
        .bind(&property.country)
        .bind(property.latitude)
        .bind(property.longitude)
        .bind(property.max_guests)
        .bind(property.property_type.as_str())
        .bind(property.is_available)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::not_found("Property"))?.try_into()
    }

    async fn delete_property(&self, property_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM properties WHERE property_id = $1")
            .bind(property_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, AppError> {
        let rows = sqlx::query_as::<_, PropertyRow>(&format!(
            "SELECT {} FROM properties \
             WHERE ($1::text IS NULL OR city ILIKE $1) \
               AND ($2::text IS NULL OR country ILIKE $2) \
               AND ($3::float8 IS NULL OR price_per_night >= $3) \
               AND ($4::float8 IS NULL OR price_per_night <= $4) \
               AND ($5::bool IS NULL OR is_available = $5) \
             ORDER BY property_id",
            PROPERTY_COLUMNS
        ))
        .bind(filter.city.as_deref().map(contains_pattern))
        .bind(filter.country.as_deref().map(contains_pattern))
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.is_available)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}

// ============================================================================
// IMAGES
// ============================================================================

#[async_trait]
impl ImageRepository for PgStore {
    async fn create_image(&self, property_id: i64, image: NewImage) -> Result<PropertyImage, AppError> {
        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "INSERT INTO property_images (property_id, image_url, is_cover) \
             VALUES ($1, $2, $3) RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(property_id)
        .bind(&image.image_url)
        .bind(image.is_cover)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_image(&self, image_id: i64) -> Result<Option<PropertyImage>, AppError> {
        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {} FROM property_images WHERE image_id = $1",
            IMAGE_COLUMNS
        ))
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PropertyImage::from))
    }

    async fn update_image(&self, image_id: i64, patch: ImagePatch) -> Result<PropertyImage, AppError> {
        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "UPDATE property_images SET image_url = COALESCE($2, image_url), \
             is_cover = COALESCE($3, is_cover) WHERE image_id = $1 RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(image_id)
        .bind(patch.image_url)
        .bind(patch.is_cover)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PropertyImage::from)
            .ok_or_else(|| AppError::not_found("Image"))
    }

    async fn delete_image(&self, image_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM property_images WHERE image_id = $1")
            .bind(image_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn images_for_property(&self, property_id: i64) -> Result<Vec<PropertyImage>, AppError> {
        let rows = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {} FROM property_images WHERE property_id = $1 ORDER BY image_id",
            IMAGE_COLUMNS
        ))
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PropertyImage::from).collect())
    }
}

// ============================================================================
// AMENITIES
// ============================================================================

#[async_trait]
impl AmenityRepository for PgStore {
    async fn list_amenities(&self) -> Result<Vec<Amenity>, AppError> {
        let rows = sqlx::query_as::<_, AmenityRow>(
            "SELECT amenity_id, name FROM amenities ORDER BY amenity_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Amenity::from).collect())
    }

    async fn find_amenity(&self, amenity_id: i64) -> Result<Option<Amenity>, AppError> {
        let row = sqlx::query_as::<_, AmenityRow>(
            "SELECT amenity_id, name FROM amenities WHERE amenity_id = $1",
        )
        .bind(amenity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Amenity::from))
    }

    async fn create_amenity(&self, name: &str) -> Result<Amenity, AppError> {
        let row = sqlx::query_as::<_, AmenityRow>(
            "INSERT INTO amenities (name) VALUES ($1) RETURNING amenity_id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn rename_amenity(&self, amenity_id: i64, name: &str) -> Result<Amenity, AppError> {
        let row = sqlx::query_as::<_, AmenityRow>(
            "UPDATE amenities SET name = $2 WHERE amenity_id = $1 RETURNING amenity_id, name",
        )
        .bind(amenity_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Amenity::from)
            .ok_or_else(|| AppError::not_found("Amenity"))
    }

    async fn delete_amenity(&self, amenity_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM amenities WHERE amenity_id = $1")
            .bind(amenity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_property_amenities(&self, property_id: i64, amenity_ids: &[i64]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        if let Err(e) = sqlx::query("DELETE FROM property_amenity WHERE property_id = $1")
            .bind(property_id)
            .execute(&mut *tx)
            .await
        {
            return Err(abort(tx, e).await);
        }

        if let Err(e) = sqlx::query(
            "INSERT INTO property_amenity (property_id, amenity_id) \
             SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
        )
        .bind(property_id)
        .bind(amenity_ids)
        .execute(&mut *tx)
        .await
        {
            return Err(abort(tx, e).await);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn amenities_for_property(&self, property_id: i64) -> Result<Vec<Amenity>, AppError> {
        let rows = sqlx::query_as::<_, AmenityRow>(
            "SELECT a.amenity_id, a.name FROM amenities a \
             JOIN property_amenity pa ON pa.amenity_id = a.amenity_id \
             WHERE pa.property_id = $1 ORDER BY a.amenity_id",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Amenity::from).collect())
    }
}

// ============================================================================
// BOOKINGS
// ============================================================================

async fn insert_unless_overlapping(
    tx: &mut Transaction<'_, Postgres>,
    booking: &NewBooking,
) -> Result<Option<BookingRow>, sqlx::Error> {
    // Serialises concurrent bookings of the same property.
    sqlx::query("SELECT property_id FROM properties WHERE property_id = $1 FOR UPDATE")
        .bind(booking.property_id)
        .execute(&mut **tx)
        .await?;

    let clash: Option<i64> = sqlx::query_scalar(
        "SELECT booking_id FROM bookings \
         WHERE property_id = $1 AND status <> 'cancelled' \
           AND start_date < $3 AND $2 < end_date \
         LIMIT 1",
    )
    .bind(booking.property_id)
    .bind(booking.start_date)
    .bind(booking.end_date)
    .fetch_optional(&mut **tx)
    .await?;

    if clash.is_some() {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, BookingRow>(&format!(
        "INSERT INTO bookings (traveler_id, property_id, start_date, end_date, guests, status, total_price) \
         VALUES ($1, $2, $3, $4, $5, 'pending', $6) RETURNING {}",
        BOOKING_COLUMNS
    ))
    .bind(booking.traveler_id)
    .bind(booking.property_id)
    .bind(booking.start_date)
    .bind(booking.end_date)
    .bind(booking.guests)
    .bind(booking.total_price)
    .fetch_one(&mut **tx)
    .await?;

    Ok(Some(row))
}

#[async_trait]
impl BookingRepository for PgStore {
    async fn create_booking(&self, booking: NewBooking) -> Result<Option<Booking>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = match insert_unless_overlapping(&mut tx, &booking).await {
            Ok(row) => row,
            Err(e) => return Err(abort(tx, e).await),
        };

        tx.commit().await?;
        row.map(Booking::try_from).transpose()
    }

    async fn find_booking(&self, booking_id: i64) -> Result<Option<Booking>, AppError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE booking_id = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn set_booking_status(&self, booking_id: i64, status: BookingStatus) -> Result<Booking, AppError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = $2 WHERE booking_id = $1 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::not_found("Booking"))?.try_into()
    }

    async fn bookings_for_traveler(&self, traveler_id: i64) -> Result<Vec<Booking>, AppError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE traveler_id = $1 ORDER BY booking_id",
            BOOKING_COLUMNS
        ))
        .bind(traveler_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn bookings_for_property(&self, property_id: i64) -> Result<Vec<Booking>, AppError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE property_id = $1 ORDER BY booking_id",
            BOOKING_COLUMNS
        ))
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("lis"), "%lis%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
