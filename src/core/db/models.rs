//! Database models for the rental API
//!
//! Entity structs mapping PostgreSQL tables, plus the joined "details" shapes
//! that listings and units are read back as.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

// ============================================================================
// Role
// ============================================================================

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Role {
    PropertyManager,
    #[default]
    Tenant,
}

impl Role {
    /// Lenient parse used for sign-up input: anything but `PropertyManager` is a tenant
    pub fn from_input(value: &str) -> Self {
        if value.trim() == "PropertyManager" {
            Role::PropertyManager
        } else {
            Role::Tenant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::PropertyManager => "PropertyManager",
            Role::Tenant => "Tenant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PropertyManager" => Ok(Role::PropertyManager),
            "Tenant" => Ok(Role::Tenant),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// ============================================================================
// User Model
// ============================================================================

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone_number: String,
    pub profile_image: String,
    pub role: String,
    pub account_status: bool,
    pub placement_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Stored role, falling back to tenant for unknown values
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or_default()
    }
}

/// User data for creation (password already hashed)
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: String,
    pub profile_image: String,
    pub role: Role,
    pub account_status: bool,
}

/// User data for partial updates; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
    pub password_hash: Option<String>,
    pub account_status: Option<bool>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.phone_number.is_none()
            && self.profile_image.is_none()
            && self.password_hash.is_none()
            && self.account_status.is_none()
    }
}

/// User without credentials, as embedded in listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub profile_image: String,
    pub role: String,
    pub account_status: bool,
    pub placement_date: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
            profile_image: user.profile_image,
            role: user.role,
            account_status: user.account_status,
            placement_date: user.placement_date,
        }
    }
}

impl UserProfile {
    /// Read a profile out of a joined row whose user columns carry `prefix`
    pub fn from_prefixed_row(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let col = |name: &str| format!("{prefix}{name}");
        Ok(Self {
            id: row.try_get(col("id").as_str())?,
            name: row.try_get(col("name").as_str())?,
            email: row.try_get(col("email").as_str())?,
            phone_number: row.try_get(col("phone_number").as_str())?,
            profile_image: row.try_get(col("profile_image").as_str())?,
            role: row.try_get(col("role").as_str())?,
            account_status: row.try_get(col("account_status").as_str())?,
            placement_date: row.try_get(col("placement_date").as_str())?,
        })
    }
}

/// `SELECT` list for a user aliased as `{alias}` with columns prefixed `{prefix}`
pub fn user_columns(alias: &str, prefix: &str) -> String {
    [
        "id",
        "name",
        "email",
        "phone_number",
        "profile_image",
        "role",
        "account_status",
        "placement_date",
    ]
    .iter()
    .map(|c| format!("{alias}.{c} AS {prefix}{c}"))
    .collect::<Vec<_>>()
    .join(", ")
}

// ============================================================================
// Tenant / PropertyManager
// ============================================================================

/// Tenant role row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

/// Property manager role row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PropertyManager {
    pub id: Uuid,
    pub user_id: Uuid,
}

/// Role row together with the owning user's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: Uuid,
    pub user: UserProfile,
}

// ============================================================================
// Property Model
// ============================================================================

/// Property entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: Uuid,
    pub manager_id: Uuid,
    pub name: String,
    pub image_url: String,
    pub phone_number: String,
    pub contact: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Property data for creation
#[derive(Debug, Clone)]
pub struct CreateProperty {
    pub manager_id: Uuid,
    pub name: String,
    pub image_url: String,
    pub phone_number: String,
    pub contact: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Property data for partial updates
#[derive(Debug, Clone, Default)]
pub struct UpdateProperty {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub phone_number: Option<String>,
    pub contact: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Property with its manager and units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub property: Property,
    pub manager: MemberProfile,
    pub units: Vec<UnitDetails>,
}

impl PropertyDetails {
    pub fn occupied_units(&self) -> usize {
        self.units.iter().filter(|u| u.tenant.is_some()).count()
    }
}

// ============================================================================
// Unit Model
// ============================================================================

/// Unit category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnitType {
    Luxurious,
    Normal,
    #[default]
    Budget,
}

impl UnitType {
    /// Lenient parse: unknown categories are budget units
    pub fn from_input(value: &str) -> Self {
        match value.trim() {
            "Luxurious" => UnitType::Luxurious,
            "Normal" => UnitType::Normal,
            _ => UnitType::Budget,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Luxurious => "Luxurious",
            UnitType::Normal => "Normal",
            UnitType::Budget => "budget",
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub property_id: Uuid,
    pub room: String,
    pub image_url: String,
    pub contact: String,
    pub state: bool,
    pub living_space: String,
    pub unit_type: String,
    pub baths: i32,
    pub bedrooms: i32,
    pub ratings: i32,
    pub amenities: Vec<String>,
    pub property_overview: Vec<String>,
    pub price_per_month: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    pub fn unit_type(&self) -> UnitType {
        UnitType::from_input(&self.unit_type)
    }
}

/// Unit data for creation
#[derive(Debug, Clone)]
pub struct CreateUnit {
    pub property_id: Uuid,
    pub room: String,
    pub image_url: String,
    pub contact: String,
    pub state: bool,
    pub living_space: String,
    pub unit_type: UnitType,
    pub baths: i32,
    pub bedrooms: i32,
    pub amenities: Vec<String>,
    pub property_overview: Vec<String>,
    pub price_per_month: String,
}

/// Unit with its current tenant, if occupied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDetails {
    pub unit: Unit,
    pub tenant: Option<MemberProfile>,
}

impl<'r> FromRow<'r, PgRow> for UnitDetails {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let unit = Unit::from_row(row)?;
        let tenant_id: Option<Uuid> = row.try_get("tenant_id")?;
        let tenant = match tenant_id {
            Some(id) => Some(MemberProfile {
                id,
                user: UserProfile::from_prefixed_row(row, "tenant_user_")?,
            }),
            None => None,
        };

        Ok(Self { unit, tenant })
    }
}

/// Occupancy record linking a tenant to a unit
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UnitOccupant {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub tenant_id: Uuid,
    pub is_occupied: bool,
    pub occupied_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Session / Password reset
// ============================================================================

/// Session entity for refresh tokens
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One-time password reset code (stored hashed)
#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
