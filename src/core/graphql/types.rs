//! GraphQL output types and result unions

use async_graphql::{ID, SimpleObject, Union};

use super::errors::ApplicationErrors;
use crate::core::db::models::{
    MemberProfile, Property, PropertyDetails, UnitDetails, User, UserProfile,
};
use crate::core::listings::ListingStats;

/// `placementDate` is rendered as day-month-year
pub const PLACEMENT_DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "User")]
pub struct UserObject {
    pub id: ID,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub profile_image: String,
    pub role: String,
    pub placement_date: String,
    pub account_state: bool,
}

impl From<UserProfile> for UserObject {
    fn from(user: UserProfile) -> Self {
        Self {
            id: ID(user.id.to_string()),
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
            profile_image: user.profile_image,
            role: user.role,
            placement_date: user.placement_date.format(PLACEMENT_DATE_FORMAT).to_string(),
            account_state: user.account_status,
        }
    }
}

impl From<User> for UserObject {
    fn from(user: User) -> Self {
        UserProfile::from(user).into()
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Tenant")]
pub struct TenantObject {
    pub id: ID,
    pub user: UserObject,
}

impl From<MemberProfile> for TenantObject {
    fn from(member: MemberProfile) -> Self {
        Self {
            id: ID(member.id.to_string()),
            user: member.user.into(),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "PropertyManager")]
pub struct ManagerObject {
    pub id: ID,
    pub user: UserObject,
}

impl From<MemberProfile> for ManagerObject {
    fn from(member: MemberProfile) -> Self {
        Self {
            id: ID(member.id.to_string()),
            user: member.user.into(),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Unit")]
pub struct UnitObject {
    pub id: ID,
    pub room: String,
    pub image_url: String,
    pub contact: String,
    pub state: bool,
    pub current_tenant: Option<TenantObject>,
    pub living_space: String,
    #[graphql(name = "type")]
    pub unit_type: String,
    pub baths: i32,
    pub bedrooms: i32,
    pub ratings: i32,
    #[graphql(name = "ammenities")]
    pub amenities: Vec<String>,
    pub property_id: String,
    pub property_overview: Vec<String>,
    pub price_per_month: String,
}

impl From<UnitDetails> for UnitObject {
    fn from(details: UnitDetails) -> Self {
        let unit_type = details.unit.unit_type().to_string();
        let unit = details.unit;
        Self {
            id: ID(unit.id.to_string()),
            room: unit.room,
            image_url: unit.image_url,
            contact: unit.contact,
            state: unit.state,
            current_tenant: details.tenant.map(Into::into),
            living_space: unit.living_space,
            unit_type,
            baths: unit.baths,
            bedrooms: unit.bedrooms,
            ratings: unit.ratings,
            amenities: unit.amenities,
            property_id: unit.property_id.to_string(),
            property_overview: unit.property_overview,
            price_per_month: unit.price_per_month,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Property")]
pub struct PropertyObject {
    pub id: ID,
    pub name: String,
    pub image_url: String,
    pub phone_number: String,
    pub contact: String,
    pub lat: f64,
    pub long: f64,
    pub manager: ManagerObject,
    pub property_units: Vec<UnitObject>,
    /// Units with a current tenant
    pub occupied_units: i32,
}

impl From<PropertyDetails> for PropertyObject {
    fn from(details: PropertyDetails) -> Self {
        let occupied_units = i32::try_from(details.occupied_units()).unwrap_or(i32::MAX);
        let property = details.property;
        Self {
            id: ID(property.id.to_string()),
            name: property.name,
            image_url: property.image_url,
            phone_number: property.phone_number,
            contact: property.contact,
            lat: property.latitude,
            long: property.longitude,
            manager: details.manager.into(),
            property_units: details.units.into_iter().map(Into::into).collect(),
            occupied_units,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct PropertyUpdate {
    pub id: ID,
    pub name: String,
    pub image_url: String,
    pub phone_number: String,
    pub contact: String,
    pub lat: f64,
    pub long: f64,
}

impl From<Property> for PropertyUpdate {
    fn from(property: Property) -> Self {
        Self {
            id: ID(property.id.to_string()),
            name: property.name,
            image_url: property.image_url,
            phone_number: property.phone_number,
            contact: property.contact,
            lat: property.latitude,
            long: property.longitude,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, SimpleObject)]
pub struct DefaultResponse {
    pub message: String,
}

impl DefaultResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct InvalidCredentials {
    pub msg: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct AccountNotActive {
    #[graphql(name = "userID")]
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct SignInResponse {
    pub message: String,
    pub user: UserObject,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "OTPResponse")]
pub struct OtpResponse {
    pub token: String,
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct TokenRefreshed {
    pub message: String,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct ListingsPayload {
    pub properties: Vec<PropertyObject>,
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct PropertyPayload {
    pub property: PropertyObject,
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct UnitPayload {
    pub unit: UnitObject,
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct PropertyUpdatePayload {
    pub property: PropertyUpdate,
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "ListingStats")]
pub struct ListingStatsObject {
    pub properties: i64,
    pub occupied_units: i64,
    pub tenants: i64,
}

impl From<ListingStats> for ListingStatsObject {
    fn from(stats: ListingStats) -> Self {
        Self {
            properties: stats.properties,
            occupied_units: stats.occupied_units,
            tenants: stats.tenants,
        }
    }
}

// ============================================================================
// Result unions
// ============================================================================

#[derive(Debug, Clone, Union)]
pub enum SignInResult {
    SignInResponse(SignInResponse),
    AccountNotActive(AccountNotActive),
    InvalidCredentials(InvalidCredentials),
}

#[derive(Debug, Clone, Union)]
pub enum DefaultResponseResult {
    DefaultResponse(DefaultResponse),
    ApplicationErrors(ApplicationErrors),
}

#[derive(Debug, Clone, Union)]
pub enum ProfileResults {
    User(UserObject),
    ApplicationErrors(ApplicationErrors),
}

#[derive(Debug, Clone, Union)]
pub enum VerificationResults {
    OtpResponse(OtpResponse),
    ApplicationErrors(ApplicationErrors),
}

#[derive(Debug, Clone, Union)]
pub enum TokenRefreshResults {
    TokenRefreshed(TokenRefreshed),
    ApplicationErrors(ApplicationErrors),
}

#[derive(Debug, Clone, Union)]
pub enum ListingsResult {
    ListingsPayload(ListingsPayload),
    ApplicationErrors(ApplicationErrors),
}

#[derive(Debug, Clone, Union)]
pub enum PropertyResults {
    PropertyPayload(PropertyPayload),
    ApplicationErrors(ApplicationErrors),
}

#[derive(Debug, Clone, Union)]
pub enum UnitResults {
    UnitPayload(UnitPayload),
    ApplicationErrors(ApplicationErrors),
}

#[derive(Debug, Clone, Union)]
pub enum PropertyUpdateResults {
    PropertyUpdatePayload(PropertyUpdatePayload),
    ApplicationErrors(ApplicationErrors),
}

#[derive(Debug, Clone, Union)]
pub enum ListingStatsResults {
    ListingStats(ListingStatsObject),
    ApplicationErrors(ApplicationErrors),
}
