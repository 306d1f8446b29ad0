//! Listing resolvers: properties, units and occupancy

use async_graphql::{Context, ID, Object, Result, Upload};
use uuid::Uuid;

use super::context::current_user_id;
use super::errors::app_error;
use super::guard::{AuthGuard, RoleGuard};
use super::types::{
    ListingStatsResults, ListingsPayload, ListingsResult, PropertyPayload, PropertyResults,
    PropertyUpdatePayload, PropertyUpdateResults, UnitPayload, UnitResults,
};
use super::upload::{take_image, take_images};
use crate::core::db::models::Role;
use crate::core::listings::{ListingError, ListingService, NewProperty, NewUnit, PropertyChanges};

pub const PUBLIC_LISTINGS_MESSAGE: &str = "public listings";
pub const MY_LISTINGS_MESSAGE: &str = "manager listings";
pub const PROPERTY_CREATED_MESSAGE: &str = "New Property created";
pub const PROPERTY_UPDATED_MESSAGE: &str = "Property info updated";
pub const PROPERTY_DELETED_MESSAGE: &str = "property info deleted";
pub const UNIT_CREATED_MESSAGE: &str = "New unit created";
pub const UNIT_UPDATED_MESSAGE: &str = "New unit updated";
pub const UNIT_DELETED_MESSAGE: &str = "unit info deleted";
pub const TENANT_UPDATED_MESSAGE: &str = "tenant info has been updated";

fn parse_id(raw: &str, not_found: ListingError) -> Result<Uuid, ListingError> {
    Uuid::parse_str(raw.trim()).map_err(|_| not_found)
}

/// Unwrap a service result or return the union's error member
macro_rules! try_listing {
    ($ctx:expr, $union:ident, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => return Ok($union::ApplicationErrors(app_error($ctx, e))),
        }
    };
}

#[derive(Default)]
pub struct PropertyQuery;

#[Object]
impl PropertyQuery {
    async fn fetch_public_listings(&self, ctx: &Context<'_>) -> Result<ListingsResult> {
        let listings = ctx.data::<ListingService>()?;

        let properties = try_listing!(ctx, ListingsResult, listings.public_listings().await);
        tracing::debug!(count = properties.len(), "Fetched public listings");

        Ok(ListingsResult::ListingsPayload(ListingsPayload {
            properties: properties.into_iter().map(Into::into).collect(),
            message: PUBLIC_LISTINGS_MESSAGE.to_string(),
        }))
    }

    /// Properties owned by the signed-in manager
    #[graphql(guard = "RoleGuard::new(Role::PropertyManager)")]
    async fn my_listings(&self, ctx: &Context<'_>) -> Result<ListingsResult> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let properties = try_listing!(ctx, ListingsResult, listings.my_listings(user_id).await);

        Ok(ListingsResult::ListingsPayload(ListingsPayload {
            properties: properties.into_iter().map(Into::into).collect(),
            message: MY_LISTINGS_MESSAGE.to_string(),
        }))
    }

    #[graphql(guard = "RoleGuard::new(Role::PropertyManager)")]
    async fn my_listing_stats(&self, ctx: &Context<'_>) -> Result<ListingStatsResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let stats = try_listing!(ctx, ListingStatsResults, listings.listing_stats(user_id).await);
        Ok(ListingStatsResults::ListingStats(stats.into()))
    }
}

#[derive(Default)]
pub struct PropertyMutation;

#[Object]
impl PropertyMutation {
    #[graphql(guard = "RoleGuard::new(Role::PropertyManager)")]
    #[allow(clippy::too_many_arguments)]
    async fn create_property_listing(
        &self,
        ctx: &Context<'_>,
        name: String,
        phone_number: String,
        contact: String,
        lat: f64,
        long: f64,
        image_url: Upload,
    ) -> Result<PropertyResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let image = try_listing!(ctx, PropertyResults, take_image(ctx, &image_url));
        let input = NewProperty {
            name,
            phone_number,
            contact,
            latitude: lat,
            longitude: long,
            image,
        };

        let property = try_listing!(ctx, PropertyResults, listings.create_property(user_id, input).await);
        tracing::info!(property_id = %property.property.id, user_id = %user_id, "Property listed");

        Ok(PropertyResults::PropertyPayload(PropertyPayload {
            property: property.into(),
            message: PROPERTY_CREATED_MESSAGE.to_string(),
        }))
    }

    #[graphql(guard = "RoleGuard::new(Role::PropertyManager)")]
    #[allow(clippy::too_many_arguments)]
    async fn create_unit(
        &self,
        ctx: &Context<'_>,
        room: String,
        image_url: Upload,
        contact: String,
        property_id: String,
        state: bool,
        living_space: String,
        #[graphql(name = "type")] unit_type: String,
        baths: i32,
        bedrooms: i32,
        #[graphql(name = "ammenities")] amenities: Vec<String>,
        price_per_month: String,
        property_overview: Vec<Upload>,
    ) -> Result<UnitResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let property_id = try_listing!(
            ctx,
            UnitResults,
            parse_id(&property_id, ListingError::PropertyNotFound)
        );
        let image = try_listing!(ctx, UnitResults, take_image(ctx, &image_url));
        let property_overview = try_listing!(ctx, UnitResults, take_images(ctx, &property_overview));

        let input = NewUnit {
            property_id,
            room,
            contact,
            state,
            living_space,
            unit_type,
            baths,
            bedrooms,
            amenities,
            price_per_month,
            image,
            property_overview,
        };

        let unit = try_listing!(ctx, UnitResults, listings.create_unit(user_id, input).await);
        tracing::info!(unit_id = %unit.unit.id, property_id = %property_id, "Unit created");

        Ok(UnitResults::UnitPayload(UnitPayload {
            unit: unit.into(),
            message: UNIT_CREATED_MESSAGE.to_string(),
        }))
    }

    #[graphql(guard = "RoleGuard::new(Role::PropertyManager)")]
    async fn update_unit(&self, ctx: &Context<'_>, room: String, unit_id: String) -> Result<UnitResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let unit_id = try_listing!(ctx, UnitResults, parse_id(&unit_id, ListingError::UnitNotFound));
        let unit = try_listing!(ctx, UnitResults, listings.update_unit(user_id, unit_id, &room).await);
        tracing::info!(unit_id = %unit_id, "Unit updated");

        Ok(UnitResults::UnitPayload(UnitPayload {
            unit: unit.into(),
            message: UNIT_UPDATED_MESSAGE.to_string(),
        }))
    }

    #[graphql(guard = "RoleGuard::new(Role::PropertyManager)")]
    #[allow(clippy::too_many_arguments)]
    async fn update_property_listing(
        &self,
        ctx: &Context<'_>,
        property_id: ID,
        name: Option<String>,
        phone_number: Option<String>,
        contact: Option<String>,
        lat: Option<f64>,
        long: Option<f64>,
        image_url: Option<Upload>,
    ) -> Result<PropertyUpdateResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let property_id = try_listing!(
            ctx,
            PropertyUpdateResults,
            parse_id(&property_id, ListingError::PropertyNotFound)
        );
        let image = try_listing!(
            ctx,
            PropertyUpdateResults,
            image_url.as_ref().map(|u| take_image(ctx, u)).transpose()
        );

        let changes = PropertyChanges {
            name,
            phone_number,
            contact,
            latitude: lat,
            longitude: long,
            image,
        };

        let property = try_listing!(
            ctx,
            PropertyUpdateResults,
            listings.update_property(user_id, property_id, changes).await
        );
        tracing::info!(property_id = %property.id, "Property updated");

        Ok(PropertyUpdateResults::PropertyUpdatePayload(PropertyUpdatePayload {
            property: property.into(),
            message: PROPERTY_UPDATED_MESSAGE.to_string(),
        }))
    }

    /// Move a tenant into a unit
    #[graphql(guard = "AuthGuard")]
    async fn occupy_unit(&self, ctx: &Context<'_>, unit_id: String, tenant_id: String) -> Result<UnitResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let unit_id = try_listing!(ctx, UnitResults, parse_id(&unit_id, ListingError::UnitNotFound));
        let tenant_id = try_listing!(ctx, UnitResults, parse_id(&tenant_id, ListingError::TenantNotFound));

        let unit = try_listing!(ctx, UnitResults, listings.occupy_unit(user_id, unit_id, tenant_id).await);
        tracing::info!(unit_id = %unit_id, tenant_id = %tenant_id, "Unit occupied");

        Ok(UnitResults::UnitPayload(UnitPayload {
            unit: unit.into(),
            message: TENANT_UPDATED_MESSAGE.to_string(),
        }))
    }

    /// End a tenant's active occupancy of a unit
    #[graphql(guard = "AuthGuard")]
    async fn leave_unit(&self, ctx: &Context<'_>, unit_id: String, tenant_id: String) -> Result<UnitResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let unit_id = try_listing!(ctx, UnitResults, parse_id(&unit_id, ListingError::UnitNotFound));
        let tenant_id = try_listing!(ctx, UnitResults, parse_id(&tenant_id, ListingError::TenantNotFound));

        let unit = try_listing!(ctx, UnitResults, listings.leave_unit(user_id, unit_id, tenant_id).await);
        tracing::info!(unit_id = %unit_id, tenant_id = %tenant_id, "Unit vacated");

        Ok(UnitResults::UnitPayload(UnitPayload {
            unit: unit.into(),
            message: TENANT_UPDATED_MESSAGE.to_string(),
        }))
    }

    #[graphql(guard = "RoleGuard::new(Role::PropertyManager)")]
    async fn delete_unit(&self, ctx: &Context<'_>, id: ID) -> Result<UnitResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let unit_id = try_listing!(ctx, UnitResults, parse_id(&id, ListingError::UnitNotFound));
        let unit = try_listing!(ctx, UnitResults, listings.delete_unit(user_id, unit_id).await);
        tracing::info!(unit_id = %unit_id, "Unit deleted");

        Ok(UnitResults::UnitPayload(UnitPayload {
            unit: unit.into(),
            message: UNIT_DELETED_MESSAGE.to_string(),
        }))
    }

    #[graphql(guard = "RoleGuard::new(Role::PropertyManager)")]
    async fn delete_property_listing(&self, ctx: &Context<'_>, id: ID) -> Result<PropertyResults> {
        let user_id = current_user_id(ctx)?;
        let listings = ctx.data::<ListingService>()?;

        let property_id = try_listing!(ctx, PropertyResults, parse_id(&id, ListingError::PropertyNotFound));
        let property = try_listing!(
            ctx,
            PropertyResults,
            listings.delete_property(user_id, property_id).await
        );
        tracing::info!(property_id = %property_id, "Property deleted");

        Ok(PropertyResults::PropertyPayload(PropertyPayload {
            property: property.into(),
            message: PROPERTY_DELETED_MESSAGE.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(
            parse_id(&format!(" {id} "), ListingError::UnitNotFound).unwrap(),
            id
        );

        let err = parse_id("not-a-uuid", ListingError::UnitNotFound).unwrap_err();
        assert_eq!(err.to_string(), "Invalid Unit Identifier");
    }
}
