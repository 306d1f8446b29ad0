//! Listing service: properties, units and occupancy
//!
//! Every write checks ownership first. Managers act on the property manager
//! row tied to their user; a manager may only touch properties (and the
//! units of properties) they own. Tenants may move themselves in and out.

use uuid::Uuid;

use crate::core::db::models::{
    CreateProperty, CreateUnit, Property, PropertyDetails, UnitDetails, UnitType, UpdateProperty,
};
use crate::core::db::repositories::{
    PropertyRepository, PropertyRepositoryError, UnitRepository, UnitRepositoryError,
    UserRepository, UserRepositoryError,
};
use crate::core::storage::{ImageStore, ImageUpload, StorageError};
use crate::core::validation::{ValidationError, ValidationResult};

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Only property managers can manage listings")]
    NotManager,

    #[error("Access denied for this listing")]
    Forbidden,

    #[error("Invalid Property Identifier")]
    PropertyNotFound,

    #[error("Invalid Unit Identifier")]
    UnitNotFound,

    #[error("Invalid Tenant Identifier")]
    TenantNotFound,

    #[error("Cannot Add New Entry To Currently Occupied Unit")]
    UnitOccupied,

    #[error("Tenant does not occupy this unit")]
    NotOccupant,

    #[error("Invalid Operation cannot delete occupied unit")]
    DeleteOccupiedUnit,

    #[error("Invalid Operation cannot delete property with occupied unit(s)")]
    PropertyHasOccupiedUnits,

    #[error("Image upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<UnitRepositoryError> for ListingError {
    fn from(err: UnitRepositoryError) -> Self {
        match err {
            UnitRepositoryError::NotFound => ListingError::UnitNotFound,
            UnitRepositoryError::TenantNotFound => ListingError::TenantNotFound,
            UnitRepositoryError::Occupied => ListingError::UnitOccupied,
            UnitRepositoryError::NotOccupant => ListingError::NotOccupant,
            UnitRepositoryError::DeleteOccupied => ListingError::DeleteOccupiedUnit,
            UnitRepositoryError::DatabaseError(e) => ListingError::InternalError(e.to_string()),
        }
    }
}

impl From<PropertyRepositoryError> for ListingError {
    fn from(err: PropertyRepositoryError) -> Self {
        match err {
            PropertyRepositoryError::NotFound => ListingError::PropertyNotFound,
            PropertyRepositoryError::HasOccupiedUnits => ListingError::PropertyHasOccupiedUnits,
            PropertyRepositoryError::DatabaseError(e) => ListingError::InternalError(e.to_string()),
        }
    }
}

impl From<UserRepositoryError> for ListingError {
    fn from(err: UserRepositoryError) -> Self {
        ListingError::InternalError(err.to_string())
    }
}

#[derive(Debug)]
pub struct NewProperty {
    pub name: String,
    pub phone_number: String,
    pub contact: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image: ImageUpload,
}

#[derive(Debug)]
pub struct NewUnit {
    pub property_id: Uuid,
    pub room: String,
    pub contact: String,
    pub state: bool,
    pub living_space: String,
    pub unit_type: String,
    pub baths: i32,
    pub bedrooms: i32,
    pub amenities: Vec<String>,
    pub price_per_month: String,
    pub image: ImageUpload,
    pub property_overview: Vec<ImageUpload>,
}

#[derive(Debug, Default)]
pub struct PropertyChanges {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub contact: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image: Option<ImageUpload>,
}

/// Dashboard figures for one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListingStats {
    pub properties: i64,
    pub occupied_units: i64,
    /// Summed per property
    pub tenants: i64,
}

#[derive(Clone)]
pub struct ListingService {
    users: UserRepository,
    properties: PropertyRepository,
    units: UnitRepository,
    images: ImageStore,
}

impl ListingService {
    pub fn new(
        users: UserRepository,
        properties: PropertyRepository,
        units: UnitRepository,
        images: ImageStore,
    ) -> Self {
        Self {
            users,
            properties,
            units,
            images,
        }
    }

    pub async fn public_listings(&self) -> Result<Vec<PropertyDetails>, ListingError> {
        Ok(self.properties.fetch_public_listings().await?)
    }

    pub async fn my_listings(&self, user_id: Uuid) -> Result<Vec<PropertyDetails>, ListingError> {
        let manager_id = self.require_manager(user_id).await?;
        Ok(self.properties.fetch_private_listings(manager_id).await?)
    }

    pub async fn listing_stats(&self, user_id: Uuid) -> Result<ListingStats, ListingError> {
        let manager_id = self.require_manager(user_id).await?;
        let listings = self.properties.fetch_private_listings(manager_id).await?;

        let mut stats = ListingStats {
            properties: self.properties.count_no_properties_listings(manager_id).await?,
            ..Default::default()
        };
        for listing in &listings {
            stats.occupied_units += self.properties.count_no_units(listing.property.id).await?;
            stats.tenants += self.properties.count_no_tenants(listing.property.id).await?;
        }

        Ok(stats)
    }

    pub async fn create_property(
        &self,
        user_id: Uuid,
        input: NewProperty,
    ) -> Result<PropertyDetails, ListingError> {
        ValidationResult::new()
            .require("name", &input.name)
            .require("phoneNumber", &input.phone_number)
            .require("contact", &input.contact)
            .coordinates(input.latitude, input.longitude)
            .to_result()?;

        let manager_id = self.require_manager(user_id).await?;
        let image = self.images.store_upload(input.image).await?;

        let created = self
            .properties
            .create(&CreateProperty {
                manager_id,
                name: input.name.trim().to_string(),
                image_url: image.file_path.clone(),
                phone_number: input.phone_number.trim().to_string(),
                contact: input.contact.trim().to_string(),
                latitude: input.latitude,
                longitude: input.longitude,
            })
            .await;

        let property = match created {
            Ok(p) => p,
            Err(e) => {
                self.images.discard(vec![image.file_path]).await;
                return Err(e.into());
            }
        };

        self.properties
            .find_details(property.id)
            .await?
            .ok_or(ListingError::PropertyNotFound)
    }

    pub async fn update_property(
        &self,
        user_id: Uuid,
        property_id: Uuid,
        changes: PropertyChanges,
    ) -> Result<Property, ListingError> {
        ValidationResult::new()
            .optional_coordinates(changes.latitude, changes.longitude)
            .to_result()?;

        self.require_owner(user_id, property_id).await?;

        let (image, previous_image) = match changes.image {
            Some(upload) => {
                let previous = self
                    .properties
                    .find_details(property_id)
                    .await?
                    .map(|d| d.property.image_url);
                (Some(self.images.store_upload(upload).await?), previous)
            }
            None => (None, None),
        };
        let update = UpdateProperty {
            name: non_blank(changes.name),
            image_url: image.as_ref().map(|i| i.file_path.clone()),
            phone_number: non_blank(changes.phone_number),
            contact: non_blank(changes.contact),
            latitude: changes.latitude,
            longitude: changes.longitude,
        };

        match self.properties.update(property_id, &update).await {
            Ok(Some(property)) => {
                self.images.discard(previous_image.into_iter().collect()).await;
                tracing::info!(property_id = %property_id, "Property updated");
                Ok(property)
            }
            Ok(None) => {
                self.images
                    .discard(image.into_iter().map(|i| i.file_path).collect())
                    .await;
                Err(ListingError::PropertyNotFound)
            }
            Err(e) => {
                self.images
                    .discard(image.into_iter().map(|i| i.file_path).collect())
                    .await;
                Err(e.into())
            }
        }
    }

    pub async fn delete_property(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<PropertyDetails, ListingError> {
        self.require_owner(user_id, property_id).await?;

        let deleted = self
            .properties
            .delete(property_id)
            .await?
            .ok_or(ListingError::PropertyNotFound)?;

        let mut paths = vec![deleted.property.image_url.clone()];
        for u in &deleted.units {
            paths.push(u.unit.image_url.clone());
            paths.extend(u.unit.property_overview.iter().cloned());
        }
        self.images.discard(paths).await;

        Ok(deleted)
    }

    pub async fn create_unit(&self, user_id: Uuid, input: NewUnit) -> Result<UnitDetails, ListingError> {
        ValidationResult::new()
            .require("room", &input.room)
            .require("contact", &input.contact)
            .require("livingSpace", &input.living_space)
            .require("pricePerMonth", &input.price_per_month)
            .to_result()?;

        self.require_owner(user_id, input.property_id).await?;

        let image = self.images.store_upload(input.image).await?;
        let overview = match self.images.store_all(input.property_overview).await {
            Ok(stored) => stored,
            Err(e) => {
                self.images.discard(vec![image.file_path]).await;
                return Err(e.into());
            }
        };

        let created = self
            .units
            .create(&CreateUnit {
                property_id: input.property_id,
                room: input.room.trim().to_string(),
                image_url: image.file_path.clone(),
                contact: input.contact.trim().to_string(),
                state: input.state,
                living_space: input.living_space.trim().to_string(),
                unit_type: UnitType::from_input(&input.unit_type),
                baths: input.baths,
                bedrooms: input.bedrooms,
                amenities: input.amenities,
                property_overview: overview.iter().map(|s| s.file_path.clone()).collect(),
                price_per_month: input.price_per_month.trim().to_string(),
            })
            .await;

        match created {
            Ok(unit) => Ok(unit),
            Err(e) => {
                let written = std::iter::once(image).chain(overview);
                self.images
                    .discard(written.map(|s| s.file_path).collect())
                    .await;
                Err(e.into())
            }
        }
    }

    pub async fn update_unit(
        &self,
        user_id: Uuid,
        unit_id: Uuid,
        room: &str,
    ) -> Result<UnitDetails, ListingError> {
        ValidationResult::new().require("room", room).to_result()?;

        let unit = self.find_unit(unit_id).await?;
        self.require_owner(user_id, unit.unit.property_id).await?;

        self.units
            .update_room(unit_id, room.trim())
            .await?
            .ok_or(ListingError::UnitNotFound)
    }

    pub async fn delete_unit(&self, user_id: Uuid, unit_id: Uuid) -> Result<UnitDetails, ListingError> {
        let unit = self.find_unit(unit_id).await?;
        self.require_owner(user_id, unit.unit.property_id).await?;

        let deleted = self
            .units
            .delete(unit_id)
            .await?
            .ok_or(ListingError::UnitNotFound)?;

        let mut paths = vec![deleted.unit.image_url.clone()];
        paths.extend(deleted.unit.property_overview.iter().cloned());
        self.images.discard(paths).await;

        Ok(deleted)
    }

    pub async fn occupy_unit(
        &self,
        user_id: Uuid,
        unit_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<UnitDetails, ListingError> {
        self.require_occupancy_actor(user_id, unit_id, tenant_id).await?;
        Ok(self.units.add_occupant(unit_id, tenant_id).await?)
    }

    pub async fn leave_unit(
        &self,
        user_id: Uuid,
        unit_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<UnitDetails, ListingError> {
        self.require_occupancy_actor(user_id, unit_id, tenant_id).await?;
        Ok(self.units.leave_unit(unit_id, tenant_id).await?)
    }

    async fn find_unit(&self, unit_id: Uuid) -> Result<UnitDetails, ListingError> {
        self.units
            .fetch_unit(unit_id)
            .await?
            .ok_or(ListingError::UnitNotFound)
    }

    async fn require_manager(&self, user_id: Uuid) -> Result<Uuid, ListingError> {
        self.users
            .manager_for_user(user_id)
            .await?
            .ok_or(ListingError::NotManager)
    }

    async fn require_owner(&self, user_id: Uuid, property_id: Uuid) -> Result<Uuid, ListingError> {
        let manager_id = self.require_manager(user_id).await?;
        let owner = self
            .properties
            .manager_of(property_id)
            .await?
            .ok_or(ListingError::PropertyNotFound)?;

        if owner != manager_id {
            tracing::warn!(user_id = %user_id, property_id = %property_id, "Ownership check failed");
            return Err(ListingError::Forbidden);
        }
        Ok(manager_id)
    }

    /// The owning manager, or the tenant acting on their own behalf
    async fn require_occupancy_actor(
        &self,
        user_id: Uuid,
        unit_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<(), ListingError> {
        if self.users.tenant_for_user(user_id).await? == Some(tenant_id) {
            return Ok(());
        }

        let unit = self.find_unit(unit_id).await?;
        match self.require_owner(user_id, unit.unit.property_id).await {
            Ok(_) => Ok(()),
            Err(ListingError::NotManager) => Err(ListingError::Forbidden),
            Err(e) => Err(e),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
