//! Property repository
//!
//! Listings are assembled in two queries: properties joined with their
//! manager, then every unit of those properties in one batch.

use std::collections::HashMap;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::unit::{UnitRepository, UnitRepositoryError};
use crate::core::db::models::{
    CreateProperty, MemberProfile, Property, PropertyDetails, UpdateProperty, UserProfile,
    user_columns,
};

const PROPERTY_COLUMNS: &str = "id, manager_id, name, image_url, phone_number, contact, \
                                latitude, longitude, created_at, updated_at";

/// Property repository error types
#[derive(Debug, thiserror::Error)]
pub enum PropertyRepositoryError {
    #[error("Invalid Property Identifier")]
    NotFound,

    #[error("Invalid Operation cannot delete property with occupied unit(s)")]
    HasOccupiedUnits,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<UnitRepositoryError> for PropertyRepositoryError {
    fn from(err: UnitRepositoryError) -> Self {
        match err {
            UnitRepositoryError::DatabaseError(e) => PropertyRepositoryError::DatabaseError(e),
            other => PropertyRepositoryError::DatabaseError(sqlx::Error::Protocol(other.to_string())),
        }
    }
}

/// Property row joined with its manager
struct PropertyWithManager {
    property: Property,
    manager: MemberProfile,
}

impl<'r> FromRow<'r, PgRow> for PropertyWithManager {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let property = Property::from_row(row)?;
        let manager = MemberProfile {
            id: property.manager_id,
            user: UserProfile::from_prefixed_row(row, "manager_user_")?,
        };
        Ok(Self { property, manager })
    }
}

fn listing_select() -> String {
    let property_cols = PROPERTY_COLUMNS
        .split(',')
        .map(|c| format!("p.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"
        SELECT {property_cols}, {manager_cols}
        FROM properties p
        JOIN property_managers pm ON pm.id = p.manager_id
        JOIN users mu ON mu.id = pm.user_id
        "#,
        manager_cols = user_columns("mu", "manager_user_"),
    )
}

#[derive(Clone)]
pub struct PropertyRepository {
    pool: PgPool,
    units: UnitRepository,
}

impl PropertyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            units: UnitRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn create(&self, dto: &CreateProperty) -> Result<Property, PropertyRepositoryError> {
        let property = sqlx::query_as::<_, Property>(&format!(
            r#"
            INSERT INTO properties (manager_id, name, image_url, phone_number, contact, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PROPERTY_COLUMNS}
            "#
        ))
        .bind(dto.manager_id)
        .bind(&dto.name)
        .bind(&dto.image_url)
        .bind(&dto.phone_number)
        .bind(&dto.contact)
        .bind(dto.latitude)
        .bind(dto.longitude)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(property_id = %property.id, manager_id = %property.manager_id, "Property created");
        Ok(property)
    }

    /// Partially update a property; `None` when the id is unknown
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateProperty,
    ) -> Result<Option<Property>, PropertyRepositoryError> {
        let property = sqlx::query_as::<_, Property>(&format!(
            r#"
            UPDATE properties
            SET name = COALESCE($2, name),
                image_url = COALESCE($3, image_url),
                phone_number = COALESCE($4, phone_number),
                contact = COALESCE($5, contact),
                latitude = COALESCE($6, latitude),
                longitude = COALESCE($7, longitude)
            WHERE id = $1
            RETURNING {PROPERTY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&updates.name)
        .bind(&updates.image_url)
        .bind(&updates.phone_number)
        .bind(&updates.contact)
        .bind(updates.latitude)
        .bind(updates.longitude)
        .fetch_optional(&self.pool)
        .await?;

        Ok(property)
    }

    /// Delete a property with no occupied units, returning what was deleted
    pub async fn delete(
        &self,
        id: Uuid,
    ) -> Result<Option<PropertyDetails>, PropertyRepositoryError> {
        let Some(details) = self.find_details(id).await? else {
            return Ok(None);
        };
        if details.occupied_units() > 0 {
            return Err(PropertyRepositoryError::HasOccupiedUnits);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM properties
            WHERE id = $1
              AND NOT EXISTS (
                  SELECT 1
                  FROM unit_occupants o
                  JOIN units u ON u.id = o.unit_id
                  WHERE u.property_id = $1 AND o.is_occupied
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PropertyRepositoryError::HasOccupiedUnits);
        }

        tracing::info!(property_id = %id, "Property deleted");
        Ok(Some(details))
    }

    /// Every property with its manager, units and current tenants
    pub async fn fetch_public_listings(
        &self,
    ) -> Result<Vec<PropertyDetails>, PropertyRepositoryError> {
        let rows = sqlx::query_as::<_, PropertyWithManager>(&format!(
            "{} ORDER BY p.created_at DESC",
            listing_select()
        ))
        .fetch_all(&self.pool)
        .await?;

        self.attach_units(rows).await
    }

    /// Properties owned by one manager
    pub async fn fetch_private_listings(
        &self,
        manager_id: Uuid,
    ) -> Result<Vec<PropertyDetails>, PropertyRepositoryError> {
        let rows = sqlx::query_as::<_, PropertyWithManager>(&format!(
            "{} WHERE p.manager_id = $1 ORDER BY p.created_at DESC",
            listing_select()
        ))
        .bind(manager_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_units(rows).await
    }

    pub async fn find_details(
        &self,
        id: Uuid,
    ) -> Result<Option<PropertyDetails>, PropertyRepositoryError> {
        let row = sqlx::query_as::<_, PropertyWithManager>(&format!(
            "{} WHERE p.id = $1",
            listing_select()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_units(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Manager owning a property
    pub async fn manager_of(&self, property_id: Uuid) -> Result<Option<Uuid>, PropertyRepositoryError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT manager_id FROM properties WHERE id = $1")
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    /// Number of currently occupied units in a property
    pub async fn count_no_units(&self, property_id: Uuid) -> Result<i64, PropertyRepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM unit_occupants o
            JOIN units u ON u.id = o.unit_id
            WHERE u.property_id = $1 AND o.is_occupied
            "#,
        )
        .bind(property_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Number of distinct tenants living in a property
    pub async fn count_no_tenants(&self, property_id: Uuid) -> Result<i64, PropertyRepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT o.tenant_id)
            FROM unit_occupants o
            JOIN units u ON u.id = o.unit_id
            WHERE u.property_id = $1 AND o.is_occupied
            "#,
        )
        .bind(property_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn count_no_properties_listings(
        &self,
        manager_id: Uuid,
    ) -> Result<i64, PropertyRepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM properties WHERE manager_id = $1")
                .bind(manager_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn attach_units(
        &self,
        rows: Vec<PropertyWithManager>,
    ) -> Result<Vec<PropertyDetails>, PropertyRepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.property.id).collect();

        let mut by_property: HashMap<Uuid, Vec<_>> = HashMap::new();
        for unit in self.units.fetch_units_for(&ids).await? {
            by_property.entry(unit.unit.property_id).or_default().push(unit);
        }

        Ok(rows
            .into_iter()
            .map(|row| PropertyDetails {
                units: by_property.remove(&row.property.id).unwrap_or_default(),
                property: row.property,
                manager: row.manager,
            })
            .collect())
    }
}
