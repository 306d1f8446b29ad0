//! Unit repository, including the occupancy transitions
//!
//! Units are always read back as `UnitDetails`: the unit row joined with its
//! active occupant (if any) and that tenant's user profile.

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{CreateUnit, Unit, UnitDetails, user_columns};

pub(crate) const UNIT_COLUMNS: &str = "id, property_id, room, image_url, contact, state, \
     living_space, unit_type, baths, bedrooms, ratings, amenities, property_overview, \
     price_per_month, created_at, updated_at";

/// Unit repository error types
#[derive(Debug, thiserror::Error)]
pub enum UnitRepositoryError {
    #[error("Invalid Unit Identifier")]
    NotFound,

    #[error("Invalid Tenant Identifier")]
    TenantNotFound,

    #[error("Cannot Add New Entry To Currently Occupied Unit")]
    Occupied,

    #[error("Tenant does not occupy this unit")]
    NotOccupant,

    #[error("Invalid Operation cannot delete occupied unit")]
    DeleteOccupied,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// `SELECT ... FROM units u` with the active tenant joined in; callers append the filter
pub(crate) fn unit_details_select() -> String {
    let unit_cols = UNIT_COLUMNS
        .split(',')
        .map(|c| format!("u.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"
        SELECT {unit_cols}, t.id AS tenant_id, {tenant_cols}
        FROM units u
        LEFT JOIN unit_occupants o ON o.unit_id = u.id AND o.is_occupied
        LEFT JOIN tenants t ON t.id = o.tenant_id
        LEFT JOIN users tu ON tu.id = t.user_id
        "#,
        tenant_cols = user_columns("tu", "tenant_user_"),
    )
}

#[derive(Clone)]
pub struct UnitRepository {
    pool: PgPool,
}

impl UnitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, dto: &CreateUnit) -> Result<UnitDetails, UnitRepositoryError> {
        let unit = sqlx::query_as::<_, Unit>(&format!(
            r#"
            INSERT INTO units (property_id, room, image_url, contact, state, living_space,
                               unit_type, baths, bedrooms, amenities, property_overview, price_per_month)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {UNIT_COLUMNS}
            "#
        ))
        .bind(dto.property_id)
        .bind(&dto.room)
        .bind(&dto.image_url)
        .bind(&dto.contact)
        .bind(dto.state)
        .bind(&dto.living_space)
        .bind(dto.unit_type.as_str())
        .bind(dto.baths)
        .bind(dto.bedrooms)
        .bind(&dto.amenities)
        .bind(&dto.property_overview)
        .bind(&dto.price_per_month)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(unit_id = %unit.id, property_id = %unit.property_id, "Unit created");
        Ok(UnitDetails { unit, tenant: None })
    }

    /// All units of a property
    pub async fn fetch_units(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<UnitDetails>, UnitRepositoryError> {
        let units = sqlx::query_as::<_, UnitDetails>(&format!(
            "{} WHERE u.property_id = $1 ORDER BY u.created_at",
            unit_details_select()
        ))
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    /// Units of several properties at once
    pub async fn fetch_units_for(
        &self,
        property_ids: &[Uuid],
    ) -> Result<Vec<UnitDetails>, UnitRepositoryError> {
        if property_ids.is_empty() {
            return Ok(Vec::new());
        }

        let units = sqlx::query_as::<_, UnitDetails>(&format!(
            "{} WHERE u.property_id = ANY($1) ORDER BY u.created_at",
            unit_details_select()
        ))
        .bind(property_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    pub async fn fetch_unit(&self, unit_id: Uuid) -> Result<Option<UnitDetails>, UnitRepositoryError> {
        let unit = sqlx::query_as::<_, UnitDetails>(&format!(
            "{} WHERE u.id = $1",
            unit_details_select()
        ))
        .bind(unit_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(unit)
    }

    pub async fn update_room(
        &self,
        unit_id: Uuid,
        room: &str,
    ) -> Result<Option<UnitDetails>, UnitRepositoryError> {
        let result = sqlx::query("UPDATE units SET room = $2 WHERE id = $1")
            .bind(unit_id)
            .bind(room)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.fetch_unit(unit_id).await
    }

    /// Delete a vacant unit, returning what was deleted
    pub async fn delete(&self, unit_id: Uuid) -> Result<Option<UnitDetails>, UnitRepositoryError> {
        let Some(details) = self.fetch_unit(unit_id).await? else {
            return Ok(None);
        };
        if details.tenant.is_some() {
            return Err(UnitRepositoryError::DeleteOccupied);
        }

        // The occupancy check is repeated in the statement itself so a tenant
        // moving in between the read and the delete still blocks it.
        let result = sqlx::query(
            r#"
            DELETE FROM units
            WHERE id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM unit_occupants WHERE unit_id = $1 AND is_occupied
              )
            "#,
        )
        .bind(unit_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UnitRepositoryError::DeleteOccupied);
        }

        tracing::info!(unit_id = %unit_id, "Unit deleted");
        Ok(Some(details))
    }

    /// Move a tenant into a vacant unit
    pub async fn add_occupant(
        &self,
        unit_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<UnitDetails, UnitRepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM units WHERE id = $1 FOR UPDATE")
            .bind(unit_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(UnitRepositoryError::NotFound);
        }

        let tenant: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?;
        if tenant.is_none() {
            return Err(UnitRepositoryError::TenantNotFound);
        }

        let (occupied,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM unit_occupants WHERE unit_id = $1 AND is_occupied)",
        )
        .bind(unit_id)
        .fetch_one(&mut *tx)
        .await?;
        if occupied {
            tracing::warn!(unit_id = %unit_id, "Rejected occupancy of occupied unit");
            return Err(UnitRepositoryError::Occupied);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO unit_occupants (unit_id, tenant_id, is_occupied)
            VALUES ($1, $2, TRUE)
            "#,
        )
        .bind(unit_id)
        .bind(tenant_id)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(UnitRepositoryError::Occupied);
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        tracing::info!(unit_id = %unit_id, tenant_id = %tenant_id, "Tenant moved in");

        self.fetch_unit(unit_id)
            .await?
            .ok_or(UnitRepositoryError::NotFound)
    }

    /// End a tenant's active occupancy of a unit
    pub async fn leave_unit(
        &self,
        unit_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<UnitDetails, UnitRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE unit_occupants
            SET is_occupied = FALSE, left_at = NOW()
            WHERE unit_id = $1 AND tenant_id = $2 AND is_occupied
            "#,
        )
        .bind(unit_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.fetch_unit(unit_id).await? {
                Some(_) => Err(UnitRepositoryError::NotOccupant),
                None => Err(UnitRepositoryError::NotFound),
            };
        }

        tracing::info!(unit_id = %unit_id, tenant_id = %tenant_id, "Tenant left unit");
        self.fetch_unit(unit_id)
            .await?
            .ok_or(UnitRepositoryError::NotFound)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::core::db::models::{CreateProperty, Role, UnitType};
    use crate::core::db::repositories::property::PropertyRepository;
    use crate::core::db::repositories::user::UserRepository;
    use crate::core::db::repositories::user::test_support::*;

    #[test]
    fn test_unit_details_select_joins_active_tenant() {
        let sql = unit_details_select();
        assert!(sql.contains("u.price_per_month"));
        assert!(sql.contains("o.is_occupied"));
        assert!(sql.contains("t.id AS tenant_id"));
        assert!(sql.contains("tu.email AS tenant_user_email"));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            UnitRepositoryError::Occupied.to_string(),
            "Cannot Add New Entry To Currently Occupied Unit"
        );
        assert_eq!(
            UnitRepositoryError::DeleteOccupied.to_string(),
            "Invalid Operation cannot delete occupied unit"
        );
        assert_eq!(UnitRepositoryError::NotFound.to_string(), "Invalid Unit Identifier");
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    struct Fixture {
        pool: PgPool,
        repo: UnitRepository,
        manager_user: Uuid,
        tenant_user: Uuid,
        tenant_id: Uuid,
        property_id: Uuid,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await;
        let users = UserRepository::new(pool.clone());

        let manager = create_test_user(&pool, Role::PropertyManager).await;
        let tenant = create_test_user(&pool, Role::Tenant).await;
        let manager_id = users.manager_for_user(manager.id).await.unwrap().unwrap();
        let tenant_id = users.tenant_for_user(tenant.id).await.unwrap().unwrap();

        let property = PropertyRepository::new(pool.clone())
            .create(&CreateProperty {
                manager_id,
                name: "Test Court".to_string(),
                image_url: "/storage/p.png".to_string(),
                phone_number: "0700".to_string(),
                contact: "office".to_string(),
                latitude: 0.0,
                longitude: 0.0,
            })
            .await
            .unwrap();

        Fixture {
            repo: UnitRepository::new(pool.clone()),
            pool,
            manager_user: manager.id,
            tenant_user: tenant.id,
            tenant_id,
            property_id: property.id,
        }
    }

    async fn teardown(f: Fixture) {
        cleanup_user(&f.pool, f.manager_user).await;
        cleanup_user(&f.pool, f.tenant_user).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_and_fetch_unit() {
        let f = setup().await;

        let created = f.repo.create(&new_unit(f.property_id, "B2")).await.unwrap();
        assert!(created.tenant.is_none());
        assert_eq!(created.unit.unit_type(), UnitType::Normal);
        assert_eq!(created.unit.amenities, vec!["parking", "wifi"]);

        let fetched = f.repo.fetch_unit(created.unit.id).await.unwrap().unwrap();
        assert_eq!(fetched.unit.room, "B2");
        assert_eq!(f.repo.fetch_units(f.property_id).await.unwrap().len(), 1);

        teardown(f).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_add_occupant_rejects_second_tenant() {
        let f = setup().await;
        let unit = f.repo.create(&new_unit(f.property_id, "C3")).await.unwrap();

        let occupied = f.repo.add_occupant(unit.unit.id, f.tenant_id).await.unwrap();
        let tenant = occupied.tenant.unwrap();
        assert_eq!(tenant.id, f.tenant_id);
        assert_eq!(tenant.user.id, f.tenant_user);

        let again = f.repo.add_occupant(unit.unit.id, f.tenant_id).await;
        assert!(matches!(again, Err(UnitRepositoryError::Occupied)));

        teardown(f).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_concurrent_add_occupant_single_winner() {
        let f = setup().await;
        let users = UserRepository::new(f.pool.clone());

        let mut tenant_users = Vec::new();
        let mut tenant_ids = Vec::new();
        for _ in 0..8 {
            let user = create_test_user(&f.pool, Role::Tenant).await;
            tenant_ids.push(users.tenant_for_user(user.id).await.unwrap().unwrap());
            tenant_users.push(user.id);
        }

        for round in 0..10 {
            let unit = f
                .repo
                .create(&new_unit(f.property_id, &format!("R{round}")))
                .await
                .unwrap();

            let mut attempts = tokio::task::JoinSet::new();
            for &tenant_id in &tenant_ids {
                let repo = f.repo.clone();
                let unit_id = unit.unit.id;
                attempts.spawn(async move { repo.add_occupant(unit_id, tenant_id).await });
            }

            let mut winners = Vec::new();
            while let Some(joined) = attempts.join_next().await {
                match joined.unwrap() {
                    Ok(details) => winners.push(details.tenant.unwrap().id),
                    Err(UnitRepositoryError::Occupied) => {}
                    Err(e) => panic!("unexpected error in round {round}: {e}"),
                }
            }
            assert_eq!(winners.len(), 1, "round {round}");
            assert!(tenant_ids.contains(&winners[0]));

            let stored = f.repo.fetch_unit(unit.unit.id).await.unwrap().unwrap();
            assert_eq!(stored.tenant.unwrap().id, winners[0]);
        }

        for user_id in tenant_users {
            cleanup_user(&f.pool, user_id).await;
        }
        teardown(f).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_add_occupant_unknown_unit_or_tenant() {
        let f = setup().await;
        let unit = f.repo.create(&new_unit(f.property_id, "D4")).await.unwrap();

        let missing_unit = f.repo.add_occupant(Uuid::new_v4(), f.tenant_id).await;
        assert!(matches!(missing_unit, Err(UnitRepositoryError::NotFound)));

        let missing_tenant = f.repo.add_occupant(unit.unit.id, Uuid::new_v4()).await;
        assert!(matches!(missing_tenant, Err(UnitRepositoryError::TenantNotFound)));

        teardown(f).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_leave_unit_then_reoccupy() {
        let f = setup().await;
        let unit = f.repo.create(&new_unit(f.property_id, "E5")).await.unwrap();

        let not_in = f.repo.leave_unit(unit.unit.id, f.tenant_id).await;
        assert!(matches!(not_in, Err(UnitRepositoryError::NotOccupant)));

        f.repo.add_occupant(unit.unit.id, f.tenant_id).await.unwrap();
        let left = f.repo.leave_unit(unit.unit.id, f.tenant_id).await.unwrap();
        assert!(left.tenant.is_none());

        let back = f.repo.add_occupant(unit.unit.id, f.tenant_id).await.unwrap();
        assert!(back.tenant.is_some());

        teardown(f).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_delete_refuses_occupied_unit() {
        let f = setup().await;
        let unit = f.repo.create(&new_unit(f.property_id, "F6")).await.unwrap();

        f.repo.add_occupant(unit.unit.id, f.tenant_id).await.unwrap();
        let result = f.repo.delete(unit.unit.id).await;
        assert!(matches!(result, Err(UnitRepositoryError::DeleteOccupied)));

        f.repo.leave_unit(unit.unit.id, f.tenant_id).await.unwrap();
        let deleted = f.repo.delete(unit.unit.id).await.unwrap().unwrap();
        assert_eq!(deleted.unit.id, unit.unit.id);
        assert!(f.repo.fetch_unit(unit.unit.id).await.unwrap().is_none());

        teardown(f).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_update_room() {
        let f = setup().await;
        let unit = f.repo.create(&new_unit(f.property_id, "G7")).await.unwrap();

        let updated = f.repo.update_room(unit.unit.id, "G7-renovated").await.unwrap().unwrap();
        assert_eq!(updated.unit.room, "G7-renovated");
        assert!(f.repo.update_room(Uuid::new_v4(), "x").await.unwrap().is_none());

        teardown(f).await;
    }
}
