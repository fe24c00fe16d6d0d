//! Vehicle records

use crate::auth::users::User;
use crate::error::ApiResult;
use carlot_core::{validation_error, CarlotResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub production_year: i32,
    /// Owner; `None` once detached
    pub user_id: Option<i64>,
    pub date_create: DateTime<Utc>,
}

/// Car with its owner resolved
#[derive(Debug, Clone, Serialize)]
pub struct CarWithOwner {
    #[serde(flatten)]
    pub car: Car,
    pub owner: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCarRequest {
    pub brand: String,
    pub model: String,
    pub production_year: i32,
}

impl CreateCarRequest {
    pub fn validate(&self) -> CarlotResult<()> {
        if self.brand.trim().is_empty() {
            return Err(validation_error!("Brand field cannot be empty", "brand", "cars"));
        }
        if self.model.trim().is_empty() {
            return Err(validation_error!("Model field cannot be empty", "model", "cars"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCarRequest {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub production_year: Option<i32>,
}

impl UpdateCarRequest {
    pub fn validate(&self) -> CarlotResult<()> {
        if self.brand.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(validation_error!("Brand field cannot be empty", "brand", "cars"));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(validation_error!("Model field cannot be empty", "model", "cars"));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CarOwnerRow {
    id: i64,
    brand: String,
    model: String,
    production_year: i32,
    user_id: Option<i64>,
    date_create: DateTime<Utc>,
    owner_name: Option<String>,
    owner_phone: Option<String>,
    owner_email: Option<String>,
    owner_role_id: Option<i32>,
    owner_date_create: Option<DateTime<Utc>>,
}

impl From<CarOwnerRow> for CarWithOwner {
    fn from(row: CarOwnerRow) -> Self {
        let owner = match (
            row.user_id,
            row.owner_name,
            row.owner_phone,
            row.owner_email,
            row.owner_role_id,
            row.owner_date_create,
        ) {
            (Some(id), Some(name), Some(phone), Some(email), Some(role_id), Some(date_create)) => {
                Some(User {
                    id,
                    name,
                    phone,
                    email,
                    role_id,
                    date_create,
                })
            }
            _ => None,
        };

        Self {
            car: Car {
                id: row.id,
                brand: row.brand,
                model: row.model,
                production_year: row.production_year,
                user_id: row.user_id,
                date_create: row.date_create,
            },
            owner,
        }
    }
}

const CAR_COLUMNS: &str = "id, brand, model, production_year, user_id, date_create";

const CAR_WITH_OWNER: &str = r#"
    SELECT c.id, c.brand, c.model, c.production_year, c.user_id, c.date_create,
           u.name AS owner_name, u.phone AS owner_phone, u.email AS owner_email,
           u.role_id AS owner_role_id, u.date_create AS owner_date_create
    FROM cars c
    LEFT JOIN users u ON u.id = c.user_id
"#;

/// Cars table access
#[derive(Debug, Clone)]
pub struct CarStore {
    pool: SqlitePool,
}

impl CarStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a car owned by `owner_id`; `None` when that user does not exist
    pub async fn create(&self, owner_id: i64, request: &CreateCarRequest) -> ApiResult<Option<Car>> {
        let (owners,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        if owners == 0 {
            return Ok(None);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO cars (brand, model, production_year, user_id, date_create)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.brand)
        .bind(&request.model)
        .bind(request.production_year)
        .bind(owner_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(car_id = id, owner_id, "Car created");

        let car = sqlx::query_as(&format!("SELECT {} FROM cars WHERE id = ?", CAR_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(car)
    }

    pub async fn find_all(&self) -> ApiResult<Vec<CarWithOwner>> {
        let rows: Vec<CarOwnerRow> = sqlx::query_as(&format!("{} ORDER BY c.id", CAR_WITH_OWNER))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CarWithOwner::from).collect())
    }

    pub async fn find_by_owner(&self, owner_id: i64) -> ApiResult<Vec<CarWithOwner>> {
        let rows: Vec<CarOwnerRow> = sqlx::query_as(&format!(
            "{} WHERE c.user_id = ? ORDER BY c.id",
            CAR_WITH_OWNER
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CarWithOwner::from).collect())
    }

    pub async fn find_without_owner(&self) -> ApiResult<Vec<Car>> {
        let cars = sqlx::query_as(&format!(
            "SELECT {} FROM cars WHERE user_id IS NULL ORDER BY id",
            CAR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(cars)
    }

    pub async fn find_by_brand(&self, brand: &str) -> ApiResult<Vec<Car>> {
        let cars = sqlx::query_as(&format!(
            "SELECT {} FROM cars WHERE brand = ? ORDER BY id",
            CAR_COLUMNS
        ))
        .bind(brand)
        .fetch_all(&self.pool)
        .await?;
        Ok(cars)
    }

    pub async fn find_by_id(&self, id: i64) -> ApiResult<Option<CarWithOwner>> {
        let row: Option<CarOwnerRow> =
            sqlx::query_as(&format!("{} WHERE c.id = ?", CAR_WITH_OWNER))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(CarWithOwner::from))
    }

    /// Returns the number of rows changed
    pub async fn update(&self, id: i64, request: &UpdateCarRequest) -> ApiResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE cars
            SET brand = COALESCE(?, brand),
                model = COALESCE(?, model),
                production_year = COALESCE(?, production_year)
            WHERE id = ?
            "#,
        )
        .bind(&request.brand)
        .bind(&request.model)
        .bind(request.production_year)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Returns the number of rows removed
    pub async fn delete(&self, id: i64) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM cars WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::{CreateUserRequest, UserStore};
    use carlot_auth::RoleId;

    async fn stores() -> (UserStore, CarStore) {
        let pool = crate::database::connect(&Default::default()).await.unwrap();
        crate::database::create_tables(&pool).await.unwrap();
        (UserStore::new(pool.clone()), CarStore::new(pool))
    }

    async fn owner(users: &UserStore) -> User {
        users
            .create(
                &CreateUserRequest {
                    name: "Ivan".to_string(),
                    password: "password123".to_string(),
                    phone: "+7100".to_string(),
                    email: "ivan@example.com".to_string(),
                },
                RoleId(0),
            )
            .await
            .unwrap()
    }

    fn lada() -> CreateCarRequest {
        CreateCarRequest {
            brand: "Lada".to_string(),
            model: "Niva".to_string(),
            production_year: 1998,
        }
    }

    #[tokio::test]
    async fn test_create_requires_owner() {
        let (_, cars) = stores().await;
        assert!(cars.create(42, &lada()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queries() {
        let (users, cars) = stores().await;
        let ivan = owner(&users).await;

        let car = cars.create(ivan.id, &lada()).await.unwrap().unwrap();
        assert_eq!(car.user_id, Some(ivan.id));

        let all = cars.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].owner.as_ref().map(|o| o.id), Some(ivan.id));

        assert_eq!(cars.find_by_owner(ivan.id).await.unwrap().len(), 1);
        assert_eq!(cars.find_by_brand("Lada").await.unwrap(), vec![car.clone()]);
        assert!(cars.find_by_brand("Volga").await.unwrap().is_empty());
        assert!(cars.find_without_owner().await.unwrap().is_empty());

        let by_email = users.find_cars_by_email("ivan@example.com").await.unwrap();
        assert_eq!(by_email, vec![car.clone()]);

        let profile = users.find_profile(ivan.id).await.unwrap().unwrap();
        assert_eq!(profile.cars, vec![car.clone()]);

        assert!(users.find_without_cars().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_delete_and_cascade() {
        let (users, cars) = stores().await;
        let ivan = owner(&users).await;
        let car = cars.create(ivan.id, &lada()).await.unwrap().unwrap();

        let changed = cars
            .update(
                car.id,
                &UpdateCarRequest {
                    model: Some("4x4".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let updated = cars.find_by_id(car.id).await.unwrap().unwrap();
        assert_eq!(updated.car.model, "4x4");
        assert_eq!(updated.car.brand, "Lada");

        let second = cars.create(ivan.id, &lada()).await.unwrap().unwrap();
        assert_eq!(cars.delete(second.id).await.unwrap(), 1);
        assert_eq!(cars.delete(second.id).await.unwrap(), 0);

        // Removing the owner removes their cars
        users.delete(ivan.id).await.unwrap();
        assert!(cars.find_by_id(car.id).await.unwrap().is_none());
    }
}
