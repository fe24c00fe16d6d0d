//! User records, password hashing and request validation

use crate::cars::Car;
use crate::error::{ApiError, ApiResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use carlot_auth::RoleId;
use carlot_core::{validation_error, CarlotResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 24;

/// Sign-up and user creation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub password: String,
    pub phone: String,
    pub email: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> CarlotResult<()> {
        validate_name(&self.name)?;
        validate_password(&self.password)?;
        validate_phone(&self.phone)?;
        validate_email(&self.email)
    }
}

/// Sign-in request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial user update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> CarlotResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> CarlotResult<()> {
    if name.trim().is_empty() {
        return Err(validation_error!("Name field cannot be empty", "name", "users"));
    }
    Ok(())
}

fn validate_password(password: &str) -> CarlotResult<()> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(validation_error!(
            format!("Minimal length of password is {} symbols", PASSWORD_MIN_LEN),
            "password",
            "users"
        ));
    }
    if len > PASSWORD_MAX_LEN {
        return Err(validation_error!(
            format!("Maximum length of password is {} symbols", PASSWORD_MAX_LEN),
            "password",
            "users"
        ));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> CarlotResult<()> {
    if phone.trim().is_empty() {
        return Err(validation_error!("Phone field cannot be empty", "phone", "users"));
    }
    Ok(())
}

fn validate_email(email: &str) -> CarlotResult<()> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(validation_error!("Email is not valid", "email", "users"));
    }
    Ok(())
}

/// Public user information; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub role_id: i32,
    pub date_create: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> RoleId {
        RoleId(self.role_id)
    }
}

/// User together with the cars they own
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub cars: Vec<Car>,
}

#[derive(sqlx::FromRow)]
struct PasswordRow {
    id: i64,
    password: String,
}

fn duplicate_user() -> ApiError {
    ApiError::BadRequest("User with this phone or email already exists".to_string())
}

fn map_unique_violation(err: sqlx::Error) -> ApiError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => duplicate_user(),
        other => ApiError::from(other),
    }
}

const USER_COLUMNS: &str = "id, name, phone, email, role_id, date_create";

/// Users table access
#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user; email and phone must both be unused
    pub async fn create(&self, request: &CreateUserRequest, role: RoleId) -> ApiResult<User> {
        let (existing,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ? OR phone = ?")
                .bind(&request.email)
                .bind(&request.phone)
                .fetch_one(&self.pool)
                .await?;
        if existing > 0 {
            debug!("Registration rejected: email or phone already in use");
            return Err(duplicate_user());
        }

        self.insert(request, role).await
    }

    /// Insert without the pre-check; a concurrent registration still ends in
    /// the unique constraint and is reported the same way
    async fn insert(&self, request: &CreateUserRequest, role: RoleId) -> ApiResult<User> {
        let password_hash = hash_password(&request.password)?;
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, password, phone, email, role_id, date_create)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.name)
        .bind(&password_hash)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(role.0)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        let id = result.last_insert_rowid();
        info!(user_id = id, "User created");

        self.find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::Internal("created user vanished".to_string()))
    }

    /// The user matching `email` and `password`, or `None` for any mismatch
    pub async fn authenticate(&self, email: &str, password: &str) -> ApiResult<Option<User>> {
        let row: Option<PasswordRow> =
            sqlx::query_as("SELECT id, password FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        if !verify_password(password, &row.password) {
            return Ok(None);
        }

        self.find_by_id(row.id).await
    }

    pub async fn find_all(&self) -> ApiResult<Vec<User>> {
        let users = sqlx::query_as(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Users owning no car
    pub async fn find_without_cars(&self) -> ApiResult<Vec<User>> {
        let users = sqlx::query_as(&format!(
            "SELECT {} FROM users u WHERE NOT EXISTS (SELECT 1 FROM cars c WHERE c.user_id = u.id) ORDER BY id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn find_by_id(&self, id: i64) -> ApiResult<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_profile(&self, id: i64) -> ApiResult<Option<UserProfile>> {
        let Some(user) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let cars = sqlx::query_as(
            "SELECT id, brand, model, production_year, user_id, date_create FROM cars WHERE user_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(UserProfile { user, cars }))
    }

    /// Cars owned by the user registered under `email`
    pub async fn find_cars_by_email(&self, email: &str) -> ApiResult<Vec<Car>> {
        let cars = sqlx::query_as(
            r#"
            SELECT c.id, c.brand, c.model, c.production_year, c.user_id, c.date_create
            FROM cars c
            JOIN users u ON u.id = c.user_id
            WHERE u.email = ?
            ORDER BY c.id
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(cars)
    }

    /// Returns the number of rows changed
    pub async fn update(&self, id: i64, request: &UpdateUserRequest) -> ApiResult<u64> {
        let password_hash = request
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE(?, name),
                password = COALESCE(?, password),
                phone = COALESCE(?, phone),
                email = COALESCE(?, email)
            WHERE id = ?
            "#,
        )
        .bind(&request.name)
        .bind(password_hash)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(result.rows_affected())
    }

    /// Returns the number of rows removed; owned cars go with the user
    pub async fn delete(&self, id: i64) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Hash password using Argon2
fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &str, phone: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: "Anna".to_string(),
            password: "password123".to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
        }
    }

    async fn store() -> UserStore {
        let pool = crate::database::connect(&Default::default()).await.unwrap();
        crate::database::create_tables(&pool).await.unwrap();
        UserStore::new(pool)
    }

    #[test]
    fn test_validation() {
        assert!(signup("a@b.c", "+7000").validate().is_ok());

        let mut request = signup("a@b.c", "+7000");
        request.password = "short".to_string();
        let err = request.validate().unwrap_err();
        assert_eq!(err.field(), Some("password"));

        request.password = "x".repeat(25);
        assert!(request.validate().is_err());

        let err = signup("not-an-email", "+7000").validate().unwrap_err();
        assert_eq!(err.field(), Some("email"));

        let err = signup("a@b.c", " ").validate().unwrap_err();
        assert_eq!(err.field(), Some("phone"));
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("password123").unwrap();
        assert_ne!(hash, "password123");
        assert!(verify_password("password123", &hash));
        assert!(!verify_password("password124", &hash));
        assert!(!verify_password("password123", "not a hash"));
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let users = store().await;
        let user = users
            .create(&signup("anna@example.com", "+7001"), RoleId(0))
            .await
            .unwrap();
        assert_eq!(user.role(), RoleId(0));

        let found = users
            .authenticate("anna@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(found, Some(user));

        assert!(users
            .authenticate("anna@example.com", "wrong-password")
            .await
            .unwrap()
            .is_none());
        assert!(users
            .authenticate("nobody@example.com", "password123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let users = store().await;
        users
            .create(&signup("anna@example.com", "+7001"), RoleId(0))
            .await
            .unwrap();

        let err = users
            .create(&signup("anna@example.com", "+7002"), RoleId(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = users
            .create(&signup("other@example.com", "+7001"), RoleId(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_racing_insert_reports_duplicate() {
        let users = store().await;
        users
            .insert(&signup("anna@example.com", "+7001"), RoleId(0))
            .await
            .unwrap();

        // Second writer got past the pre-check before the first committed
        let err = users
            .insert(&signup("anna@example.com", "+7002"), RoleId(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let users = store().await;
        let user = users
            .create(&signup("anna@example.com", "+7001"), RoleId(0))
            .await
            .unwrap();

        let changed = users
            .update(
                user.id,
                &UpdateUserRequest {
                    name: Some("Anya".to_string()),
                    password: Some("new-password".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let found = users
            .authenticate("anna@example.com", "new-password")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Anya");

        assert_eq!(users.delete(user.id).await.unwrap(), 1);
        assert_eq!(users.delete(user.id).await.unwrap(), 0);
        assert_eq!(
            users
                .update(user.id, &UpdateUserRequest::default())
                .await
                .unwrap(),
            0
        );
    }
}
