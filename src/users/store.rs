/// Credential store: single-record reads and field-set updates over the
/// `users` table. Unique indexes on `username` and `email` enforce identity
/// uniqueness; duplicate inserts surface as `AppError::Conflict`.
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::users::model::User;

const USER_COLUMNS: &str = "id, username, email, display_name, avatar_url, cover_image_url, \
     password_hash, refresh_token, created_at, updated_at";

/// Fields required to create a credential record. `username` must already be
/// lowercased and `password_hash` already hashed by the caller.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    pub password_hash: String,
}

pub async fn insert_user(pool: &PgPool, new_user: &NewUser) -> Result<Uuid, AppError> {
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, display_name, avatar_url, cover_image_url,
                           password_hash, refresh_token, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $8)
        "#,
    )
    .bind(user_id)
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.display_name)
    .bind(&new_user.avatar_url)
    .bind(&new_user.cover_image_url)
    .bind(&new_user.password_hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(user_id)
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Finds a record matching either identifier. A `None` identifier never
/// matches anything.
pub async fn find_by_username_or_email(
    pool: &PgPool,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {} FROM users
        WHERE ($1::text IS NOT NULL AND username = $1)
           OR ($2::text IS NOT NULL AND email = $2)
        LIMIT 1
        "#,
        USER_COLUMNS
    ))
    .bind(username)
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Overwrites the refresh-token slot. Plain last-writer-wins: no version
/// guard, matching the rotation protocol's accepted race.
pub async fn set_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    refresh_token: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET refresh_token = $1, updated_at = $2 WHERE id = $3")
        .bind(refresh_token)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn set_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    display_name: &str,
    email: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users SET display_name = $1, email = $2, updated_at = $3
        WHERE id = $4
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(display_name)
    .bind(email)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn set_avatar_url(
    pool: &PgPool,
    user_id: Uuid,
    avatar_url: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET avatar_url = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(avatar_url)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn set_cover_image_url(
    pool: &PgPool,
    user_id: Uuid,
    cover_image_url: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET cover_image_url = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(cover_image_url)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(user)
}
