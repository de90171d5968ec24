/// User account routes: registration, login, logout, token refresh, password
/// change, and profile maintenance.
use std::path::Path;

use actix_multipart::Multipart;
use actix_web::{cookie::Cookie, web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::auth::{issue_token_pair, verify_refresh_token, hash_password, verify_password};
use crate::configuration::{JwtSettings, MediaSettings};
use crate::error::{AppError, AuthError, ValidationError};
use crate::media::{public_id_from_url, MediaClient, MediaKind};
use crate::response::ApiResponse;
use crate::uploads::{read_text_field, save_file_field, TempFile};
use crate::users::{store, NewUser, UserView};
use crate::validators::{
    is_valid_display_name, is_valid_email, is_valid_username, require_password,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Session cookies are http-only and secure; they ride alongside the body so
/// both browser and non-browser clients work.
fn auth_cookie(name: &str, value: String) -> Cookie<'static> {
    Cookie::build(name.to_string(), value)
        .path("/")
        .http_only(true)
        .secure(true)
        .finish()
}

fn removal_cookie(name: &str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.to_string(), "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.make_removal();
    cookie
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, AppError> {
    value.ok_or(AppError::Validation(ValidationError::MissingField(field)))
}

struct RegistrationUpload {
    display_name: Option<String>,
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
    avatar: Option<TempFile>,
    cover_image: Option<TempFile>,
}

fn multipart_error(e: actix_multipart::MultipartError) -> AppError {
    tracing::warn!("malformed multipart payload: {}", e);
    AppError::Validation(ValidationError::InvalidFormat("multipart body"))
}

async fn collect_registration(
    mut payload: Multipart,
    temp_dir: &Path,
) -> Result<RegistrationUpload, AppError> {
    let mut upload = RegistrationUpload {
        display_name: None,
        email: None,
        username: None,
        password: None,
        avatar: None,
        cover_image: None,
    };

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let name = field.name().to_string();
        match name.as_str() {
            "displayName" => upload.display_name = Some(read_text_field(&mut field).await?),
            "email" => upload.email = Some(read_text_field(&mut field).await?),
            "username" => upload.username = Some(read_text_field(&mut field).await?),
            "password" => upload.password = Some(read_text_field(&mut field).await?),
            "avatar" => upload.avatar = Some(save_file_field(&mut field, temp_dir).await?),
            "coverImage" => upload.cover_image = Some(save_file_field(&mut field, temp_dir).await?),
            _ => {}
        }
    }

    Ok(upload)
}

/// Pulls the one expected file field out of a multipart body.
async fn collect_single_file(
    mut payload: Multipart,
    field_name: &str,
    temp_dir: &Path,
) -> Result<Option<TempFile>, AppError> {
    let mut file = None;

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() == field_name && file.is_none() {
            file = Some(save_file_field(&mut field, temp_dir).await?);
        }
    }

    Ok(file)
}

/// POST /api/v1/users/register
///
/// Multipart: displayName, email, username, password, avatar (file,
/// required), coverImage (file, optional).
///
/// # Errors
/// - 400: blank text field or missing avatar file
/// - 409: username or email already taken
/// - 500: avatar upload yielded no usable URL, or post-create fetch failed
pub async fn register(
    payload: Multipart,
    pool: web::Data<PgPool>,
    media: web::Data<MediaClient>,
    media_settings: web::Data<MediaSettings>,
) -> Result<HttpResponse, AppError> {
    // Temp files in `form` are removed when this handler returns, on every
    // path.
    let form = collect_registration(payload, Path::new(&media_settings.temp_dir)).await?;

    let display_name = is_valid_display_name(&required(form.display_name, "displayName")?)?;
    let email = is_valid_email(&required(form.email, "email")?)?;
    let username = is_valid_username(&required(form.username, "username")?)?;
    let password = required(form.password, "password")?;
    require_password(&password)?;

    let avatar_file = required(form.avatar, "avatar")?;

    if store::find_by_username_or_email(&pool, Some(&username), Some(&email))
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "user with email or username already exists".to_string(),
        ));
    }

    let avatar_asset = media.upload(avatar_file.path()).await?;

    // A failed cover upload leaves the slot empty rather than failing the
    // whole registration.
    let cover_image_url = match &form.cover_image {
        Some(file) => match media.upload(file.path()).await {
            Ok(asset) => Some(asset.url),
            Err(e) => {
                tracing::warn!("cover image upload failed, leaving slot empty: {}", e);
                None
            }
        },
        None => None,
    };

    let new_user = NewUser {
        username,
        email,
        display_name,
        avatar_url: avatar_asset.url,
        cover_image_url,
        password_hash: hash_password(&password)?,
    };

    let user_id = store::insert_user(&pool, &new_user).await?;

    let created = store::find_by_id(&pool, user_id).await?.ok_or_else(|| {
        AppError::Internal("something went wrong while registering the user".to_string())
    })?;

    tracing::info!(user_id = %user_id, username = %created.username, "user registered");

    Ok(HttpResponse::Created().json(ApiResponse::new(
        201,
        UserView::from(created),
        "user registered successfully",
    )))
}

/// POST /api/v1/users/login
///
/// JSON body: password plus username or email.
///
/// # Errors
/// - 400: neither identifier supplied
/// - 404: no matching user
/// - 401: wrong password
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    if form.username.is_none() && form.email.is_none() {
        return Err(ValidationError::MissingField("username or email").into());
    }

    let username = form
        .username
        .as_deref()
        .map(|u| u.trim().to_lowercase());
    let email = form.email.as_deref().map(|e| e.trim().to_string());

    let user = store::find_by_username_or_email(&pool, username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".to_string()))?;

    if !verify_password(&form.password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let pair = issue_token_pair(&user, &jwt_config)?;
    store::set_refresh_token(&pool, user.id, Some(&pair.refresh_token)).await?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie("accessToken", pair.access_token.clone()))
        .cookie(auth_cookie("refreshToken", pair.refresh_token.clone()))
        .json(ApiResponse::new(
            200,
            json!({
                "user": UserView::from(&user),
                "accessToken": pair.access_token,
                "refreshToken": pair.refresh_token,
            }),
            "user logged in successfully",
        )))
}

/// POST /api/v1/users/refresh-token
///
/// Rotation protocol. The presented token (cookie or body) must pass the
/// signature check *and* exactly equal the stored slot; a superseded value
/// can never succeed again, even before its signed expiry.
///
/// # Errors
/// - 401 "unauthorized request": no token presented
/// - 401 "invalid refresh token": bad signature/expiry or unresolvable subject
/// - 401 "refresh token is expired or used": slot mismatch (replay)
pub async fn refresh_access_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie("refreshToken")
        .map(|c| c.value().to_string())
        .or_else(|| body.as_ref().and_then(|b| b.refresh_token.clone()))
        .ok_or(AppError::Auth(AuthError::MissingToken))?;

    let claims = verify_refresh_token(&presented, &jwt_config)?;

    let user = store::find_by_id(&pool, claims.user_id()?)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidRefreshToken))?;

    // Anti-replay: only the exact stored value is trusted.
    if user.refresh_token.as_deref() != Some(presented.as_str()) {
        tracing::warn!(user_id = %user.id, "stale or replayed refresh token presented");
        return Err(AuthError::RefreshTokenSuperseded.into());
    }

    let pair = issue_token_pair(&user, &jwt_config)?;
    // Last-writer-wins overwrite; concurrent rotations race deliberately.
    store::set_refresh_token(&pool, user.id, Some(&pair.refresh_token)).await?;

    tracing::info!(user_id = %user.id, "access token refreshed");

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie("accessToken", pair.access_token.clone()))
        .cookie(auth_cookie("refreshToken", pair.refresh_token.clone()))
        .json(ApiResponse::new(
            200,
            json!({
                "accessToken": pair.access_token,
                "refreshToken": pair.refresh_token,
            }),
            "access token refreshed",
        )))
}

/// POST /api/v1/users/logout
///
/// Clears the stored refresh slot, which invalidates every outstanding
/// refresh token for the caller, and expires both cookies.
pub async fn logout(
    user: web::ReqData<UserView>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    store::set_refresh_token(&pool, user.id, None).await?;

    tracing::info!(user_id = %user.id, "user logged out");

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie("accessToken"))
        .cookie(removal_cookie("refreshToken"))
        .json(ApiResponse::new(200, json!({}), "user logged out")))
}

/// POST /api/v1/users/change-password
///
/// Verifies the old password, re-hashes and persists the new one. Already
/// issued tokens stay valid until natural expiry.
///
/// # Errors
/// - 400: old password does not verify, or new password is blank
pub async fn change_password(
    user: web::ReqData<UserView>,
    form: web::Json<ChangePasswordRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let record = store::find_by_id(&pool, user.id)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidAccessToken))?;

    if !verify_password(&form.old_password, &record.password_hash)? {
        return Err(AuthError::InvalidOldPassword.into());
    }

    require_password(&form.new_password)?;
    let password_hash = hash_password(&form.new_password)?;
    store::set_password_hash(&pool, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "password changed");

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        json!({}),
        "password changed successfully",
    )))
}

/// GET /api/v1/users/current-user
pub async fn current_user(user: web::ReqData<UserView>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        user.into_inner(),
        "current user fetched successfully",
    )))
}

/// PATCH /api/v1/users/update-account
///
/// Updates the profile text fields. Both are required.
pub async fn update_account(
    user: web::ReqData<UserView>,
    form: web::Json<UpdateAccountRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let display_name =
        is_valid_display_name(&required(form.display_name.clone(), "displayName")?)?;
    let email = is_valid_email(&required(form.email.clone(), "email")?)?;

    let updated = store::update_profile(&pool, user.id, &display_name, &email).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        UserView::from(updated),
        "account details updated successfully",
    )))
}

/// PATCH /api/v1/users/avatar
///
/// Replaces the avatar. The previous asset is deleted from the media host
/// best-effort after the record is updated.
pub async fn update_avatar(
    user: web::ReqData<UserView>,
    payload: Multipart,
    pool: web::Data<PgPool>,
    media: web::Data<MediaClient>,
    media_settings: web::Data<MediaSettings>,
) -> Result<HttpResponse, AppError> {
    let file = collect_single_file(payload, "avatar", Path::new(&media_settings.temp_dir))
        .await?
        .ok_or(AppError::Validation(ValidationError::MissingField("avatar")))?;

    let asset = media.upload(file.path()).await?;

    let previous_url = user.avatar_url.clone();
    let updated = store::set_avatar_url(&pool, user.id, &asset.url).await?;

    if let Some(public_id) = public_id_from_url(&previous_url) {
        if let Err(e) = media.delete(&public_id, MediaKind::Image).await {
            tracing::warn!(user_id = %user.id, "failed to delete replaced avatar: {}", e);
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        UserView::from(updated),
        "avatar image updated successfully",
    )))
}

/// PATCH /api/v1/users/cover-image
pub async fn update_cover_image(
    user: web::ReqData<UserView>,
    payload: Multipart,
    pool: web::Data<PgPool>,
    media: web::Data<MediaClient>,
    media_settings: web::Data<MediaSettings>,
) -> Result<HttpResponse, AppError> {
    let file = collect_single_file(payload, "coverImage", Path::new(&media_settings.temp_dir))
        .await?
        .ok_or(AppError::Validation(ValidationError::MissingField(
            "coverImage",
        )))?;

    let asset = media.upload(file.path()).await?;

    let previous_url = user.cover_image_url.clone();
    let updated = store::set_cover_image_url(&pool, user.id, &asset.url).await?;

    if let Some(public_id) = previous_url.as_deref().and_then(public_id_from_url) {
        if let Err(e) = media.delete(&public_id, MediaKind::Image).await {
            tracing::warn!(user_id = %user.id, "failed to delete replaced cover image: {}", e);
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        UserView::from(updated),
        "cover image updated successfully",
    )))
}
