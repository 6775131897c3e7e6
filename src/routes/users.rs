use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::auth::AuthUser;
use crate::cookies::{clear_session_cookies, set_session_cookies, REFRESH_TOKEN_COOKIE};
use crate::errors::{ApiError, ApiResponse};
use crate::password;
use crate::session;
use crate::state::AppState;
use crate::user::{normalize_username, AccountStore, NewUser, UserResponse};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// An in-memory copy of one uploaded multipart file.
struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

async fn read_file(field: Field<'_>) -> Result<UploadedFile, ApiError> {
    let filename = field.file_name().unwrap_or("upload").to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))?;

    Ok(UploadedFile {
        filename,
        bytes: bytes.to_vec(),
    })
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))
}

#[derive(Default)]
struct RegisterForm {
    full_name: Option<String>,
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
    avatar: Option<UploadedFile>,
    cover_image: Option<UploadedFile>,
}

impl RegisterForm {
    async fn collect(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| ApiError::bad_request("malformed multipart body"))?
        {
            match field.name() {
                Some("fullName") => form.full_name = Some(read_text(field).await?),
                Some("email") => form.email = Some(read_text(field).await?),
                Some("username") => form.username = Some(read_text(field).await?),
                Some("password") => form.password = Some(read_text(field).await?),
                Some("avatar") => form.avatar = Some(read_file(field).await?),
                Some("coverImage") => form.cover_image = Some(read_file(field).await?),
                _ => {}
            }
        }

        Ok(form)
    }
}

/// POST /api/v1/users/register
pub async fn register(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let form = RegisterForm::collect(&mut multipart).await?;

    let full_name = form.full_name.as_deref().map(str::trim).unwrap_or("");
    let email = form.email.as_deref().map(str::trim).unwrap_or("");
    let username_raw = form.username.as_deref().map(str::trim).unwrap_or("");
    let password = form.password.as_deref().unwrap_or("");

    if [full_name, email, username_raw, password]
        .iter()
        .any(|field| field.is_empty())
    {
        return Err(ApiError::bad_request("all fields are required"));
    }

    let username = normalize_username(username_raw);

    let existing = state
        .db
        .find_by_username_or_email(Some(&username), Some(email))
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "user with email or username already exists",
        ));
    }

    let Some(avatar) = form.avatar else {
        return Err(ApiError::bad_request("avatar file is required"));
    };

    let avatar_url = state.media.upload(avatar.bytes, &avatar.filename).await?.url;

    let cover_image_url = match form.cover_image {
        Some(cover) => Some(state.media.upload(cover.bytes, &cover.filename).await?.url),
        None => None,
    };

    let password_hash =
        password::hash_password(password).map_err(|_| ApiError::internal("something went wrong"))?;

    let user = state
        .db
        .create(NewUser {
            username,
            email: email.to_string(),
            full_name: full_name.to_string(),
            password_hash,
            avatar_url,
            cover_image_url,
        })
        .await?;

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        UserResponse::from(user),
        "user registered successfully",
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> Result<ApiResponse<SessionResponse>, ApiError> {
    let session = session::login(
        &state.db,
        &state.jwt,
        body.username.as_deref(),
        body.email.as_deref(),
        &body.password,
    )
    .await?;

    set_session_cookies(
        &cookies,
        &state.jwt,
        state.secure_cookies(),
        &session.tokens.access_token,
        &session.tokens.refresh_token,
    );

    Ok(ApiResponse::ok(
        SessionResponse {
            user: UserResponse::from(session.user),
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
        },
        "user logged in successfully",
    ))
}

/// POST /api/v1/users/logout
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    AuthUser { user }: AuthUser,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    session::logout(&state.db, user.id).await?;

    clear_session_cookies(&cookies, state.secure_cookies());

    Ok(ApiResponse::ok(serde_json::json!({}), "user logged out"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// POST /api/v1/users/refresh-token
///
/// The incoming token is read from the `refreshToken` cookie first, then
/// from the request body.
pub async fn refresh_token(
    State(state): State<AppState>,
    cookies: Cookies,
    body: Option<Json<RefreshRequest>>,
) -> Result<ApiResponse<TokenPairResponse>, ApiError> {
    let incoming = cookies
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| body.and_then(|Json(body)| body.refresh_token));

    let session = session::refresh(&state.db, &state.jwt, incoming.as_deref()).await?;

    set_session_cookies(
        &cookies,
        &state.jwt,
        state.secure_cookies(),
        &session.tokens.access_token,
        &session.tokens.refresh_token,
    );

    Ok(ApiResponse::ok(
        TokenPairResponse {
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
        },
        "access token refreshed",
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// POST /api/v1/users/change-password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser { user }: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    session::change_password(&state.db, user.id, &body.old_password, &body.new_password).await?;

    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "password changed successfully",
    ))
}

/// GET /api/v1/users/me
pub async fn current_user(
    AuthUser { user }: AuthUser,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    Ok(ApiResponse::ok(
        UserResponse::from(user),
        "current user fetched successfully",
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// PATCH /api/v1/users/update-account
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser { user }: AuthUser,
    Json(body): Json<UpdateAccountRequest>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let full_name = body.full_name.as_deref().map(str::trim).unwrap_or("");
    let email = body.email.as_deref().map(str::trim).unwrap_or("");

    if full_name.is_empty() || email.is_empty() {
        return Err(ApiError::bad_request("all fields are required"));
    }

    let updated = state
        .db
        .update_profile_fields(user.id, full_name, email)
        .await?;

    Ok(ApiResponse::ok(
        UserResponse::from(updated),
        "account details updated successfully",
    ))
}

/// Pull a single named file out of a multipart body, ignoring other fields.
async fn single_file_field(
    multipart: &mut Multipart,
    name: &str,
) -> Result<Option<UploadedFile>, ApiError> {
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))?
    {
        if field.name() == Some(name) {
            file = Some(read_file(field).await?);
        }
    }

    Ok(file)
}

/// PATCH /api/v1/users/avatar
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser { user }: AuthUser,
    mut multipart: Multipart,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let Some(avatar) = single_file_field(&mut multipart, "avatar").await? else {
        return Err(ApiError::bad_request("avatar file is missing"));
    };

    let uploaded = state.media.upload(avatar.bytes, &avatar.filename).await?;
    let updated = state.db.set_avatar_url(user.id, &uploaded.url).await?;

    Ok(ApiResponse::ok(
        UserResponse::from(updated),
        "avatar image updated successfully",
    ))
}

/// PATCH /api/v1/users/cover-image
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser { user }: AuthUser,
    mut multipart: Multipart,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let Some(cover) = single_file_field(&mut multipart, "coverImage").await? else {
        return Err(ApiError::bad_request("cover image file is missing"));
    };

    let uploaded = state.media.upload(cover.bytes, &cover.filename).await?;
    let updated = state.db.set_cover_image_url(user.id, &uploaded.url).await?;

    Ok(ApiResponse::ok(
        UserResponse::from(updated),
        "cover image updated successfully",
    ))
}
