use crate::db::models::{NewUser, ProfileUpdate, PublicUser};
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const BCRYPT_COST: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: PublicUser,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (Some(username), Some(password)) = (present(req.username), present(req.password)) else {
        return Err(AppError::BadRequest("Missing credentials".to_string()));
    };

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = state
        .repository
        .find_user_by_username(&username)
        .await?
        .ok_or_else(invalid)?;

    if !bcrypt::verify(&password, &user.password)? {
        warn!("Failed login for {}", username);
        return Err(invalid());
    }

    info!("User {} logged in", username);
    Ok(Json(LoginResponse {
        success: true,
        user: user.into(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl RegisterRequest {
    /// All fields present, or 400 naming every missing one.
    fn into_new_user(self) -> Result<NewUser> {
        let fields = [
            ("email", present(self.email)),
            ("username", present(self.username)),
            ("password", present(self.password)),
            ("firstName", present(self.first_name)),
            ("lastName", present(self.last_name)),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let [email, username, password, first_name, last_name] =
            fields.map(|(_, value)| value.unwrap_or_default());

        Ok(NewUser {
            email,
            username,
            password,
            first_name,
            last_name,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: i64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let mut user = req.into_new_user()?;
    user.password = bcrypt::hash(&user.password, BCRYPT_COST)?;

    let user_id = state.repository.create_user(&user).await?;
    info!("Registered user {} with id {}", user.username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            user_id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub update: ProfileUpdate,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: PublicUser,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    let user_id = req
        .user_id
        .ok_or_else(|| AppError::BadRequest("User ID required".to_string()))?;

    if !state.repository.update_profile(user_id, &req.update).await? {
        return Err(user_not_found());
    }

    let user = state
        .repository
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(ProfileResponse {
        success: true,
        user: user.into(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn change_password(
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    let (Some(user_id), Some(current), Some(new)) = (
        req.user_id,
        present(req.current_password),
        present(req.new_password),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    };

    let user = state
        .repository
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(user_not_found)?;

    if !bcrypt::verify(&current, &user.password)? {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let hash = bcrypt::hash(&new, BCRYPT_COST)?;
    state.repository.update_password(user_id, &hash).await?;
    info!("Password changed for user {}", user_id);

    Ok(Json(SuccessResponse { success: true }))
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

/// Treat empty strings like missing fields.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
