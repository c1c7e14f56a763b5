use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of `lettuce_wavelet` as the controller wrote it. Nothing is
/// validated here; the dashboard normalizer drops malformed rows.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SensorRow {
    pub timestamp: Option<String>,
    pub humidity: Option<f64>,
    pub temp_envi: Option<f64>,
    pub temp_water: Option<f64>,
    pub tds: Option<f64>,
    pub ec: Option<f64>,
    pub lux: Option<f64>,
    pub ppfd: Option<f64>,
    pub reflect_445: Option<f64>,
    pub reflect_480: Option<f64>,
    pub ph: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump_status: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ForecastRow {
    pub id: i64,
    pub batch_start: Option<String>,
    pub stage_name: Option<String>,
    pub stage_date: Option<String>,
    pub yield_predicted: Option<f64>,
    pub yield_count: Option<f64>,
    pub status: Option<String>,
    pub yield_status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewForecast {
    pub batch_start: Option<String>,
    pub stage_name: Option<String>,
    pub stage_date: Option<String>,
    pub yield_predicted: Option<f64>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// `/api/prediction-data` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub stage_name: String,
    pub stage_date: Option<String>,
    pub yield_predicted: Option<f64>,
    pub yield_date: Option<String>,
    pub prediction_date: String,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub batch_start: Option<String>,
}

impl ForecastRow {
    pub fn into_payload(self, prediction_date: &str) -> PredictionPayload {
        PredictionPayload {
            stage_name: self.stage_name.unwrap_or_else(|| "Unknown".to_string()),
            yield_date: self.stage_date.clone(),
            stage_date: self.stage_date,
            yield_predicted: self.yield_predicted.or(self.yield_count),
            prediction_date: prediction_date.to_string(),
            status: self.status.or(self.yield_status),
            notes: self.notes,
            batch_start: self.batch_start,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    /// bcrypt hash
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_pic: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// User as sent to clients: everything but the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            profile_pic: user.profile_pic,
            created_at: user.created_at,
        }
    }
}

impl PublicUser {
    /// Apply the fields present in `update`.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(username) = &update.username {
            self.username = username.clone();
        }
        if let Some(first_name) = &update.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(profile_pic) = &update.profile_pic {
            self.profile_pic = Some(profile_pic.clone());
        }
    }
}

/// Registration payload. `password` is plain text until hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.profile_pic.is_none()
    }
}
