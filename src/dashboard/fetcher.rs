use crate::db::models::{NewUser, ProfileUpdate, PublicUser};
use crate::error::{AppError, Result};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const SENSORS_PATH: &str = "/api/sensors-data";
pub const HISTORY_PATH: &str = "/api/sensors-data/history";
pub const PREDICTIONS_PATH: &str = "/api/prediction-data";

/// HTTP client for the dashboard's data and account endpoints.
pub struct Fetcher {
    client: Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: PublicUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl Fetcher {
    pub fn new(base_url: &str, timeout: Option<Duration>, max_retries: u32) -> Result<Self> {
        let mut builder = Client::builder().user_agent("vfarm-dashboard/0.1.0");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn sensor_records(&self) -> Result<Vec<Value>> {
        self.fetch_records(SENSORS_PATH).await
    }

    pub async fn history_records(&self) -> Result<Vec<Value>> {
        self.fetch_records(HISTORY_PATH).await
    }

    pub async fn prediction_records(&self) -> Result<Vec<Value>> {
        self.fetch_records(PREDICTIONS_PATH).await
    }

    /// GET a JSON array. Any failure comes back as [`AppError::Fetch`].
    pub async fn fetch_records(&self, path: &str) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching records from {}", url);

        let body = retry_with_backoff(self.max_retries, || async {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            Ok(response.json::<Value>().await?)
        })
        .await
        .map_err(into_fetch_error)?;

        match body {
            Value::Array(records) => {
                debug!("Fetched {} records from {}", records.len(), path);
                Ok(records)
            }
            other => Err(AppError::Fetch(format!(
                "{} returned {} instead of an array",
                path,
                json_kind(&other)
            ))),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<PublicUser> {
        let response = self
            .client
            .post(format!("{}/api/login", self.base_url))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| into_fetch_error(e.into()))?;

        let body: LoginResponse = read_json(response).await?;
        Ok(body.user)
    }

    /// Returns the new user's id.
    pub async fn register(&self, user: &NewUser) -> Result<i64> {
        let response = self
            .client
            .post(format!("{}/api/register", self.base_url))
            .json(user)
            .send()
            .await
            .map_err(|e| into_fetch_error(e.into()))?;

        let body: RegisterResponse = read_json(response).await?;
        Ok(body.user_id)
    }

    pub async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<()> {
        let mut payload = serde_json::to_value(update)
            .map_err(|e| AppError::InvalidData(format!("profile update: {}", e)))?;
        if let Value::Object(map) = &mut payload {
            map.insert("userId".to_string(), json!(user_id));
        }

        let response = self
            .client
            .put(format!("{}/api/profile", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| into_fetch_error(e.into()))?;

        read_json::<Value>(response).await.map(|_| ())
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/change-password", self.base_url))
            .json(&json!({
                "userId": user_id,
                "currentPassword": current_password,
                "newPassword": new_password,
            }))
            .send()
            .await
            .map_err(|e| into_fetch_error(e.into()))?;

        read_json::<Value>(response).await.map(|_| ())
    }
}

/// Decode a JSON body, turning error statuses into the matching error kind
/// with the server's `error` message.
async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| AppError::Fetch(format!("invalid response body: {}", e)));
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("Request failed ({})", status));

    Err(match status {
        StatusCode::BAD_REQUEST => AppError::BadRequest(message),
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        _ => AppError::Fetch(message),
    })
}

fn into_fetch_error(e: AppError) -> AppError {
    match e {
        AppError::Http(err) => match err.status() {
            Some(status) => AppError::Fetch(format!("Network error ({})", status)),
            None => AppError::Fetch(err.to_string()),
        },
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Retry a future with exponential backoff
async fn retry_with_backoff<F, Fut, T>(max_retries: u32, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                retries += 1;

                if retries > max_retries {
                    return Err(e);
                }

                // Check if error is transient (retryable)
                let should_retry = match &e {
                    AppError::Http(reqwest_err) => {
                        // Retry on connection errors, timeouts, server errors (5xx)
                        reqwest_err.is_timeout()
                            || reqwest_err.is_connect()
                            || reqwest_err
                                .status()
                                .map(|s| s.is_server_error())
                                .unwrap_or(false)
                    }
                    AppError::Io(_) => true,
                    _ => false,
                };

                if !should_retry {
                    return Err(e);
                }

                let delay = Duration::from_secs(2u64.pow(retries.saturating_sub(1)));
                warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    retries, max_retries, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
