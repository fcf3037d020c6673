use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Claims carried by an issued access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    /// Expiry, seconds since epoch
    pub exp: i64,
}

/// Sign an HS256 access token for a logged-in user.
pub fn create_access_token(
    config: &JwtConfig,
    user_id: Uuid,
    username: &str,
) -> Result<String, String> {
    let exp = (Utc::now() + Duration::minutes(config.expire_minutes)).timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to sign access token: {e}"))
}
