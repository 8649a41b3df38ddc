use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Session carried by the bearer token of an importing account.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // owner id
    pub bid: String, // bucket id
    pub uname: String, // owner key, namespaces the import workspace
    pub exp: usize,
    pub jti: String,
}

pub fn create_jwt(
    owner_id: &str,
    bucket_id: &str,
    owner_key: &str,
    secret: &str,
    valid_for: Duration,
) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(valid_for)
        .ok_or_else(|| anyhow!("token lifetime overflows the clock"))?
        .timestamp();

    let claims = Claims {
        sub: owner_id.to_owned(),
        bid: bucket_id.to_owned(),
        uname: owner_key.to_owned(),
        exp: expiration as usize,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}
