// src/auth.rs
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::Filter;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// Issues an HS256 token whose subject is the owner identity.
pub fn create_token(
    owner_id: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: owner_id.to_string(),
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Owner identity carried by a valid, unexpired token.
pub fn verify_token(token: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(data.claims.sub)
}

fn owner_from_header(header: Option<&str>, secret: &str) -> Option<String> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    match verify_token(token, secret) {
        Ok(owner) if !owner.is_empty() => Some(owner),
        Ok(_) => None,
        Err(e) => {
            debug!("Rejected bearer token: {}", e);
            None
        }
    }
}

/// Extracts the authenticated owner, or `None` for anonymous requests.
pub fn with_owner(
    secret: Arc<String>,
) -> impl Filter<Extract = (Option<String>,), Error = std::convert::Infallible> + Clone {
    warp::header::optional::<String>("authorization")
        .or(warp::any().map(|| None))
        .unify()
        .map(move |header: Option<String>| owner_from_header(header.as_deref(), &secret))
}
