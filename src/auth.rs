//! Request authentication: JWT validation and owner resolution

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Request;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User role (admin, customer, worker)
    pub role: String,
    /// Owner ID (for workers - the customer whose calendar they work on)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authentication result from extract_auth
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub role: String,
    pub owner_id: Option<Uuid>,
}

impl AuthInfo {
    /// Owner of the calendar data this request acts on.
    /// Workers act on their owner's events and optimizations.
    pub fn data_user_id(&self) -> Uuid {
        if self.role == "worker" {
            self.owner_id.unwrap_or(self.user_id)
        } else {
            self.user_id
        }
    }
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Extract authentication info from a NATS request (JWT required)
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo> {
    let token = request
        .token
        .as_deref()
        .ok_or_else(|| anyhow!("No authentication provided, JWT token is required"))?;

    let claims = validate_token(token, jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| anyhow!("Invalid user_id in token: {}", e))?;
    let owner_id = claims
        .owner_id
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|e| anyhow!("Invalid owner_id in token: {}", e))?;

    Ok(AuthInfo {
        user_id,
        role: claims.role,
        owner_id,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub(crate) const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    pub(crate) fn token_for(user_id: Uuid, role: &str, owner_id: Option<Uuid>, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            owner_id: owner_id.map(|id| id.to_string()),
            iat: now,
            exp: now + 60 * 60,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_validate_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = token_for(user_id, "customer", None, TEST_SECRET);

        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "customer");
        assert!(claims.owner_id.is_none());
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let token = token_for(Uuid::new_v4(), "customer", None, TEST_SECRET);
        assert!(validate_token(&token, "another-secret-that-is-also-32-bytes-long").is_err());
    }

    #[test]
    fn test_validate_token_expired() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: "customer".to_string(),
            owner_id: None,
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes())).unwrap();
        assert!(validate_token(&token, TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_worker_acts_for_owner() {
        let user_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let token = token_for(user_id, "worker", Some(owner_id), TEST_SECRET);

        let request = Request::with_token(token, serde_json::Value::Null);
        let auth = extract_auth(&request, TEST_SECRET).unwrap();

        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.data_user_id(), owner_id);
    }

    #[test]
    fn test_extract_auth_customer_acts_for_self() {
        let user_id = Uuid::new_v4();
        let token = token_for(user_id, "customer", Some(Uuid::new_v4()), TEST_SECRET);

        let request = Request::with_token(token, serde_json::Value::Null);
        let auth = extract_auth(&request, TEST_SECRET).unwrap();
        assert_eq!(auth.data_user_id(), user_id);
    }

    #[test]
    fn test_extract_auth_requires_valid_token() {
        let mut request = Request::with_token("bad-token".to_string(), serde_json::Value::Null);
        assert!(extract_auth(&request, TEST_SECRET).is_err());

        request.token = None;
        assert!(extract_auth(&request, TEST_SECRET).is_err());
    }
}
