use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::env;

use crate::models::Principal;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // member id
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
    pub jti: String,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal::from_claims(&self.sub, &self.roles)
    }
}

pub fn create_jwt(user_id: &str, roles: &[&str], secret: &str) -> Result<String> {
    let expiration = (Utc::now() + Duration::hours(24)).timestamp();

    let claims = Claims {
        sub: user_id.to_owned(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
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
    let (decoding_key, validation) = if let Ok(public_key) = env::var("JWT_PUBLIC_KEY") {
        let mut val = Validation::new(Algorithm::RS256);
        val.validate_aud = false; // tokens minted by an external identity provider
        (DecodingKey::from_rsa_pem(public_key.as_bytes())?, val)
    } else {
        (
            DecodingKey::from_secret(secret.as_ref()),
            Validation::default(),
        )
    };

    let token_data = decode::<Claims>(token, &decoding_key, &validation)?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_jwt_cycle() {
        let secret = "test_secret";
        let token = create_jwt("user_123", &["editor"], secret).unwrap();
        let claims = validate_jwt(&token, secret).unwrap();
        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.roles, vec!["editor"]);

        let principal = claims.principal();
        assert!(principal.has_role(Role::Editor));
        assert!(!principal.is_admin());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_jwt("user_123", &[], "right").unwrap();
        assert!(validate_jwt(&token, "wrong").is_err());
    }
}
