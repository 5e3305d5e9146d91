use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::env;

/// Claims minted by the identity provider. `sub` is the stable user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = env::var("SESSION_SECRET").unwrap_or_else(|_| "default-secret-key".to_string());

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"default-secret-key"),
        )
        .unwrap()
    }

    #[test]
    fn round_trips_subject() {
        let claims = verify_token(&token_for("user-1")).unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_token("not-a-token").is_err());
    }
}
