//! Bearer-token authentication for the chat routes.
//!
//! Tokens are HMAC-signed JWTs issued by the backend's `/auth/login`. This
//! service only verifies them; it never looks a user up.
//!
//! - No `Authorization` header: the request proceeds anonymously.
//! - A header that is present but fails verification: `401`, the router is never reached.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

use super::error::ApiError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl JwtAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            JwtAlgorithm::HS256 => "HS256",
            JwtAlgorithm::HS384 => "HS384",
            JwtAlgorithm::HS512 => "HS512",
        }
    }

    fn verify(&self, secret: &[u8], message: &[u8], signature: &[u8]) -> bool {
        match self {
            JwtAlgorithm::HS256 => verify_mac::<Hmac<Sha256>>(secret, message, signature),
            JwtAlgorithm::HS384 => verify_mac::<Hmac<Sha384>>(secret, message, signature),
            JwtAlgorithm::HS512 => verify_mac::<Hmac<Sha512>>(secret, message, signature),
        }
    }
}

fn verify_mac<M>(secret: &[u8], message: &[u8], signature: &[u8]) -> bool
where
    M: Mac + hmac::digest::KeyInit,
{
    match <M as hmac::digest::KeyInit>::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(message);
            mac.verify_slice(signature).is_ok()
        }
        Err(_) => false,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("malformed token")]
    MalformedToken,

    #[error("unsupported token algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("token has no subject")]
    MissingSubject,
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// User id as issued by the backend. Some issuers encode it as a number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Verified caller, attached to the request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: Option<String>,
}

impl CurrentUser {
    /// Name shown back to the user. The backend puts the login e-mail here.
    pub fn identity(&self) -> String {
        self.email.clone().unwrap_or_else(|| self.user_id.clone())
    }
}

/// `None` for anonymous requests.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<CurrentUser>);

impl Viewer {
    pub fn identity(&self) -> Option<String> {
        self.0.as_ref().map(CurrentUser::identity)
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<[u8]>,
    algorithm: JwtAlgorithm,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"[redacted]")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str, algorithm: JwtAlgorithm) -> Self {
        Self {
            secret: Arc::from(secret.as_bytes()),
            algorithm,
        }
    }

    pub fn verify(&self, token: &str) -> Result<CurrentUser, AuthError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<CurrentUser, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken);
        };

        let header: JwtHeader = decode_segment(header_b64)?;
        if header.alg != self.algorithm.as_str() {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::MalformedToken)?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        if !self
            .algorithm
            .verify(&self.secret, signing_input.as_bytes(), &signature)
        {
            return Err(AuthError::BadSignature);
        }

        let claims: Claims = decode_segment(claims_b64)?;
        if let Some(exp) = claims.exp {
            if exp <= now {
                return Err(AuthError::Expired);
            }
        }
        if let Some(nbf) = claims.nbf {
            if nbf > now {
                return Err(AuthError::NotYetValid);
            }
        }

        let user_id = claims.sub.ok_or(AuthError::MissingSubject)?;
        Ok(CurrentUser {
            user_id,
            email: claims.email,
        })
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

/// Resolves the optional bearer token into a [`Viewer`] extension.
pub async fn auth_middleware(
    State(verifier): State<TokenVerifier>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .map(|v| v.to_str().map(str::to_owned));

    let viewer = match header {
        None => Viewer(None),
        Some(Err(_)) => return ApiError::Unauthorized(AuthError::MalformedHeader).into_response(),
        Some(Ok(value)) => {
            let Some(token) = value.strip_prefix("Bearer ") else {
                return ApiError::Unauthorized(AuthError::MalformedHeader).into_response();
            };
            match verifier.verify(token.trim()) {
                Ok(user) => Viewer(Some(user)),
                Err(e) => {
                    tracing::debug!(error = %e, "rejecting bearer token");
                    return ApiError::Unauthorized(e).into_response();
                }
            }
        }
    };

    request.extensions_mut().insert(viewer);
    next.run(request).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const SECRET: &str = "CHANGE_ME_PLEASE";

    pub(crate) fn sign(secret: &str, algorithm: JwtAlgorithm, claims: serde_json::Value) -> String {
        let header = serde_json::json!({"alg": algorithm.as_str(), "typ": "JWT"});
        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature = match algorithm {
            JwtAlgorithm::HS256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
                mac.update(signing_input.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            JwtAlgorithm::HS384 => {
                let mut mac = Hmac::<Sha384>::new_from_slice(secret.as_bytes()).unwrap();
                mac.update(signing_input.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            JwtAlgorithm::HS512 => {
                let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
                mac.update(signing_input.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
        };
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(SECRET, JwtAlgorithm::HS256)
    }

    #[test]
    fn test_valid_token_yields_user() {
        let token = sign(
            SECRET,
            JwtAlgorithm::HS256,
            serde_json::json!({"sub": "42", "email": "alice@example.com", "exp": 2_000}),
        );
        let user = verifier().verify_at(&token, 1_000).unwrap();
        assert_eq!(user.user_id, "42");
        assert_eq!(user.identity(), "alice@example.com");
    }

    #[test]
    fn test_numeric_subject_and_missing_email() {
        let token = sign(SECRET, JwtAlgorithm::HS256, serde_json::json!({"sub": 7}));
        let user = verifier().verify_at(&token, 1_000).unwrap();
        assert_eq!(user.user_id, "7");
        assert_eq!(user.identity(), "7");
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = sign(
            SECRET,
            JwtAlgorithm::HS256,
            serde_json::json!({"sub": "1", "exp": 999}),
        );
        assert_eq!(verifier().verify_at(&token, 1_000), Err(AuthError::Expired));
    }

    #[test]
    fn test_not_before_is_enforced() {
        let token = sign(
            SECRET,
            JwtAlgorithm::HS256,
            serde_json::json!({"sub": "1", "nbf": 1_500}),
        );
        assert_eq!(verifier().verify_at(&token, 1_000), Err(AuthError::NotYetValid));
        assert!(verifier().verify_at(&token, 1_500).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign("other", JwtAlgorithm::HS256, serde_json::json!({"sub": "1"}));
        assert_eq!(verifier().verify_at(&token, 0), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let token = sign(SECRET, JwtAlgorithm::HS512, serde_json::json!({"sub": "1"}));
        assert_eq!(
            verifier().verify_at(&token, 0),
            Err(AuthError::UnsupportedAlgorithm("HS512".to_string()))
        );

        let hs512 = TokenVerifier::new(SECRET, JwtAlgorithm::HS512);
        assert!(hs512.verify_at(&token, 0).is_ok());
    }

    #[test]
    fn test_missing_subject_rejected() {
        let token = sign(SECRET, JwtAlgorithm::HS256, serde_json::json!({"email": "a@b.c"}));
        assert_eq!(verifier().verify_at(&token, 0), Err(AuthError::MissingSubject));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(verifier().verify_at("abc", 0), Err(AuthError::MalformedToken));
        assert_eq!(verifier().verify_at("a.b.c.d", 0), Err(AuthError::MalformedToken));
        assert_eq!(verifier().verify_at("!!.??.##", 0), Err(AuthError::MalformedToken));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let token = sign(SECRET, JwtAlgorithm::HS256, serde_json::json!({"sub": "1"}));
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"sub":"2"}"#);
        parts[1] = forged.as_str();
        assert_eq!(
            verifier().verify_at(&parts.join("."), 0),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        assert!(!format!("{:?}", verifier()).contains(SECRET));
    }
}
