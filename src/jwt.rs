use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{AuthenticatedUser, Role};
use crate::errors::AppError;
use crate::models::user::{DbUser, USER_COLUMNS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub refresh_secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
    pub refresh_exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let refresh_secret = std::env::var("JWT_REFRESH_SECRET").unwrap_or_else(|_| secret.clone());
        let exp_hours = hours_from_env("JWT_EXP_HOURS", 24)?;
        let refresh_exp_hours = hours_from_env("JWT_REFRESH_EXP_HOURS", 24 * 7)?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            refresh_secret: Arc::new(refresh_secret.into_bytes()),
            exp_hours,
            refresh_exp_hours,
        })
    }

    fn key_for(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    pub fn encode(&self, user_id: Uuid, username: &str, role: Role, kind: TokenKind) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let hours = match kind {
            TokenKind::Access => self.exp_hours,
            TokenKind::Refresh => self.refresh_exp_hours,
        };
        let now = Utc::now();
        let exp = now + Duration::hours(hours);

        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role,
            kind,
            // Unique per issuance so rotated tokens never collide.
            jti: Uuid::new_v4(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(self.key_for(kind)))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(self.key_for(kind)), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))?;

        if claims.kind != kind {
            return Err(AppError::token("wrong token kind"));
        }

        Ok(claims)
    }

    pub fn issue_pair(&self, user_id: Uuid, username: &str, role: Role) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.encode(user_id, username, role, TokenKind::Access)?,
            refresh_token: self.encode(user_id, username, role, TokenKind::Refresh)?,
        })
    }
}

fn hours_from_env(key: &str, default: i64) -> Result<i64, AppError> {
    std::env::var(key)
        .map(|val| val.parse::<i64>())
        .unwrap_or(Ok(default))
        .map_err(|_| AppError::configuration(format!("{key} must be a valid integer")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub kind: TokenKind,
    pub jti: Uuid,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the bearer access token into an `AuthenticatedUser` request extension.
///
/// Without an `Authorization` header the request continues anonymously and the route guards decide.
/// A header that does not verify, or that names a deleted account, is rejected with 401.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(req.headers()) {
        let claims = state.jwt.decode(token, TokenKind::Access)?;
        let user = load_authenticated_user(&state, claims.sub).await?;
        req.extensions_mut().insert(user);
    }

    Ok(next.run(req).await)
}

async fn load_authenticated_user(state: &AppState, user_id: Uuid) -> Result<AuthenticatedUser, AppError> {
    let db_user = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(user_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

    let role = db_user.role()?;
    Ok(AuthenticatedUser::new(user_id, db_user.full_name, db_user.username, role)
        .with_permissions(state.permissions.permissions_for(role).iter().copied()))
}

/// Extractor for handlers that need the caller's identity; 401 when the request is anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: Arc::new(b"access-secret".to_vec()),
            refresh_secret: Arc::new(b"refresh-secret".to_vec()),
            exp_hours: 1,
            refresh_exp_hours: 2,
        }
    }

    #[test]
    fn access_token_round_trips() {
        let cfg = config();
        let id = Uuid::new_v4();
        let token = cfg.encode(id, "budi", Role::Petugas, TokenKind::Access).unwrap();
        let claims = cfg.decode(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Petugas);
        assert_eq!(claims.username, "budi");
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let cfg = config();
        let pair = cfg.issue_pair(Uuid::new_v4(), "budi", Role::User).unwrap();
        assert!(cfg.decode(&pair.refresh_token, TokenKind::Access).is_err());
        assert!(cfg.decode(&pair.access_token, TokenKind::Refresh).is_err());
        assert!(cfg.decode(&pair.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn same_secret_still_separates_kinds() {
        let mut cfg = config();
        cfg.refresh_secret = Arc::clone(&cfg.secret);
        let pair = cfg.issue_pair(Uuid::new_v4(), "budi", Role::User).unwrap();
        assert!(cfg.decode(&pair.refresh_token, TokenKind::Access).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
