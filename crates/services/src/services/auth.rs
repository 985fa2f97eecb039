//! Password hashing, JWT issuing/verification and login.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use db::models::{
    role::Role,
    user::{User, UserWithRole},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::permissions;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Unknown email, wrong password and disabled account all look the same
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    pub role_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl JwtService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl_secs: ttl_minutes * 60,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role_id: user.role_id,
            iat: now,
            exp: now + self.ttl_secs,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// The user behind a request, with the permissions of their role
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AuthenticatedUser {
    #[serde(flatten)]
    #[ts(flatten)]
    pub user: UserWithRole,
    pub is_admin: bool,
    pub permissions: Vec<String>,
}

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.user.user.id
    }

    pub fn can(&self, permission: &str) -> bool {
        self.is_admin || self.permissions.iter().any(|p| p == permission)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserWithRole,
    pub permissions: Vec<String>,
}

#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(pool: SqlitePool, jwt: JwtService) -> Self {
        Self { pool, jwt }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let Some(user) = User::find_by_email(&self.pool, &request.email).await? else {
            warn!(email = %request.email, "Login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !user.active || !verify_password(&request.password, &user.password_hash) {
            warn!(user_id = %user.id, "Rejected login");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt.issue(&user)?;
        let current = self.load(user.id).await?;
        info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            token,
            user: current.user,
            permissions: current.permissions,
        })
    }

    /// Resolve a bearer token to an active user and their permissions
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.jwt.verify(token)?;
        self.load(claims.sub).await
    }

    async fn load(&self, user_id: Uuid) -> Result<AuthenticatedUser, AuthError> {
        let user = User::find_with_role(&self.pool, user_id)
            .await?
            .filter(|u| u.user.active)
            .ok_or(AuthError::InvalidToken)?;
        let role = Role::find_by_id(&self.pool, user.user.role_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let permissions = if role.is_admin {
            permissions::all()
        } else {
            Role::permissions(&self.pool, role.id).await?
        };
        Ok(AuthenticatedUser {
            user,
            is_admin: role.is_admin,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{db, seed_user};

    #[test]
    fn password_round_trip() {
        let hash = hash_password("cemento-portland").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("cemento-portland", &hash));
        assert!(!verify_password("cemento", &hash));
        assert!(!verify_password("cemento-portland", "not-a-hash"));
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            email: "ana@obra.pe".to_string(),
            password_hash: String::new(),
            role_id: Uuid::new_v4(),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let token = JwtService::new("one", 5).issue(&user).unwrap();
        let claims = JwtService::new("one", 5).verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.exp - claims.iat, 300);
        assert!(matches!(
            JwtService::new("two", 5).verify(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn login_returns_token_and_role_permissions() {
        let db = db().await;
        seed_user(&db.pool, "bodega@obra.pe", "almacen123", &["productos.view"], true).await;
        let auth = AuthService::new(db.pool.clone(), JwtService::new("secret", 60));

        let response = auth
            .login(&LoginRequest {
                email: "BODEGA@obra.pe".to_string(),
                password: "almacen123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.permissions, vec!["productos.view"]);

        let current = auth.authenticate(&response.token).await.unwrap();
        assert!(current.can("productos.view"));
        assert!(!current.can("productos.delete"));
    }

    #[tokio::test]
    async fn inactive_user_and_wrong_password_look_the_same() {
        let db = db().await;
        seed_user(&db.pool, "baja@obra.pe", "password1", &[], false).await;
        seed_user(&db.pool, "activo@obra.pe", "password1", &[], true).await;
        let auth = AuthService::new(db.pool.clone(), JwtService::new("secret", 60));

        for (email, password) in [("baja@obra.pe", "password1"), ("activo@obra.pe", "nope")] {
            let result = auth
                .login(&LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }
    }
}
