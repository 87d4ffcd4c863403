//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{RegisterRequest, Role, User, UserClaims, UserSummary},
    repository::Repository,
};

/// Unique index backing case-insensitive email uniqueness; see migrations.
const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new user. The role is fixed here; no later promotion.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<UserSummary> {
        if self.repository.users.email_exists(&request.email).await? {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = self.hash_password(&request.password)?;
        let role = request.role.unwrap_or(Role::User);

        // The unique index catches a racing duplicate registration that
        // slipped past the existence check.
        let user = self
            .repository
            .users
            .create(&request.email, &password_hash, role)
            .await
            .map_err(|e| match e {
                AppError::Database(ref db) if AppError::is_unique_violation(db, EMAIL_CONSTRAINT) => {
                    AppError::Conflict("User already exists".to_string())
                }
                other => other,
            })?;

        tracing::info!(user_id = user.id, role = %user.role, "user registered");

        Ok(user.into())
    }

    /// Authenticate by email and password, returning a session token and
    /// the user. Unknown email and wrong password are indistinguishable.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(String, UserSummary)> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let token = self.create_token(&user)?;
        Ok((token, user.into()))
    }

    /// Get a user without credentials, for `/auth/me`
    pub async fn get_summary(&self, user_id: i32) -> AppResult<UserSummary> {
        let user = self.repository.users.get_by_id(user_id).await?;
        Ok(user.into())
    }

    /// List all users without credentials, newest first (admin view)
    pub async fn list_users(&self) -> AppResult<Vec<UserSummary>> {
        self.repository.users.list_all().await
    }

    /// Create a session JWT for a user
    fn create_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Verify user password against the stored argon2 hash
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use argon2::{
        password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
        Argon2,
    };

    #[test]
    fn password_hash_verifies_and_rejects() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"secret1", &salt)
            .unwrap()
            .to_string();

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"secret1", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"secret2", &parsed).is_err());
    }

    #[test]
    fn hash_never_contains_raw_password() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"hunter2-plaintext", &salt)
            .unwrap()
            .to_string();
        assert!(!hash.contains("hunter2-plaintext"));
    }
}
