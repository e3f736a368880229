//! Fixtures for unit and integration tests: an in-memory `AppState`, staff
//! factories and bearer headers.

use chrono::Duration;
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::enums::{Presence, Role, StaffTier};
use crate::core::shared::state::AppState;
use crate::security::jwt::JwtManager;
use crate::security::password::{Argon2Config, PasswordHasher2};
use crate::store::{CrmStore, InMemoryStore};
use crate::users::types::User;

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hs256-signing";
pub const TEST_PASSWORD: &str = "password123";

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: Some(TEST_JWT_SECRET.to_string()),
        app_env: "test".to_string(),
        ..AppConfig::default()
    }
}

pub fn test_state() -> Arc<AppState> {
    test_state_with(InMemoryStore::new())
}

pub fn test_state_with(store: InMemoryStore) -> Arc<AppState> {
    let jwt = JwtManager::new(TEST_JWT_SECRET, Duration::days(7))
        .expect("test JWT manager");
    Arc::new(AppState::new(test_config(), Arc::new(store), jwt))
}

/// Argon2 hash of [`TEST_PASSWORD`] with cheap parameters.
pub fn test_password_hash() -> String {
    PasswordHasher2::new(Argon2Config::fast())
        .and_then(|h| h.hash(TEST_PASSWORD))
        .expect("test password hash")
}

pub struct UserFactory {
    user: User,
}

impl UserFactory {
    pub fn new(name: &str, role: Role) -> Self {
        let email = format!("{}@gnosis.test", name.to_lowercase().replace(' ', "."));
        Self {
            user: User::new(name.to_string(), email, test_password_hash(), role),
        }
    }

    pub fn admin(name: &str) -> Self {
        Self::new(name, Role::Admin)
    }

    pub fn warmer(name: &str) -> Self {
        Self::new(name, Role::Warmer)
            .tier(StaffTier::W1)
            .status(Presence::Online)
    }

    pub fn closer(name: &str) -> Self {
        Self::new(name, Role::Closer)
            .tier(StaffTier::C1)
            .status(Presence::Online)
    }

    pub fn tier(mut self, tier: StaffTier) -> Self {
        self.user.tier = Some(tier);
        self
    }

    pub fn status(mut self, status: Presence) -> Self {
        self.user.status = status;
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.user.performance_score = score;
        self
    }

    pub fn build(self) -> User {
        self.user
    }

    pub async fn insert(self, state: &AppState) -> User {
        state
            .store
            .insert_user(self.user)
            .await
            .expect("insert test user")
    }
}

/// `Authorization` header value for `user`.
pub fn bearer(state: &AppState, user: &User) -> String {
    let issued = state.jwt.issue(user).expect("issue test token");
    format!("Bearer {}", issued.token)
}
