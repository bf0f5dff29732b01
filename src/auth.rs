use chrono::Utc;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger::Ledger;
use crate::models::{NewUserRecord, Session, SubscriptionTier, User, UserRecord};
use crate::session::SessionStore;
use crate::store::StoreApi;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";
const ADMIN_ROLE: &str = "amministratore";
const USER_ROLE: &str = "utente";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub accept_terms: bool,
}

/// Outcome of the account teardown run on logout.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LogoutReport {
    pub user_id: Option<String>,
    pub account_deleted: bool,
    pub purchases_deleted: usize,
    pub interactions_deleted: usize,
    pub failures: Vec<String>,
}

impl LogoutReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationFailed(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(AppError::ValidationFailed(
            "Password must contain at least one special character".into(),
        ));
    }
    Ok(())
}

fn validate_credentials(email: &str, password: &str) -> AppResult<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::ValidationFailed(
            "Email and password are required".into(),
        ));
    }
    if !is_valid_email(email.trim()) {
        return Err(AppError::ValidationFailed("Invalid email format".into()));
    }
    validate_password(password)
}

pub fn validate_registration(req: &RegisterRequest) -> AppResult<()> {
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(AppError::ValidationFailed("All fields are required".into()));
    }
    validate_credentials(&req.email, &req.password)?;
    if req.password != req.confirm_password {
        return Err(AppError::ValidationFailed("Passwords do not match".into()));
    }
    if !req.accept_terms {
        return Err(AppError::ValidationFailed(
            "You must accept the terms and conditions".into(),
        ));
    }
    Ok(())
}

pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// HMAC-SHA256 of the password keyed by the salt, hex encoded.
///
/// A single fast round, not a password KDF. Enough to keep raw passwords out
/// of the mock store; a real backend should use argon2 or pbkdf2.
pub fn hash_password(password: &str, salt: &str) -> AppResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(salt.as_bytes())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
    mac.update(password.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_password(password: &str, salt: &str, expected_hex: &str) -> bool {
    if salt.is_empty() || expected_hex.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(salt.as_bytes()) else {
        return false;
    };
    mac.update(password.as_bytes());
    let computed = mac.finalize().into_bytes();

    expected.len() == computed.len() && constant_time_eq(&computed, &expected)
}

fn tier_for_role(role: &str) -> SubscriptionTier {
    if role == ADMIN_ROLE {
        SubscriptionTier::Premium
    } else {
        SubscriptionTier::Standard
    }
}

fn issue_session(record: &UserRecord, tier: SubscriptionTier) -> Session {
    let now = Utc::now();
    Session {
        user: User {
            id: record.id.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email: record.email.clone(),
            tier,
            subscribed_at: now,
            created_at: now,
            updated_at: now,
        },
        token: Uuid::new_v4().to_string(),
        issued_at: now,
    }
}

pub struct Auth {
    store: Arc<dyn StoreApi>,
    sessions: Arc<SessionStore>,
    ledger: Arc<Ledger>,
}

impl Auth {
    pub fn new(store: Arc<dyn StoreApi>, sessions: Arc<SessionStore>, ledger: Arc<Ledger>) -> Self {
        Self {
            store,
            sessions,
            ledger,
        }
    }

    pub async fn login(&self, req: &LoginRequest) -> AppResult<Session> {
        validate_credentials(&req.email, &req.password)?;
        let email = req.email.trim();

        let users = self
            .store
            .find_users_by_email(email)
            .await
            .map_err(AppError::persistence)?;
        let Some(record) = users.into_iter().next() else {
            info!(email, "Login rejected: unknown email");
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(&req.password, &record.password_salt, &record.password_hash) {
            info!(user_id = %record.id, "Login rejected: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let session = issue_session(&record, tier_for_role(&record.role));
        self.start(session).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> AppResult<Session> {
        validate_registration(req)?;
        let email = req.email.trim();

        let existing = self
            .store
            .find_users_by_email(email)
            .await
            .map_err(AppError::persistence)?;
        if !existing.is_empty() {
            return Err(AppError::ValidationFailed(
                "An account with this email already exists".into(),
            ));
        }

        let salt = new_salt();
        let record = NewUserRecord {
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            email: email.to_string(),
            password_hash: hash_password(&req.password, &salt)?,
            password_salt: salt,
            role: USER_ROLE.to_string(),
        };
        let created = self
            .store
            .create_user(&record)
            .await
            .map_err(AppError::persistence)?;
        info!(user_id = %created.id, "User registered");

        let session = issue_session(&created, SubscriptionTier::FreeTrial);
        self.start(session).await
    }

    async fn start(&self, session: Session) -> AppResult<Session> {
        self.sessions
            .replace(session.clone())
            .await
            .map_err(|e| AppError::Internal(format!("{:#}", e)))?;
        if let Err(err) = self.ledger.reload(&session).await {
            warn!(user_id = session.user_id(), error = %err, "Purchases not loaded after login");
        }
        info!(user_id = session.user_id(), tier = ?session.user.tier, "Logged in");
        Ok(session)
    }

    pub fn current(&self) -> Option<Session> {
        self.sessions.current()
    }

    /// Clears the session, then deletes the user's purchases, interactions and
    /// account. Every step runs; failures are collected in the report.
    pub async fn logout(&self) -> LogoutReport {
        let previous = self.sessions.current();
        let mut report = LogoutReport::default();

        if let Err(err) = self.sessions.clear().await {
            report.failures.push(format!("session file: {:#}", err));
        }
        self.ledger.clear().await;

        let Some(session) = previous else {
            return report;
        };
        let user_id = session.user_id().to_string();
        report.user_id = Some(user_id.clone());

        match self.store.list_purchases(&user_id).await {
            Ok(purchases) => {
                for purchase in purchases {
                    match self.store.delete_purchase(&purchase.id).await {
                        Ok(()) => report.purchases_deleted += 1,
                        Err(err) => report
                            .failures
                            .push(format!("purchase {}: {:#}", purchase.id, err)),
                    }
                }
            }
            Err(err) => report.failures.push(format!("listing purchases: {:#}", err)),
        }

        match self.store.list_interactions(&user_id).await {
            Ok(interactions) => {
                for interaction in interactions {
                    match self.store.delete_interaction(&interaction.id).await {
                        Ok(()) => report.interactions_deleted += 1,
                        Err(err) => report
                            .failures
                            .push(format!("interaction {}: {:#}", interaction.id, err)),
                    }
                }
            }
            Err(err) => report
                .failures
                .push(format!("listing interactions: {:#}", err)),
        }

        match self.store.delete_user(&user_id).await {
            Ok(()) => report.account_deleted = true,
            Err(err) => report.failures.push(format!("account: {:#}", err)),
        }

        if report.is_clean() {
            info!(
                user_id = %user_id,
                purchases = report.purchases_deleted,
                interactions = report.interactions_deleted,
                "Logged out and account removed"
            );
        } else {
            warn!(
                user_id = %user_id,
                failures = report.failures.len(),
                "Logout teardown incomplete"
            );
        }
        report
    }
}
