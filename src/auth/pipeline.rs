use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::policy::{self, ALLOW_LOCAL_LOGIN, BANNED_FIELD, PolicyInput};
use super::stores::{AttemptStore, IdentityStore, NewIdentity, SiteConfig, Uid};
use super::verifier::{AccountRecord, CredentialVerifier};
use crate::error::{AuthError, StatusField};
use crate::pool::ConnectionFactory;

/// Message attached to every successful decision.
pub const AUTH_SUCCESS_MESSAGE: &str = "[[success:authentication-successful]]";

/// What the host's credential hook hands over.
#[derive(Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub source_address: IpAddr,
}

impl LoginRequest {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        source_address: IpAddr,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            source_address,
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("source_address", &self.source_address)
            .finish_non_exhaustive()
    }
}

/// A successful authentication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthDecision {
    pub uid: Uid,
    /// Fetched profile fields with `uid` and `isAdmin` merged in.
    pub user: Map<String, JsonValue>,
    pub message: String,
}

/// Turns a username/password pair into a policy-checked local user.
///
/// Stages run strictly in order and the first failure ends the attempt:
/// verify credentials, resolve (or create) the local identity, record the attempt, fetch ban and
/// admin status concurrently, apply site policy. Clearing the attempt counter is then started in the
/// background and never delays or fails the decision, so `authenticate` must run inside a tokio
/// runtime.
pub struct AuthPipeline<F: ConnectionFactory> {
    verifier: CredentialVerifier<F>,
    identities: Arc<dyn IdentityStore>,
    attempts: Arc<dyn AttemptStore>,
    site: Arc<dyn SiteConfig>,
}

impl<F: ConnectionFactory> AuthPipeline<F> {
    pub fn new(
        verifier: CredentialVerifier<F>,
        identities: Arc<dyn IdentityStore>,
        attempts: Arc<dyn AttemptStore>,
        site: Arc<dyn SiteConfig>,
    ) -> Self {
        Self {
            verifier,
            identities,
            attempts,
            site,
        }
    }

    /// Run one authentication attempt.
    ///
    /// # Errors
    ///
    /// Rejections (`NoSuchUser`, `LocalLoginDisabled`, `UserBanned`) report
    /// [`AuthError::is_rejection`]; everything else is an infrastructure failure propagated from
    /// the pool, the query executor or a store.
    pub async fn authenticate(&self, request: &LoginRequest) -> Result<AuthDecision, AuthError> {
        let result = self.run(request).await;
        match &result {
            Ok(decision) => {
                tracing::info!(uid = %decision.uid, username = %request.username, "authentication succeeded");
            }
            Err(err) if err.is_rejection() => {
                tracing::info!(username = %request.username, reason = %err, "authentication rejected");
            }
            Err(err) => {
                tracing::error!(username = %request.username, error = %err, "authentication failed");
            }
        }
        result
    }

    async fn run(&self, request: &LoginRequest) -> Result<AuthDecision, AuthError> {
        let account = self
            .verifier
            .verify(&request.username, &request.password)
            .await?
            .ok_or(AuthError::NoSuchUser)?;

        let uid = self.resolve_uid(&account).await?;

        self.attempts
            .log_attempt(uid, request.source_address)
            .await
            .map_err(AuthError::Recorder)?;

        let (mut user, is_admin) = self.fetch_status(uid).await?;
        user.insert("uid".to_string(), JsonValue::from(uid.0));
        user.insert("isAdmin".to_string(), JsonValue::Bool(is_admin));

        policy::enforce(PolicyInput {
            is_admin,
            local_login_enabled: policy::local_login_enabled(
                self.site.setting(ALLOW_LOCAL_LOGIN).as_ref(),
            ),
            banned: policy::is_banned(user.get(BANNED_FIELD)),
        })?;

        self.clear_attempts(uid);

        Ok(AuthDecision {
            uid,
            user,
            message: AUTH_SUCCESS_MESSAGE.to_string(),
        })
    }

    async fn resolve_uid(&self, account: &AccountRecord) -> Result<Uid, AuthError> {
        let existing = self
            .identities
            .uid_by_username(&account.account_name)
            .await
            .map_err(AuthError::Identity)?;

        let uid = match existing {
            Some(uid) => Some(uid),
            None => {
                let created = self
                    .identities
                    .create_identity(NewIdentity {
                        username: account.account_name.clone(),
                        email: account.email.clone(),
                    })
                    .await
                    .map_err(AuthError::Identity)?;
                if let Some(uid) = created {
                    tracing::info!(%uid, account = %account.account_name, "created local identity");
                }
                created
            }
        };

        uid.ok_or(AuthError::NoSuchUser)
    }

    async fn fetch_status(&self, uid: Uid) -> Result<(Map<String, JsonValue>, bool), AuthError> {
        let key = uid.profile_key();
        let banned = async {
            self.identities
                .get_fields(&key, &[BANNED_FIELD])
                .await
                .map_err(|source| AuthError::StatusFetch {
                    field: StatusField::Banned,
                    source,
                })
        };
        let admin = async {
            self.identities
                .is_administrator(uid)
                .await
                .map_err(|source| AuthError::StatusFetch {
                    field: StatusField::Admin,
                    source,
                })
        };
        tokio::try_join!(banned, admin)
    }

    // Detached: the decision is returned without waiting on the attempt store.
    fn clear_attempts(&self, uid: Uid) {
        let attempts = Arc::clone(&self.attempts);
        tokio::spawn(async move {
            if let Err(err) = attempts.clear_attempts(uid).await {
                tracing::warn!(%uid, error = %err, "failed to clear login attempts");
            }
        });
    }
}
