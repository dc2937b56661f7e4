// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider: credential pass-through and token resolution.
//!
//! No passwords are handled or stored here. Supabase GoTrue does the work;
//! when the project JWT secret is configured, access tokens are verified
//! locally instead of with a round trip to `/auth/v1/user`.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{AuthSession, Session, UserIdentity};

/// Audience Supabase puts on user access tokens.
pub const SUPABASE_AUDIENCE: &str = "authenticated";

/// Identity provider failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// Token unknown, malformed or expired.
    #[error("Invalid or expired token")]
    InvalidToken,
    /// Provider refused the operation (bad credentials, duplicate user).
    #[error("{0}")]
    Rejected(String),
    /// Provider unreachable or answered with something unexpected.
    #[error("{0}")]
    Provider(String),
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthSession, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Resolve a bearer token to the user it was issued for.
    async fn get_user(&self, access_token: &str) -> Result<UserIdentity, AuthError>;
}

/// User object as returned by GoTrue.
#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
}

impl From<GoTrueUser> for UserIdentity {
    fn from(user: GoTrueUser) -> Self {
        UserIdentity {
            id: user.id,
            email: user.email,
            full_name: user.user_metadata.full_name.unwrap_or_default(),
        }
    }
}

/// Claims carried by a Supabase access token.
#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

/// GoTrue client.
pub struct SupabaseAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    jwt_key: Option<DecodingKey>,
}

impl SupabaseAuth {
    pub fn new(supabase_url: &str, anon_key: &str, jwt_secret: Option<&[u8]>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            jwt_key: jwt_secret.map(DecodingKey::from_secret),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json(&self, response: reqwest::Response) -> Result<Value, AuthError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = gotrue_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
            if status.is_client_error() {
                return Err(AuthError::Rejected(message));
            }
            return Err(AuthError::Provider(message));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("Invalid auth response: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthSession, AuthError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });

        let response = self
            .post("signup")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Auth service unreachable: {}", e)))?;

        let value = self.check_response_json(response).await?;
        let session = parse_auth_response(value)?;
        tracing::info!(user_id = %session.user.id, "User signed up");
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .post("token")
            .query(&[("grant_type", "password")])
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Auth service unreachable: {}", e)))?;

        let value = self.check_response_json(response).await?;
        parse_auth_response(value)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .post("logout")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Auth service unreachable: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Rejected(
            gotrue_message(&body).unwrap_or_else(|| format!("HTTP {}", status)),
        ))
    }

    async fn get_user(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        if let Some(key) = &self.jwt_key {
            return verify_access_token(access_token, key);
        }

        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Auth service unreachable: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidToken);
        }

        let value = self.check_response_json(response).await?;
        let user: GoTrueUser = serde_json::from_value(value)
            .map_err(|e| AuthError::Provider(format!("Invalid user response: {}", e)))?;
        Ok(user.into())
    }
}

/// Verify an HS256 Supabase access token with the project secret.
pub fn verify_access_token(token: &str, key: &DecodingKey) -> Result<UserIdentity, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[SUPABASE_AUDIENCE]);

    let data = decode::<SupabaseClaims>(token, key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AuthError::InvalidToken
    })?;

    Ok(UserIdentity {
        id: data.claims.sub,
        email: data.claims.email,
        full_name: data.claims.user_metadata.full_name.unwrap_or_default(),
    })
}

/// Token grants carry `{access_token, refresh_token, user}`; a sign-up
/// awaiting email confirmation returns the bare user object instead.
fn parse_auth_response(value: Value) -> Result<AuthSession, AuthError> {
    let session = Session {
        access_token: value
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string),
        refresh_token: value
            .get("refresh_token")
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    let user_value = match value.get("user") {
        Some(user) => user.clone(),
        None => value,
    };
    let user: GoTrueUser = serde_json::from_value(user_value)
        .map_err(|e| AuthError::Provider(format!("Invalid auth response: {}", e)))?;

    Ok(AuthSession {
        user: user.into(),
        session,
    })
}

/// GoTrue reports errors under one of several keys depending on endpoint.
fn gotrue_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

struct MemoryAccount {
    id: String,
    password: String,
    full_name: String,
}

/// In-memory identity provider for tests and offline runs.
///
/// Tokens are opaque random strings; signing out revokes them.
#[derive(Default)]
pub struct MemoryIdentity {
    accounts: DashMap<String, MemoryAccount>,
    tokens: DashMap<String, UserIdentity>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&self, user: UserIdentity) -> AuthSession {
        let access_token = format!("mem-{}", Uuid::new_v4());
        self.tokens.insert(access_token.clone(), user.clone());
        AuthSession {
            user,
            session: Session {
                access_token: Some(access_token),
                refresh_token: Some(Uuid::new_v4().to_string()),
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = email.to_lowercase();
        let user = match self.accounts.entry(email.clone()) {
            Entry::Occupied(_) => {
                return Err(AuthError::Rejected("User already registered".to_string()));
            }
            Entry::Vacant(slot) => {
                let account = slot.insert(MemoryAccount {
                    id: Uuid::new_v4().to_string(),
                    password: password.to_string(),
                    full_name: full_name.to_string(),
                });
                UserIdentity {
                    id: account.id.clone(),
                    email: Some(email),
                    full_name: account.full_name.clone(),
                }
            }
        };
        Ok(self.issue(user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = email.to_lowercase();
        let user = match self.accounts.get(&email) {
            Some(account) if account.password == password => UserIdentity {
                id: account.id.clone(),
                email: Some(email.clone()),
                full_name: account.full_name.clone(),
            },
            _ => return Err(AuthError::Rejected("Invalid login credentials".to_string())),
        };
        Ok(self.issue(user))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.tokens
            .remove(access_token)
            .map(|_| ())
            .ok_or(AuthError::InvalidToken)
    }

    async fn get_user(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        self.tokens
            .get(access_token)
            .map(|user| user.clone())
            .ok_or(AuthError::InvalidToken)
    }
}
