//! User identity as resolved by the identity provider.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Authenticated user, immutable from this service's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
    /// Display name (`user_metadata.full_name`)
    pub full_name: String,
}

/// Session tokens issued by the identity provider.
///
/// Both are `None` after a sign-up that still awaits email confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Result of a successful sign-up or sign-in.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthSession {
    pub user: UserIdentity,
    pub session: Session,
}
