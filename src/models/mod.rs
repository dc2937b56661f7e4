// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod analysis;
pub mod record;
pub mod user;

pub use analysis::{
    CaptionFields, ClipFields, DigitFields, PneumoniaFields, VisionAnalysis, VisionFields,
};
pub use record::{HealthRecord, RecordFields};
pub use user::{AuthSession, Session, UserIdentity};

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A persisted, owner-scoped row: server-assigned columns plus the
/// feature-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct StoredRow<F> {
    /// Server-assigned id
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    /// Owner (identity provider user id)
    pub user_id: String,
    /// Insert timestamp (RFC3339)
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub fields: F,
}
