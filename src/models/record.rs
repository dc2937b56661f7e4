// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Health record model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::db::{tables, MutableRow, OwnedRow};
use crate::models::StoredRow;

/// User-editable fields of a health record (create and update body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecordFields {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 10000, message = "description is too long"))]
    pub description: String,
    #[validate(length(min = 1, max = 100, message = "category must be 1-100 characters"))]
    pub category: String,
    /// Record date as entered by the user (ISO 8601 date expected)
    #[validate(length(min = 1, max = 40, message = "date is required"))]
    pub date: String,
}

/// Stored health record.
pub type HealthRecord = StoredRow<RecordFields>;

impl OwnedRow for RecordFields {
    const TABLE: &'static str = tables::HEALTH_RECORDS;
    const ORDER_BY: &'static str = "date";
    const LABEL: &'static str = "Health record";
}

impl MutableRow for RecordFields {}
