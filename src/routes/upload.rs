// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multipart image form parsing for the analyze routes.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::{AppError, Result};

/// Form field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// An uploaded image plus any text fields sent with it.
#[derive(Debug)]
pub struct ImageForm {
    pub image: Bytes,
    pub filename: Option<String>,
    pub fields: HashMap<String, String>,
}

impl ImageForm {
    /// Client-supplied filename, empty when none was sent.
    pub fn filename_or_default(&self) -> String {
        self.filename.clone().unwrap_or_default()
    }
}

/// Read the whole form. The image must be present and non-empty.
pub async fn read_image_form(mut multipart: Multipart) -> Result<ImageForm> {
    let mut image = None;
    let mut filename = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == IMAGE_FIELD {
            filename = field.file_name().map(str::to_string);
            image = Some(field.bytes().await?);
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    let image = image.ok_or_else(|| {
        AppError::Validation(format!("Missing required form field: {}", IMAGE_FIELD))
    })?;
    if image.is_empty() {
        return Err(AppError::BadRequest("Empty image file".to_string()));
    }

    tracing::debug!(
        bytes = image.len(),
        filename = filename.as_deref().unwrap_or(""),
        "Image received"
    );

    Ok(ImageForm {
        image,
        filename,
        fields,
    })
}
