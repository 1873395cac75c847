//! Multipart form parsing for endpoints that accept files.

use std::collections::HashMap;

use axum::extract::Multipart;

use super::error::ApiError;
use crate::media::{MediaFile, ResourceKind};

/// Text fields and files from a multipart body.
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, MediaFile>,
}

impl UploadForm {
    /// Read the whole body. Parts named in `file_fields` are kept as files of
    /// the given kind, everything else as text. Empty files are dropped.
    pub async fn read(
        multipart: &mut Multipart,
        file_fields: &[(&str, ResourceKind)],
    ) -> Result<Self, ApiError> {
        let mut fields = HashMap::new();
        let mut files = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| ApiError::bad_request("Invalid multipart data"))?
        {
            let name = field.name().unwrap_or("").to_string();

            if let Some((_, kind)) = file_fields.iter().find(|(n, _)| *n == name) {
                let file_name = field.file_name().unwrap_or(&name).to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request(format!("Failed to read {}", name)))?;
                if bytes.is_empty() {
                    continue;
                }
                files.insert(
                    name,
                    MediaFile {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                        kind: *kind,
                    },
                );
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request(format!("Failed to read {}", name)))?;
                fields.insert(name, text);
            }
        }

        Ok(Self { fields, files })
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<MediaFile> {
        self.files.remove(name)
    }
}
