//! Multipart form collection for the create/update endpoints.

use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use super::error::ApiError;

/// A parsed multipart form: text fields by name, plus at most one image
/// file from the `image`/`photo` field.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Drain the multipart stream. File parts must be images; anything else
/// is rejected before a byte is stored.
pub async fn collect_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request("malformed multipart body", Some(err.to_string())))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if matches!(name.as_str(), "image" | "photo") && field.file_name().is_some() {
            let is_image = field
                .content_type()
                .is_some_and(|mime| mime.starts_with("image/"));
            if !is_image {
                return Err(ApiError::upload("only image uploads are accepted"));
            }

            let file_name = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "upload".to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::upload(format!("upload stream failed: {err}")))?;
            if !bytes.is_empty() {
                form.file = Some(UploadedFile { file_name, bytes });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|err| ApiError::bad_request("malformed form field", Some(err.to_string())))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
