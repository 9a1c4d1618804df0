use serde::{Deserialize, Serialize};

use crate::application::pagination::{DEFAULT_PAGE_LIMIT, PageRequest};
use crate::application::repos::SortSpec;
use crate::domain::types::{SortField, SortOrder};

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    /// Email address or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub new_password: String,
}

/// Query parameters shared by every list endpoint. Sorting deserializes
/// through the allow-list; unknown fields are rejected outright.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<SortField>,
    pub order: Option<SortOrder>,
}

impl ListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        )
    }

    pub fn sort(&self) -> SortSpec {
        SortSpec {
            field: self.sort_by.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
        }
    }
}
