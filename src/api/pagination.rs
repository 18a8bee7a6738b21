//! Response envelope and pagination helpers
//!
//! Every endpoint, success or failure, answers with the same envelope:
//! `{ statusCode, data, message, success }`. Failures are produced by the
//! error type; this module covers the success side plus the uniform
//! pagination wrapper.

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 50;

/// Success envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 envelope.
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status_code: StatusCode::OK.as_u16(),
            data,
            message: message.into(),
            success: true,
        })
    }

    /// 201 envelope with matching HTTP status.
    pub fn created(data: T, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::CREATED,
            Json(Self {
                status_code: StatusCode::CREATED.as_u16(),
                data,
                message: message.into(),
                success: true,
            }),
        )
    }
}

/// Query parameters accepted by every paginated listing.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Clamp to sane bounds: page >= 1, 1 <= limit <= MAX_PAGE_LIMIT.
    pub fn clamp(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        let offset = (page - 1) * limit;
        (page, limit, offset)
    }
}

/// Uniform pagination wrapper.
///
/// A page past the end carries an empty item list with
/// `has_next_page = false`; it is never an error.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: i64, current_page: i64, limit: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + limit - 1) / limit
        };

        Self {
            has_next_page: current_page < total_pages,
            items,
            total_items,
            current_page,
            total_pages,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_clamped() {
        let params = PageParams {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(params.clamp(), (1, MAX_PAGE_LIMIT, 0));

        let params = PageParams {
            page: Some(-3),
            limit: Some(0),
        };
        assert_eq!(params.clamp(), (1, 1, 0));

        let params = PageParams::default();
        assert_eq!(params.clamp(), (1, DEFAULT_PAGE_LIMIT, 0));

        let params = PageParams {
            page: Some(3),
            limit: Some(20),
        };
        assert_eq!(params.clamp(), (3, 20, 40));
    }

    #[test]
    fn page_math() {
        let page = Page::new(vec![1, 2, 3], 7, 1, 3);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next_page);

        let page = Page::new(vec![7], 7, 3, 3);
        assert!(!page.has_next_page);

        // Past the end: empty, not an error
        let page: Page<i32> = Page::new(vec![], 7, 9, 3);
        assert!(page.items.is_empty());
        assert!(!page.has_next_page);

        let page: Page<i32> = Page::new(vec![], 0, 1, 10);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next_page);
    }
}
