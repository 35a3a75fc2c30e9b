//! Common types used across the API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pagination parameters as received from a query string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    /// Normalize page to at least 1 and per_page into `1..=max_per_page`
    pub fn clamped(&self, max_per_page: u32) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, max_per_page.max(1)),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: &Pagination, total_items: u64) -> Self {
        let per_page = u64::from(pagination.per_page.max(1));
        let total_pages = u32::try_from(total_items.div_ceil(per_page)).unwrap_or(u32::MAX);
        Self {
            data,
            pagination: PaginationMeta {
                page: pagination.page,
                per_page: pagination.per_page,
                total_items,
                total_pages,
            },
        }
    }
}

/// Optional inclusive date bounds for list filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn validate(&self) -> Result<(), &'static str> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err("start date must not be after end date"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_capped() {
        let p = Pagination {
            page: 0,
            per_page: 500,
        }
        .clamped(100);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 100);
        assert_eq!(p.offset(), 0);

        let p = Pagination {
            page: 3,
            per_page: 20,
        };
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn total_pages_rounds_up() {
        let response = PaginatedResponse::new(vec![1, 2], &Pagination::default(), 41);
        assert_eq!(response.pagination.total_pages, 3);
        let empty: PaginatedResponse<u8> = PaginatedResponse::new(vec![], &Pagination::default(), 0);
        assert_eq!(empty.pagination.total_pages, 0);
    }

    #[test]
    fn date_range_order() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2024, 2, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 1),
        };
        assert!(range.validate().is_err());
        assert!(DateRange::default().validate().is_ok());
    }
}
