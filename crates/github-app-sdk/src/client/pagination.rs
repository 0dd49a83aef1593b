//! Link-header pagination support.
//!
//! GitHub paginates list endpoints and reports navigation URLs in the
//! `Link` response header:
//!
//! `<https://api.github.com/resource?page=2>; rel="next", <https://api.github.com/resource?page=5>; rel="last"`

use serde::{Deserialize, Serialize};

/// Pagination metadata extracted from a `Link` header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    /// URL for the next page (if any)
    pub next: Option<String>,

    /// URL for the previous page (if any)
    pub prev: Option<String>,

    /// URL for the last page (if any)
    pub last: Option<String>,
}

impl Pagination {
    /// Check if there are more pages available.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Page number of the next page, parsed from its URL.
    pub fn next_page(&self) -> Option<u32> {
        self.next.as_deref().and_then(extract_page_number)
    }
}

/// Parse pagination metadata from a `Link` header value.
pub fn parse_link_header(link_header: Option<&str>) -> Pagination {
    let mut pagination = Pagination::default();

    if let Some(header) = link_header {
        for link in header.split(',') {
            let parts: Vec<&str> = link.split(';').collect();
            if parts.len() != 2 {
                continue;
            }

            let url = parts[0]
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>');
            let rel = parts[1]
                .trim()
                .trim_start_matches("rel=\"")
                .trim_end_matches('"');

            match rel {
                "next" => pagination.next = Some(url.to_string()),
                "prev" => pagination.prev = Some(url.to_string()),
                "last" => pagination.last = Some(url.to_string()),
                _ => {}
            }
        }
    }

    pagination
}

fn extract_page_number(url: &str) -> Option<u32> {
    url.split('?').nth(1).and_then(|query| {
        query.split('&').find_map(|param| {
            let mut parts = param.split('=');
            let key = parts.next()?;
            let value = parts.next()?;
            if key == "page" {
                value.parse::<u32>().ok()
            } else {
                None
            }
        })
    })
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
