//! Route handlers grouped by resource.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod health;
pub mod metrics;
pub mod orders;

use serde::Deserialize;
use store::PageRequest;

/// Common pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(1), self.per_page.unwrap_or(20))
    }
}
