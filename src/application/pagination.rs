//! Page-number pagination shared by list endpoints.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page numbers start at 1")]
    ZeroPage,
    #[error("page {page} is beyond the supported range")]
    OutOfRange { page: u32 },
}

/// A 1-based page of `page_size` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Result<Self, PaginationError> {
        if page == 0 {
            return Err(PaginationError::ZeroPage);
        }
        let request = Self {
            page,
            page_size: page_size.max(1),
        };
        i64::try_from(u64::from(page - 1) * u64::from(request.page_size))
            .map_err(|_| PaginationError::OutOfRange { page })?;
        Ok(request)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}
