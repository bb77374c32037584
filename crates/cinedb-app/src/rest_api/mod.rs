pub mod director;
pub mod genre;
pub mod movie;

use cinedb_dal::Batch;
use serde::Serialize;

/// Wrapper of every successful JSON payload.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    status: &'static str,
    data: T,
}

impl<T> SuccessResponse<T>
where
    T: Serialize,
{
    pub fn new(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// One page of a listing. Pages are 1-indexed, `pages` is zero when
/// nothing matched.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    page: u32,
    page_size: u32,
    total_items: u64,
    pages: u32,
    items: Vec<T>,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn from_batch(batch: Batch<T>, page: u32, page_size: u32) -> Self {
        let pages = if batch.total > 0 {
            ((batch.total + page_size as u64 - 1) / page_size as u64) as u32
        } else {
            0
        };
        Self {
            page,
            page_size,
            total_items: batch.total,
            pages,
            items: batch.rows,
        }
    }
}
