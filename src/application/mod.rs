//! Application services layer.

pub mod analytics;
pub mod categories;
pub mod error;
pub mod jobs;
pub mod listing;
pub mod pagination;
pub mod posts;
pub mod repos;
