//! Pressroom: a blog content API with batched impression counting,
//! de-duplicated view tracking and a TTL read cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod counters;
pub mod domain;
pub mod infra;
