//! Client for the backend gateway admin API.

mod client;

pub use client::{AdminClient, CacheStats, SdkError, SystemStatus};
