//! All Ears: music-rating service.
//!
//! Handlers validate the caller's token, read or write the ratings store and,
//! for listings and stats, resolve media ids against the Spotify catalog.

pub mod aggregator;
pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod spotify;

pub use aggregator::{RatingAggregator, RatingRecord, StatsResult};
pub use error::{AggregateError, AppError, CatalogError};
pub use handlers::{router, AppState};
