//! Property listings
//!
//! Business rules for properties, units and who may occupy them.

pub mod service;

pub use service::{
    ListingError, ListingService, ListingStats, NewProperty, NewUnit, PropertyChanges,
};
