//! Realtors - Property Rental Listings API
//!
//! A GraphQL service where property managers list properties and units,
//! and tenants sign up, sign in and occupy units.

pub mod core;
