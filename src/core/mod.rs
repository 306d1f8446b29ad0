//! Core services for the rental listings API

pub mod auth;
pub mod config;
pub mod db;
pub mod graphql;
pub mod listings;
pub mod mailer;
pub mod server;
pub mod storage;
pub mod validation;
