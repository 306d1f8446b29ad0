//! GraphQL API
//!
//! Queries and mutations for accounts and listings. Every fallible resolver
//! returns a result union whose error member is [`errors::ApplicationErrors`].

pub mod context;
pub mod errors;
pub mod guard;
pub mod property;
#[cfg(test)]
pub(crate) mod tests;
pub mod types;
pub mod upload;
pub mod user;

use async_graphql::{EmptySubscription, MergedObject, Schema};

pub use context::{Viewer, bearer_token};
pub use errors::ApplicationErrors;
pub use property::{PropertyMutation, PropertyQuery};
pub use user::{UserMutation, UserQuery};

use crate::core::auth::AuthService;
use crate::core::config::Environment;
use crate::core::listings::ListingService;

#[derive(MergedObject, Default)]
pub struct QueryRoot(UserQuery, PropertyQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(UserMutation, PropertyMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema with services attached as shared data
pub fn build_schema(
    auth: AuthService,
    listings: ListingService,
    environment: Environment,
) -> AppSchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(auth)
        .data(listings)
        .data(environment)
        .extension(async_graphql::extensions::Tracing)
        .finish()
}
