//! External game catalog integration
//!
//! Wraps the IGDB v4 API behind the [`CatalogProvider`] trait.

mod client;
mod token;

pub use client::{CatalogGame, CatalogProvider, CatalogSearchResult, IgdbClient};
pub use token::{FreshToken, TokenCache};

#[cfg(test)]
pub use client::MockCatalogProvider;
