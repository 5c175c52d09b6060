//! Azure Resource Manager interaction module
//!
//! This module provides the production backend for the scrapper: credentials,
//! the HTTP client, and the paginated ARM list binding.
//!
//! # Module Structure
//!
//! - [`auth`] - bearer tokens from a static token, a service principal or a managed identity
//! - [`client`] - subscription-scoped ARM client and list URL builders
//! - [`http`] - HTTP utilities for REST API calls
//! - [`pager`] - `nextLink` pagination as a [`PageSource`](crate::scrape::PageSource)
//!
//! # Example
//!
//! ```ignore
//! use azscrape::azure::{auth, client::{ArmClient, ClientOptions}, http::ArmHttpClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let http = ArmHttpClient::new(std::time::Duration::from_secs(30))?;
//!     let credential = auth::default_credential(&http)?;
//!     let client = ArmClient::new("my-subscription", credential, &ClientOptions::default())?;
//!     let groups: serde_json::Value = client.get_json(&client.resource_groups_url()?).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod pager;
