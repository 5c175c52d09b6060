//! azscrape
//!
//! Inventories an Azure subscription by walking the paginated Azure Resource
//! Manager list endpoints concurrently and handing every record to a sink.
//!
//! # Module Structure
//!
//! - [`azure`] - ARM credentials, HTTP client and the paginated list binding
//! - [`scrape`] - the generic paginator, the per-kind listers and the
//!   concurrent [`Scrapper`](scrape::Scrapper)
//! - [`sink`] - where discovered records go (stdout or memory)
//! - [`server`] - HTTP trigger running one scrape per request
//! - [`config`] - persistent and environment configuration

pub mod azure;
pub mod config;
pub mod scrape;
pub mod server;
pub mod sink;

/// Version injected at compile time via AZSCRAPE_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("AZSCRAPE_VERSION") {
    Some(v) => v,
    None => "dev",
};
