//! Resource scraping
//!
//! # Architecture
//!
//! - [`page`] - pages and the [`PageSource`] abstraction over paginated listings
//! - [`paginator`] - walks one source to exhaustion, item by item
//! - [`options`] - one swappable client factory per resource kind
//! - [`scrapper`] - per-kind listers and the concurrent top-level run
//! - [`memory`] - in-memory sources for substituting the ARM backend
//!
//! # Example
//!
//! ```ignore
//! use azscrape::scrape::{Scrapper, ScrapperOptions};
//! use azscrape::sink::JsonLinesSink;
//! use std::sync::Arc;
//!
//! async fn scrape(credential: Arc<dyn azscrape::azure::auth::TokenCredential>) -> anyhow::Result<()> {
//!     let scrapper = Scrapper::new(credential, "my-subscription", ScrapperOptions::default())?;
//!     scrapper.run(Arc::new(JsonLinesSink::stdout())).await?;
//!     Ok(())
//! }
//! ```

mod context;
mod error;
pub mod memory;
mod model;
pub mod options;
mod page;
mod paginator;
mod scrapper;

pub use context::{ScrapeContext, DEFAULT_RUN_TIMEOUT};
pub use error::ScrapeError;
pub use model::*;
pub use options::{NodePoolSource, ScrapperOptions};
pub use page::{Page, PageSource};
pub use paginator::paginate;
pub use scrapper::Scrapper;
