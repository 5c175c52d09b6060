//! In-memory page sources
//!
//! Deterministic stand-ins for the ARM backend, meant to be plugged in
//! through the factory overrides of [`ScrapperOptions`](super::ScrapperOptions).

use super::page::{Page, PageSource};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const TOKEN_PREFIX: &str = "page-";

/// Serves a fixed list of pages, optionally failing one of them
#[derive(Debug)]
pub struct StaticPages<T> {
    pages: Vec<Vec<T>>,
    failing_at: Option<usize>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl<T> StaticPages<T> {
    pub fn new(pages: Vec<Vec<T>>) -> Self {
        Self {
            pages,
            failing_at: None,
            delay: None,
            fetches: AtomicUsize::new(0),
        }
    }

    /// A single page holding `items`
    pub fn single(items: Vec<T>) -> Self {
        Self::new(vec![items])
    }

    /// Fail the fetch of the page at `index` (zero based)
    pub fn failing_at(mut self, index: usize) -> Self {
        self.failing_at = Some(index);
        self
    }

    /// Sleep before answering every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches issued so far, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

fn page_index(continuation: Option<&str>) -> anyhow::Result<usize> {
    let Some(token) = continuation else {
        return Ok(0);
    };
    token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("unknown continuation token: {}", token))
}

impl<T> PageSource<T> for StaticPages<T>
where
    T: Clone + Send + Sync,
{
    fn fetch<'a>(&'a self, continuation: Option<&'a str>) -> BoxFuture<'a, anyhow::Result<Page<T>>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let index = page_index(continuation)?;
            if self.failing_at == Some(index) {
                anyhow::bail!("failed to iterate page {}", index);
            }

            let items = self.pages.get(index).cloned().unwrap_or_default();
            if index + 1 < self.pages.len() {
                Ok(Page::more(items, format!("{}{}", TOKEN_PREFIX, index + 1)))
            } else {
                Ok(Page::last(items))
            }
        })
    }
}

/// Claims more data forever but fails every fetch
#[derive(Debug, Default)]
pub struct AlwaysFailing {
    fetches: AtomicUsize,
}

impl AlwaysFailing {
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl<T> PageSource<T> for AlwaysFailing
where
    T: Send,
{
    fn fetch<'a>(&'a self, _continuation: Option<&'a str>) -> BoxFuture<'a, anyhow::Result<Page<T>>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("failed to iterate"))
        })
    }
}
