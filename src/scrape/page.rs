//! Pages and paginated sources

use futures::future::BoxFuture;

/// One batch of items returned by a single fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque cursor for the next fetch; `None` once the source is exhausted
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// A page that is followed by more data
    pub fn more(items: Vec<T>, next: impl Into<String>) -> Self {
        Self {
            items,
            next: Some(next.into()),
        }
    }

    /// The final page of a traversal
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// A server-paginated listing of one resource kind.
///
/// Sources are stateless between calls: the caller owns the continuation
/// token and passes it back in, `None` meaning "first page". Implementations
/// must be shareable across tasks.
pub trait PageSource<T>: Send + Sync {
    fn fetch<'a>(&'a self, continuation: Option<&'a str>) -> BoxFuture<'a, anyhow::Result<Page<T>>>;
}
