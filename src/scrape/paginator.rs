//! Paginator
//!
//! Walks one paginated source to exhaustion, handing every item to a handler
//! in the order the source delivered it.

use super::context::ScrapeContext;
use super::error::ScrapeError;
use super::model::ResourceKind;
use super::page::PageSource;
use std::collections::HashSet;

/// Walk `source` until it reports no more pages, calling `handler` per item.
///
/// The run context is checked before every fetch. The first failed fetch or
/// rejected item ends the traversal; nothing after it is visited.
pub async fn paginate<T, F>(
    kind: ResourceKind,
    source: &dyn PageSource<T>,
    ctx: &ScrapeContext,
    mut handler: F,
) -> Result<(), ScrapeError>
where
    F: FnMut(T) -> anyhow::Result<()>,
{
    let mut continuation: Option<String> = None;
    // Tokens already consumed; a repeat would re-fetch a visited page
    let mut visited: HashSet<String> = HashSet::new();
    let mut pages = 0usize;
    let mut delivered = 0usize;

    loop {
        ctx.check(kind)?;

        let page = source
            .fetch(continuation.as_deref())
            .await
            .map_err(|source| ScrapeError::Fetch { kind, source })?;
        pages += 1;

        tracing::debug!(
            "{} page {}: {} items, more={}",
            kind,
            pages,
            page.items.len(),
            page.has_more()
        );

        for item in page.items {
            handler(item).map_err(|source| ScrapeError::Handler { kind, source })?;
            delivered += 1;
        }

        match page.next {
            None => break,
            Some(next) if visited.contains(&next) => {
                return Err(ScrapeError::Fetch {
                    kind,
                    source: anyhow::anyhow!("continuation token did not advance after page {}", pages),
                });
            },
            Some(next) => {
                visited.insert(next.clone());
                continuation = Some(next);
            },
        }
    }

    tracing::debug!("{} exhausted: {} items over {} pages", kind, delivered, pages);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::memory::{AlwaysFailing, StaticPages};
    use crate::scrape::page::Page;
    use futures::future::BoxFuture;
    use std::time::Duration;

    const KIND: ResourceKind = ResourceKind::ResourceGroups;

    #[tokio::test]
    async fn test_delivers_every_item_in_page_order() {
        let source = StaticPages::new(vec![vec![1, 2, 3], vec![], vec![4, 5]]);
        let mut seen = Vec::new();

        let result = paginate::<i32, _>(KIND, &source, &ScrapeContext::default(), |item| {
            seen.push(item);
            Ok(())
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_handler_error_aborts_traversal() {
        let source = StaticPages::new(vec![vec![1, 2], vec![3, 4, 5], vec![6]]);
        let mut calls = 0;

        let err = paginate::<i32, _>(KIND, &source, &ScrapeContext::default(), |item: i32| {
            calls += 1;
            if item == 4 {
                anyhow::bail!("cannot store item {}", item);
            }
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(err.is_handler());
        assert!(err.to_string().contains("cannot store item 4"));
        assert_eq!(calls, 4);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_delivers_only_earlier_pages() {
        let source = StaticPages::new(vec![vec![1, 2], vec![3], vec![4]]).failing_at(2);
        let mut seen = Vec::new();

        let err = paginate::<i32, _>(KIND, &source, &ScrapeContext::default(), |item| {
            seen.push(item);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ScrapeError::Fetch { kind: KIND, .. }));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_always_failing_source_is_attempted_once() {
        let source = AlwaysFailing::default();
        let mut calls = 0;

        let err = paginate::<i32, _>(KIND, &source, &ScrapeContext::default(), |_| {
            calls += 1;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(err.is_fetch());
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_expired_deadline_skips_fetch() {
        let source = StaticPages::new(vec![vec![1]]);
        let ctx = ScrapeContext::with_timeout(Duration::ZERO);

        let err = paginate::<i32, _>(KIND, &source, &ctx, |_| Ok(())).await.unwrap_err();

        assert!(matches!(err, ScrapeError::DeadlineExceeded { kind: KIND }));
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_fetch() {
        let source = StaticPages::new(vec![vec![1]]);
        let ctx = ScrapeContext::default();
        ctx.cancel();

        let err = paginate::<i32, _>(KIND, &source, &ctx, |_| Ok(())).await.unwrap_err();

        assert!(matches!(err, ScrapeError::Cancelled { kind: KIND }));
        assert_eq!(source.fetch_count(), 0);
    }

    struct Stuck;

    impl PageSource<u8> for Stuck {
        fn fetch<'a>(
            &'a self,
            _continuation: Option<&'a str>,
        ) -> BoxFuture<'a, anyhow::Result<Page<u8>>> {
            Box::pin(async { Ok(Page::more(vec![7], "same")) })
        }
    }

    #[tokio::test]
    async fn test_non_advancing_token_fails() {
        let mut calls = 0;

        let err = paginate::<u8, _>(KIND, &Stuck, &ScrapeContext::default(), |_| {
            calls += 1;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(err.is_fetch());
        assert!(err.to_string().contains("did not advance"));
        assert_eq!(calls, 2);
    }

    /// Hands out "b" after "a" and "a" otherwise
    struct Cycle {
        fetches: std::sync::atomic::AtomicUsize,
    }

    impl PageSource<u8> for Cycle {
        fn fetch<'a>(
            &'a self,
            continuation: Option<&'a str>,
        ) -> BoxFuture<'a, anyhow::Result<Page<u8>>> {
            self.fetches.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let next = if continuation == Some("a") { "b" } else { "a" };
            Box::pin(async move { Ok(Page::more(vec![1], next)) })
        }
    }

    #[tokio::test]
    async fn test_token_cycle_fails_without_refetching() {
        let source = Cycle {
            fetches: std::sync::atomic::AtomicUsize::new(0),
        };
        let mut calls = 0;

        let err = paginate::<u8, _>(KIND, &source, &ScrapeContext::with_timeout(Duration::from_secs(5)), |_| {
            calls += 1;
            Ok(())
        })
        .await
        .unwrap_err();

        // start -> a -> b, then b points back at a
        assert!(err.is_fetch());
        assert!(!err.is_cancellation());
        assert_eq!(source.fetches.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(calls, 3);
    }
}
