//! ARM list pagination
//!
//! ARM list operations answer `{"value": [...], "nextLink": "..."}`; the
//! `nextLink` URL is the continuation token.

use super::client::ArmClient;
use crate::scrape::{Page, PageSource};
use anyhow::Result;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::marker::PhantomData;

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ListResponse<T> {
    #[serde(default)]
    value: Vec<T>,
    #[serde(default, rename = "nextLink")]
    next_link: Option<String>,
}

/// Paginated ARM list operation for items of type `T`
pub struct ArmPager<T> {
    client: ArmClient,
    first_page_url: String,
    _item: PhantomData<fn() -> T>,
}

impl<T> ArmPager<T> {
    pub fn new(client: ArmClient, first_page_url: String) -> Self {
        Self {
            client,
            first_page_url,
            _item: PhantomData,
        }
    }
}

impl<T> ArmPager<T>
where
    T: DeserializeOwned + Send,
{
    async fn fetch_page(&self, continuation: Option<&str>) -> Result<Page<T>> {
        let url = match continuation {
            Some(next_link) => {
                self.client.validate_next_link(next_link)?;
                next_link
            },
            None => self.first_page_url.as_str(),
        };

        let response: ListResponse<T> = self.client.get_json(url).await?;
        let next = response.next_link.filter(|link| !link.is_empty());

        Ok(Page {
            items: response.value,
            next,
        })
    }
}

impl<T> PageSource<T> for ArmPager<T>
where
    T: DeserializeOwned + Send,
{
    fn fetch<'a>(&'a self, continuation: Option<&'a str>) -> BoxFuture<'a, Result<Page<T>>> {
        Box::pin(self.fetch_page(continuation))
    }
}
