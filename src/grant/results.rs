// Scrollable result sets following `@next` links

use super::types::ResultPage;
use crate::errors::Result;
use crate::http::{get_json, HttpHandler};
use futures::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Arc;

/// A page of results with the means to fetch the pages after it
pub struct ResultSet<T> {
    handler: Arc<dyn HttpHandler>,
    page: ResultPage<T>,
}

impl<T: DeserializeOwned + Send + 'static> ResultSet<T> {
    pub(crate) fn new(handler: Arc<dyn HttpHandler>, page: ResultPage<T>) -> Self {
        Self { handler, page }
    }

    /// Rows of the current page
    pub fn rows(&self) -> &[T] {
        &self.page.rows
    }

    pub fn has_next(&self) -> bool {
        self.page.next.is_some()
    }

    /// Query string of the next page, usable to resume scrolling later
    pub fn cursor(&self) -> Option<&str> {
        self.page.next.as_ref().and_then(|next| next.query())
    }

    /// Replace the current page with the next one; false once exhausted
    pub async fn load_more(&mut self) -> Result<bool> {
        let Some(next) = self.page.next.clone() else {
            return Ok(false);
        };
        self.page = get_json(self.handler.as_ref(), next)
            .await?
            .unwrap_or_default();
        Ok(true)
    }

    /// Every row from the current page onwards, fetching further pages on demand
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send {
        let state = (self.handler, VecDeque::from(self.page.rows), self.page.next);

        stream::try_unfold(state, |(handler, mut rows, mut next)| async move {
            loop {
                if let Some(row) = rows.pop_front() {
                    return Ok(Some((row, (handler, rows, next))));
                }
                let Some(url) = next.take() else {
                    return Ok(None);
                };
                let page: ResultPage<T> = get_json(handler.as_ref(), url)
                    .await?
                    .unwrap_or_default();
                rows.extend(page.rows);
                next = page.next;
            }
        })
    }

    /// Collect every remaining row across pages
    pub async fn collect_all(self) -> Result<Vec<T>> {
        self.into_stream().try_collect().await
    }
}
