//! Forward-only row cursors.
//!
//! A [`RowCursor`] is a lazily produced, finite, non-restartable sequence of rows held
//! open against a store. Consumers pull one row at a time, so a cursor never produces
//! more than the consumer asked for. [`StreamCursor`] adapts any `futures` stream of
//! rows, which is how both bundled backends expose their results.

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};

use crate::{document::Row, error::StoreResult};

/// A pull-based handle to a lazily produced row sequence.
#[async_trait]
pub trait RowCursor: Send {
    /// Pulls the next row. `None` means the sequence is exhausted or the cursor closed.
    async fn next_row(&mut self) -> Option<StoreResult<Row>>;

    /// Releases the cursor. Closing twice is a no-op; after closing,
    /// [`next_row`](RowCursor::next_row) yields `None`.
    async fn close(&mut self) -> StoreResult<()>;
}

/// An owned, type-erased cursor as returned by backends.
pub type BoxCursor = Box<dyn RowCursor>;

#[async_trait]
impl<C> RowCursor for Box<C>
where
    C: RowCursor + ?Sized,
{
    async fn next_row(&mut self) -> Option<StoreResult<Row>> {
        (**self).next_row().await
    }

    async fn close(&mut self) -> StoreResult<()> {
        (**self).close().await
    }
}

/// Cursor over a boxed stream of rows. Closing drops the stream.
pub struct StreamCursor {
    stream: Option<BoxStream<'static, StoreResult<Row>>>,
}

impl StreamCursor {
    pub fn new(stream: BoxStream<'static, StoreResult<Row>>) -> Self {
        Self { stream: Some(stream) }
    }

    /// A cursor over rows already in memory.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(futures::stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl std::fmt::Debug for StreamCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCursor")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl RowCursor for StreamCursor {
    async fn next_row(&mut self) -> Option<StoreResult<Row>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    async fn close(&mut self) -> StoreResult<()> {
        self.stream = None;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn yields_rows_then_none() {
        let mut cursor = StreamCursor::from_rows(vec![doc! { "n": 1 }, doc! { "n": 2 }]);

        assert_eq!(cursor.next_row().await.unwrap().unwrap(), doc! { "n": 1 });
        assert_eq!(cursor.next_row().await.unwrap().unwrap(), doc! { "n": 2 });
        assert!(cursor.next_row().await.is_none());
    }

    #[tokio::test]
    async fn closed_cursor_yields_nothing() {
        let mut cursor: BoxCursor = Box::new(StreamCursor::from_rows(vec![doc! { "n": 1 }]));

        cursor.close().await.unwrap();
        cursor.close().await.unwrap();

        assert!(cursor.next_row().await.is_none());
    }
}
