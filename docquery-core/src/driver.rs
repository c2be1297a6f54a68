//! Backpressure-controlled consumption of a [`RowCursor`].
//!
//! A [`CursorDriver`] pulls one row, hands it to the caller's handler, waits for the
//! handler to settle and only then pulls the next row. At most one row is ever in
//! flight, so an unbounded cursor cannot outpace a slow consumer, and rows reach the
//! handler in exactly the order the cursor yields them.
//!
//! The first failure, whether from the handler or from the cursor itself, closes the
//! cursor and is returned unchanged. No further rows are pulled. Natural exhaustion
//! also closes the cursor.
//!
//! ```text
//! Idle ──run──▶ Streaming ──exhausted──▶ Completed
//!                   │
//!                   └──handler/cursor error──▶ Failed
//! ```
//!
//! The synchronous entry point is the awaiting one fed with already-completed futures.

use std::future::{Future, ready};

use tracing::{debug, warn};

use crate::{
    cursor::RowCursor,
    document::Row,
    error::{StoreError, StoreResult},
};

/// Lifecycle of a streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Not started; the cursor is open but nothing has been pulled.
    Idle,
    /// Rows are being pulled and dispatched.
    Streaming,
    /// The cursor was exhausted and every handler succeeded.
    Completed,
    /// A handler or the cursor failed.
    Failed,
}

impl StreamPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamPhase::Completed | StreamPhase::Failed)
    }
}

/// Outcome of the most recently dispatched handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug)]
struct StreamState {
    phase: StreamPhase,
    last_outcome: Option<HandlerOutcome>,
    handled: u64,
}

/// Drives a cursor through a per-row handler, one row at a time.
///
/// A driver runs once. Cursors are forward-only, so a second run fails with
/// [`StoreError::CursorConsumed`].
#[derive(Debug)]
pub struct CursorDriver<C> {
    cursor: C,
    state: StreamState,
}

impl<C: RowCursor> CursorDriver<C> {
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            state: StreamState {
                phase: StreamPhase::Idle,
                last_outcome: None,
                handled: 0,
            },
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.state.phase
    }

    pub fn last_outcome(&self) -> Option<HandlerOutcome> {
        self.state.last_outcome
    }

    /// Number of rows whose handler completed successfully.
    pub fn rows_handled(&self) -> u64 {
        self.state.handled
    }

    /// Feeds every row to an async handler, awaiting each before pulling the next.
    ///
    /// Returns the first error raised by the handler or the cursor, exactly as raised.
    pub async fn for_each_await<F, Fut>(&mut self, mut handler: F) -> StoreResult<()>
    where
        F: FnMut(Row) -> Fut,
        Fut: Future<Output = StoreResult<()>>,
    {
        if self.state.phase != StreamPhase::Idle {
            return Err(StoreError::CursorConsumed);
        }

        self.state.phase = StreamPhase::Streaming;
        debug!("stream opened");

        let outcome = self.pump(&mut handler).await;

        self.settle(outcome).await
    }

    /// Feeds every row to a synchronous handler, strictly in order.
    pub async fn for_each_sync<F>(&mut self, mut handler: F) -> StoreResult<()>
    where
        F: FnMut(Row) -> StoreResult<()>,
    {
        self.for_each_await(move |row| ready(handler(row))).await
    }

    async fn pump<F, Fut>(&mut self, handler: &mut F) -> StoreResult<()>
    where
        F: FnMut(Row) -> Fut,
        Fut: Future<Output = StoreResult<()>>,
    {
        while let Some(next) = self.cursor.next_row().await {
            let row = next?;

            self.state.last_outcome = Some(HandlerOutcome::Pending);

            if let Err(err) = handler(row).await {
                self.state.last_outcome = Some(HandlerOutcome::Failed);
                return Err(err);
            }

            self.state.last_outcome = Some(HandlerOutcome::Succeeded);
            self.state.handled += 1;
        }

        Ok(())
    }

    async fn settle(&mut self, outcome: StoreResult<()>) -> StoreResult<()> {
        let closed = self.cursor.close().await;

        match (outcome, closed) {
            (Ok(()), Ok(())) => {
                self.state.phase = StreamPhase::Completed;
                debug!(rows = self.state.handled, "stream completed");
                Ok(())
            }
            (Ok(()), Err(close_err)) => {
                self.state.phase = StreamPhase::Failed;
                debug!(error = %close_err, "stream completed but cursor failed to close");
                Err(close_err)
            }
            (Err(err), closed) => {
                self.state.phase = StreamPhase::Failed;
                debug!(row = self.state.handled, error = %err, "stream aborted");

                if let Err(close_err) = closed {
                    warn!(error = %close_err, "failed to close cursor after stream abort");
                }

                Err(err)
            }
        }
    }
}

/// Runs `handler` over every row of `cursor`, awaiting each call. See [`CursorDriver`].
pub async fn for_each_await<C, F, Fut>(cursor: C, handler: F) -> StoreResult<()>
where
    C: RowCursor,
    F: FnMut(Row) -> Fut,
    Fut: Future<Output = StoreResult<()>>,
{
    CursorDriver::new(cursor).for_each_await(handler).await
}

/// Runs `handler` inline over every row of `cursor`. See [`CursorDriver`].
pub async fn for_each_sync<C, F>(cursor: C, handler: F) -> StoreResult<()>
where
    C: RowCursor,
    F: FnMut(Row) -> StoreResult<()>,
{
    CursorDriver::new(cursor).for_each_sync(handler).await
}
