use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::results::ResultSet;

/// Rendering of SQL `NULL` in the results grid.
pub const NULL_DISPLAY: &str = "NULL";

/// One result row; `None` is SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    pub values: Vec<Option<String>>,
}

impl QueryRow {
    #[must_use]
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn from_text<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(|value| Some(value.into())).collect(),
        }
    }

    #[must_use]
    pub fn display(&self, index: usize) -> &str {
        match self.values.get(index) {
            Some(Some(value)) => value,
            Some(None) => NULL_DISPLAY,
            None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryBackendError {
    message: String,
}

impl QueryBackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum QueryRunnerError {
    #[error("query backend failed: {0}")]
    Backend(#[source] QueryBackendError),
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExecutionSummary {
    pub rows_streamed: u64,
    pub rows_affected: Option<u64>,
    pub was_cancelled: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpProgress {
    Streaming { rows_moved: usize },
    Finished(QueryExecutionSummary),
    Cancelled(QueryExecutionSummary),
}

#[async_trait]
pub trait QueryRowStream: Send {
    /// Column names of the statement; empty for statements without a result set.
    fn columns(&self) -> &[String];

    /// Rows changed by a non-query statement, known once the stream is exhausted.
    fn rows_affected(&self) -> Option<u64> {
        None
    }

    async fn next_row(&mut self) -> Result<Option<QueryRow>, QueryBackendError>;

    async fn cancel(&mut self) -> Result<(), QueryBackendError> {
        Ok(())
    }
}

#[async_trait]
pub trait QueryBackend {
    type Stream: QueryRowStream + Send;

    async fn start_query(&self, sql: &str) -> Result<Self::Stream, QueryBackendError>;
}

/// A started statement whose rows are moved into a [`ResultSet`] in batches.
#[derive(Debug)]
pub struct QueryExecution<S: QueryRowStream> {
    stream: S,
    started_at: Instant,
    rows_streamed: u64,
}

impl<S: QueryRowStream> QueryExecution<S> {
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.stream.columns()
    }

    #[must_use]
    pub fn rows_streamed(&self) -> u64 {
        self.rows_streamed
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn summary(&self, was_cancelled: bool) -> QueryExecutionSummary {
        QueryExecutionSummary {
            rows_streamed: self.rows_streamed,
            rows_affected: self.stream.rows_affected(),
            was_cancelled,
            elapsed: self.started_at.elapsed(),
        }
    }

    /// Moves at most `max_rows` rows into `buffer`.
    pub async fn pump(
        &mut self,
        buffer: &mut ResultSet,
        max_rows: usize,
        cancellation: &CancellationToken,
    ) -> Result<PumpProgress, QueryRunnerError> {
        let mut rows_moved = 0_usize;

        while rows_moved < max_rows.max(1) {
            if cancellation.is_cancelled() {
                self.stream
                    .cancel()
                    .await
                    .map_err(QueryRunnerError::Backend)?;
                tracing::info!(rows = self.rows_streamed, "query cancelled");
                return Ok(PumpProgress::Cancelled(self.summary(true)));
            }

            let maybe_row = self
                .stream
                .next_row()
                .await
                .map_err(QueryRunnerError::Backend)?;
            let Some(row) = maybe_row else {
                let summary = self.summary(false);
                tracing::debug!(
                    rows = summary.rows_streamed,
                    elapsed_ms = summary.elapsed.as_millis(),
                    "query finished"
                );
                return Ok(PumpProgress::Finished(summary));
            };

            buffer.push_row(row);
            self.rows_streamed += 1;
            rows_moved += 1;
        }

        Ok(PumpProgress::Streaming { rows_moved })
    }
}

#[derive(Debug)]
pub struct QueryRunner<B: QueryBackend> {
    backend: B,
}

impl<B: QueryBackend> QueryRunner<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Starts `sql` and resets `buffer` to the statement's columns.
    pub async fn start(
        &self,
        sql: &str,
        buffer: &mut ResultSet,
    ) -> Result<QueryExecution<B::Stream>, QueryRunnerError> {
        let started_at = Instant::now();
        let stream = self
            .backend
            .start_query(sql)
            .await
            .map_err(QueryRunnerError::Backend)?;
        buffer.reset(stream.columns().to_vec());

        Ok(QueryExecution {
            stream,
            started_at,
            rows_streamed: 0,
        })
    }

    pub async fn execute_streaming(
        &self,
        sql: &str,
        buffer: &mut ResultSet,
        cancellation: &CancellationToken,
    ) -> Result<QueryExecutionSummary, QueryRunnerError> {
        let mut execution = self.start(sql, buffer).await?;
        loop {
            match execution.pump(buffer, usize::MAX, cancellation).await? {
                PumpProgress::Streaming { .. } => {}
                PumpProgress::Finished(summary) | PumpProgress::Cancelled(summary) => {
                    return Ok(summary);
                }
            }
        }
    }
}
