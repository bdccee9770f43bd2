// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Query protocol engine.
//!
//! A [`Query`] drives one statement through the engine's paginated HTTP
//! protocol:
//!
//! ```text
//! Idle --post--> Posted --poll--> Polling --(no nextUri)--> Completed
//!   ^                                                           |
//!   +------------------- terminate / reset ---------------------+
//! ```
//!
//! Rows are buffered in arrival order and addressed by a global index that
//! never changes. [`Query::checkpoint_row_position`] releases rows the
//! caller has consumed; the logical row count is unaffected.

use crate::client::{HttpRequest, HttpResponse, SubscriptionId, Transport};
use crate::error::{Result, TrinoErrorHelper};
use crate::telemetry::Timer;
use crate::types::{ColumnDescriptor, QueryError, QueryResults, Row};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Unit of the linear polling backoff.
pub const POLL_BACKOFF_STEP: Duration = Duration::from_millis(25);

/// When [`Query::poll`] stops issuing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollMode {
    /// Exactly one request.
    JustOnce,
    /// Until a pass returns rows, or the query completes.
    #[default]
    UntilNewData,
    /// Until column metadata is known, or the query completes.
    UntilColumnsLoaded,
    /// Until the query completes.
    ToCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Posted,
    Polling,
    Completed,
}

/// What a single response contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateStatus {
    pub got_columns: bool,
    pub got_rows: bool,
    pub completed: bool,
}

impl UpdateStatus {
    fn got_info(&self) -> bool {
        self.got_columns || self.got_rows
    }
}

/// Handle returned by [`Query::subscribe_columns_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSubscription(u64);

type ColumnsChangedCallback = Box<dyn FnMut(&[ColumnDescriptor]) + Send>;
type SleepFn = Box<dyn FnMut(Duration) + Send>;

/// Server-side progress, shared with the connection's disconnect hook.
#[derive(Debug, Default)]
struct Cursor {
    next_uri: Option<String>,
    completed: bool,
    detached: bool,
}

pub struct Query {
    transport: Arc<Mutex<Transport>>,
    cursor: Arc<Mutex<Cursor>>,
    disconnect_subscription: Option<SubscriptionId>,
    state: QueryState,
    text: String,
    query_id: String,
    info_uri: String,
    partial_cancel_uri: String,
    status: String,
    columns: Vec<ColumnDescriptor>,
    rows: VecDeque<Row>,
    row_offset: i64,
    error: Option<QueryError>,
    column_subscribers: Vec<(ColumnSubscription, ColumnsChangedCallback)>,
    next_column_subscription: u64,
    sleep: SleepFn,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("state", &self.state)
            .field("query_id", &self.query_id)
            .field("status", &self.status)
            .field("columns", &self.columns.len())
            .field("buffered_rows", &self.rows.len())
            .field("row_offset", &self.row_offset)
            .finish()
    }
}

impl Query {
    /// Creates an idle query bound to `transport`.
    ///
    /// The query subscribes to the connection's disconnect notification so
    /// an unfinished query is terminated server-side when the connection
    /// goes away.
    pub fn new(transport: Arc<Mutex<Transport>>) -> Self {
        let cursor = Arc::new(Mutex::new(Cursor::default()));
        let hook_cursor = Arc::clone(&cursor);
        let subscription = transport.lock().subscribe_disconnect(move |transport| {
            let mut cursor = hook_cursor.lock();
            if !cursor.completed {
                if let Some(uri) = cursor.next_uri.take() {
                    match transport.send(HttpRequest::delete(&uri)) {
                        Ok(response) => debug!(%uri, status = response.status, "terminated query on disconnect"),
                        Err(e) => warn!(%uri, error = %e, "could not terminate query on disconnect"),
                    }
                }
            }
            cursor.next_uri = None;
            cursor.completed = true;
            cursor.detached = true;
        });
        Self {
            transport,
            cursor,
            disconnect_subscription: Some(subscription),
            state: QueryState::Idle,
            text: String::new(),
            query_id: String::new(),
            info_uri: String::new(),
            partial_cancel_uri: String::new(),
            status: String::new(),
            columns: Vec::new(),
            rows: VecDeque::new(),
            row_offset: -1,
            error: None,
            column_subscribers: Vec::new(),
            next_column_subscription: 0,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replaces the function used to wait between empty polls.
    pub fn set_sleep_fn(&mut self, sleep: impl FnMut(Duration) + Send + 'static) {
        self.sleep = Box::new(sleep);
    }

    pub fn set_query(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn query(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn info_uri(&self) -> &str {
        &self.info_uri
    }

    pub fn partial_cancel_uri(&self) -> &str {
        &self.partial_cancel_uri
    }

    pub fn next_uri(&self) -> Option<String> {
        self.cursor.lock().next_uri.clone()
    }

    /// Last state reported by the engine, e.g. `RUNNING` or `FINISHED`.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_completed(&self) -> bool {
        self.cursor.lock().completed
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Registers a callback fired once per query when columns are captured.
    pub fn subscribe_columns_changed(
        &mut self,
        callback: impl FnMut(&[ColumnDescriptor]) + Send + 'static,
    ) -> ColumnSubscription {
        let id = ColumnSubscription(self.next_column_subscription);
        self.next_column_subscription += 1;
        self.column_subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe_columns_changed(&mut self, id: ColumnSubscription) -> bool {
        let before = self.column_subscribers.len();
        self.column_subscribers.retain(|(sid, _)| *sid != id);
        before != self.column_subscribers.len()
    }

    /// Column metadata, polling until it is known if necessary.
    pub fn column_descriptions(&mut self) -> Result<&[ColumnDescriptor]> {
        self.sync_detached();
        if self.columns.is_empty() && self.state != QueryState::Idle && !self.is_completed() {
            self.poll(PollMode::UntilColumnsLoaded)?;
        }
        Ok(&self.columns)
    }

    pub fn column_count(&mut self) -> Result<usize> {
        Ok(self.column_descriptions()?.len())
    }

    /// Columns captured so far, without network activity.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Number of rows observed so far, including checkpointed ones.
    pub fn current_row_count(&self) -> i64 {
        self.row_offset + 1 + self.rows.len() as i64
    }

    /// Total row count once the query has completed, otherwise -1.
    pub fn absolute_row_count(&self) -> i64 {
        if self.is_completed() {
            self.current_row_count()
        } else {
            -1
        }
    }

    /// Global index of the last checkpointed row, or -1.
    pub fn row_offset_position(&self) -> i64 {
        self.row_offset
    }

    /// Rows held in memory.
    pub fn buffered_row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the row at a global index. Checkpointed rows are gone.
    pub fn row_at_index(&self, index: i64) -> Option<&Row> {
        if index <= self.row_offset {
            return None;
        }
        let position = usize::try_from(index - self.row_offset - 1).ok()?;
        self.rows.get(position)
    }

    /// Releases every buffered row at or before `index`.
    ///
    /// Indices at or before the current checkpoint are ignored. Indices past
    /// the last observed row are clamped to it.
    pub fn checkpoint_row_position(&mut self, index: i64) {
        if index < 0 || index <= self.row_offset {
            return;
        }
        let last = self.current_row_count() - 1;
        let target = if index > last {
            warn!(index, last, "checkpoint beyond observed rows, clamping");
            last
        } else {
            index
        };
        if target <= self.row_offset {
            return;
        }
        let released = (target - self.row_offset) as usize;
        self.rows.drain(..released);
        self.row_offset = target;
        trace!(offset = self.row_offset, buffered = self.rows.len(), "checkpointed rows");
    }

    /// Submits the query text to the engine.
    ///
    /// A query that was already posted is terminated and cleared first.
    pub fn post(&mut self) -> Result<()> {
        self.sync_detached();
        if self.state != QueryState::Idle {
            let text = std::mem::take(&mut self.text);
            self.terminate()?;
            self.reset();
            self.text = text;
        }
        let timer = Timer::start();
        let response = {
            let mut transport = self.transport.lock();
            let url = transport.statement_url();
            transport
                .send(HttpRequest::post(url, self.text.clone()))
                .map_err(|e| e.context("post query"))?
        };
        if response.status != 200 {
            return Err(TrinoErrorHelper::io()
                .message(format!("HTTP {}: {}", response.status, response.body))
                .context("post query"));
        }
        let results: QueryResults = response.parse_json().map_err(|e| e.context("post query"))?;
        if results.next_uri.is_none() {
            let detail = results
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "response did not include nextUri".to_string());
            return Err(TrinoErrorHelper::protocol()
                .message(detail)
                .context("post query"));
        }
        self.apply(results);
        self.state = QueryState::Posted;
        info!(query_id = %self.query_id, elapsed_ms = timer.elapsed().as_millis() as u64, "posted query");
        Ok(())
    }

    /// Follows `nextUri` until `mode` is satisfied.
    pub fn poll(&mut self, mode: PollMode) -> Result<()> {
        self.sync_detached();
        if self.state == QueryState::Idle {
            return Err(TrinoErrorHelper::invalid_state()
                .message("query has not been posted")
                .context("poll query"));
        }
        let mut poll_count: u32 = 0;
        loop {
            let next_uri = {
                let mut cursor = self.cursor.lock();
                if cursor.completed {
                    break;
                }
                match cursor.next_uri.clone() {
                    Some(uri) => uri,
                    None => {
                        cursor.completed = true;
                        break;
                    }
                }
            };
            self.state = QueryState::Polling;

            let timer = Timer::start();
            let response = self
                .transport
                .lock()
                .send(HttpRequest::get(&next_uri))
                .map_err(|e| e.context("poll query"))?;
            let update = self.handle_poll_response(&response)?;
            trace!(
                query_id = %self.query_id,
                got_columns = update.got_columns,
                got_rows = update.got_rows,
                completed = update.completed,
                elapsed_ms = timer.elapsed().as_millis() as u64,
                "poll pass"
            );

            let done = match mode {
                PollMode::JustOnce => true,
                PollMode::UntilColumnsLoaded => !self.columns.is_empty() || update.completed,
                PollMode::UntilNewData => update.got_rows || update.completed,
                PollMode::ToCompletion => update.completed,
            };
            if done {
                break;
            }

            if update.got_info() {
                poll_count = 0;
            } else {
                poll_count += 1;
                (self.sleep)(POLL_BACKOFF_STEP * poll_count);
            }
        }
        if self.is_completed() {
            self.state = QueryState::Completed;
        }
        Ok(())
    }

    fn handle_poll_response(&mut self, response: &HttpResponse) -> Result<UpdateStatus> {
        match response.status {
            200 => {
                let results: QueryResults =
                    response.parse_json().map_err(|e| e.context("poll query"))?;
                Ok(self.apply(results))
            }
            429 | 502 | 503 | 504 => {
                debug!(status = response.status, "engine busy, retrying");
                Ok(UpdateStatus::default())
            }
            status => Err(TrinoErrorHelper::io()
                .message(format!("HTTP {status}: {}", response.body))
                .context("poll query")),
        }
    }

    fn apply(&mut self, results: QueryResults) -> UpdateStatus {
        let mut update = UpdateStatus::default();
        if let Some(id) = results.query_id {
            self.query_id = id;
        }
        if let Some(uri) = results.info_uri {
            self.info_uri = uri;
        }
        if let Some(uri) = results.partial_cancel_uri {
            self.partial_cancel_uri = uri;
        }
        if let Some(stats) = results.stats {
            self.status = stats.state;
        }
        if let Some(columns) = results.columns {
            if self.columns.is_empty() && !columns.is_empty() {
                self.columns = columns;
                update.got_columns = true;
                for (_, callback) in self.column_subscribers.iter_mut() {
                    callback(&self.columns);
                }
            }
        }
        if let Some(data) = results.data {
            if !data.is_empty() {
                self.rows.reserve(data.len());
                self.rows.extend(data);
                update.got_rows = true;
            }
        }
        if let Some(error) = results.error {
            warn!(query_id = %self.query_id, error = %error.message, "query failed");
            self.error = Some(error);
        }
        let mut cursor = self.cursor.lock();
        cursor.next_uri = results.next_uri;
        if cursor.next_uri.is_none() {
            cursor.completed = true;
            update.completed = true;
        }
        update
    }

    /// Asks the engine to stop, then drains the query to completion.
    ///
    /// Engines do not always honour partial cancellation promptly;
    /// [`Query::terminate`] is the reliable hard stop.
    pub fn cancel(&mut self) -> Result<()> {
        self.sync_detached();
        if self.partial_cancel_uri.is_empty() || self.is_completed() {
            return Ok(());
        }
        let uri = self.partial_cancel_uri.clone();
        let response = self
            .transport
            .lock()
            .send(HttpRequest::delete(&uri))
            .map_err(|e| e.context("cancel query"))?;
        debug!(%uri, status = response.status, "sent partial cancel");
        self.poll(PollMode::ToCompletion)
    }

    /// Stops server-side work and returns the query to [`QueryState::Idle`].
    ///
    /// Idle queries are left alone. Completed queries are reset without
    /// network activity. Any answer to the DELETE resets the query; only a
    /// transport failure leaves it untouched.
    pub fn terminate(&mut self) -> Result<()> {
        self.sync_detached();
        if self.state == QueryState::Idle {
            return Ok(());
        }
        let pending = {
            let cursor = self.cursor.lock();
            if cursor.completed {
                None
            } else {
                cursor.next_uri.clone()
            }
        };
        if let Some(uri) = pending {
            let response = self
                .transport
                .lock()
                .send(HttpRequest::delete(&uri))
                .map_err(|e| e.context("terminate query"))?;
            if (200..300).contains(&response.status) {
                info!(query_id = %self.query_id, "terminated query");
            } else {
                // The engine may already have purged the query.
                warn!(query_id = %self.query_id, status = response.status, "terminate returned non-success status");
            }
        }
        self.reset();
        Ok(())
    }

    /// Loads a complete response body as if the engine had returned it.
    pub fn sideload_response(&mut self, body: &str) -> Result<()> {
        self.sync_detached();
        self.terminate()?;
        self.reset();
        let results: QueryResults =
            serde_json::from_str(body).map_err(|e| crate::error::Error::from(e).context("sideload response"))?;
        let update = self.apply(results);
        self.state = if update.completed {
            QueryState::Completed
        } else {
            QueryState::Polling
        };
        Ok(())
    }

    /// Clears all per-query state. Subscriptions and the transport are kept.
    pub fn reset(&mut self) {
        self.state = QueryState::Idle;
        self.text.clear();
        self.query_id.clear();
        self.info_uri.clear();
        self.partial_cancel_uri.clear();
        self.status.clear();
        self.columns.clear();
        self.rows.clear();
        self.row_offset = -1;
        self.error = None;
        let mut cursor = self.cursor.lock();
        cursor.next_uri = None;
        cursor.completed = false;
        cursor.detached = false;
    }

    fn sync_detached(&mut self) {
        let detached = self.cursor.lock().detached;
        if detached {
            debug!(query_id = %self.query_id, "connection was closed, resetting query");
            self.reset();
        }
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!(query_id = %self.query_id, error = %e, "could not terminate query on release");
        }
        if let Some(id) = self.disconnect_subscription.take() {
            self.transport.lock().unsubscribe_disconnect(id);
        }
    }
}
