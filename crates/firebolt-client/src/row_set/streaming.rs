//! Streaming (JSON-Lines) result decoding.
//!
//! The response body is consumed record by record; at most one DATA batch is
//! held in memory per result block, and cells are converted to typed values
//! only as rows are fetched. The row set owns at most one in-flight HTTP
//! response per block and closes it before advancing to the next block.

use bytes::Bytes;
use firebolt_types::{Column, Value};
use futures_core::Stream;
use futures_util::StreamExt;

use crate::error::{Error, Result, StructuredError};
use crate::row_set::json_lines::{JsonLinesRecord, parse_record};
use crate::row_set::{Statistics, columns_from_meta, parse_row};

type ByteStream = std::pin::Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Newline-delimited reader over a response byte stream.
pub(crate) struct LineStream {
    inner: Option<ByteStream>,
    buffer: Vec<u8>,
    /// Read position within `buffer`; consumed prefix is discarded in chunks
    /// so memory stays bounded by one batch.
    pos: usize,
}

impl LineStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        Self {
            inner: Some(Box::pin(response.bytes_stream())),
            buffer: Vec::new(),
            pos: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(body: Bytes) -> Self {
        Self {
            inner: Some(Box::pin(futures_util::stream::once(async move { Ok(body) }))),
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// Next line without its terminator; `None` once the stream is drained.
    pub(crate) async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(newline) = self.buffer[self.pos..].iter().position(|b| *b == b'\n') {
                let line = self.take_line(self.pos + newline);
                return Ok(Some(line));
            }
            let Some(inner) = self.inner.as_mut() else {
                // Stream finished; yield any unterminated tail once.
                if self.pos < self.buffer.len() {
                    let line = self.take_line(self.buffer.len());
                    return Ok(Some(line));
                }
                return Ok(None);
            };
            match inner.next().await {
                Some(Ok(chunk)) => {
                    self.compact();
                    self.buffer.extend_from_slice(&chunk);
                }
                Some(Err(error)) => {
                    self.inner = None;
                    return Err(Error::stream_transport(error));
                }
                None => self.inner = None,
            }
        }
    }

    fn take_line(&mut self, end: usize) -> String {
        let line = String::from_utf8_lossy(&self.buffer[self.pos..end]).into_owned();
        self.pos = (end + 1).min(self.buffer.len().max(end));
        let line = line.trim_end_matches('\r').to_owned();
        self.compact();
        line
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.buffer.drain(..self.pos.min(self.buffer.len()));
            self.pos = 0;
        }
    }

    /// Drop the underlying response, aborting any unread remainder.
    pub(crate) fn close(&mut self) {
        self.inner = None;
        self.buffer.clear();
        self.pos = 0;
    }
}

/// A row set that decodes rows from JSON-Lines responses on demand.
pub struct StreamingRowSet {
    responses: Vec<Option<LineStream>>,
    current: usize,
    columns: Vec<Column>,
    row_count: i64,
    statistics: Option<Statistics>,
    rows_returned: i64,
    consumed: bool,
    record: Option<Vec<Vec<serde_json::Value>>>,
    record_idx: usize,
}

impl Default for StreamingRowSet {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingRowSet {
    /// Create an empty row set; responses are appended per statement.
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            current: 0,
            columns: Vec::new(),
            row_count: -1,
            statistics: None,
            rows_returned: 0,
            consumed: false,
            record: None,
            record_idx: 0,
        }
    }

    /// Append a live streaming response. The first appended response has its
    /// START record read immediately to expose column metadata.
    pub async fn append_response(&mut self, response: reqwest::Response) -> Result<()> {
        self.append_stream(LineStream::new(response)).await
    }

    pub(crate) async fn append_stream(&mut self, stream: LineStream) -> Result<()> {
        self.responses.push(Some(stream));
        if self.responses.len() == 1 {
            self.columns = self.fetch_columns().await?;
        }
        Ok(())
    }

    /// Append the block for an empty response body.
    pub fn append_empty_response(&mut self) {
        self.responses.push(None);
    }

    /// Columns of the current block.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Row count: −1 until the stream's FINISH record has been seen.
    #[must_use]
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Final statistics, present once the stream finished.
    #[must_use]
    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    fn current_stream(&mut self) -> Option<&mut LineStream> {
        self.responses.get_mut(self.current).and_then(Option::as_mut)
    }

    async fn next_record(&mut self) -> Result<Option<JsonLinesRecord>> {
        let Some(stream) = self.current_stream() else {
            return Ok(None);
        };
        let Some(line) = stream.next_line().await? else {
            return Ok(None);
        };
        let record = parse_record(&line)?;
        if let JsonLinesRecord::Errors { errors, statistics } = record {
            // Mid-stream failure: the server reports errors instead of more
            // data. The stream is finished from here on.
            self.consumed = true;
            self.statistics = statistics;
            return Err(Error::Structured(StructuredError::new(errors)));
        }
        Ok(Some(record))
    }

    async fn fetch_columns(&mut self) -> Result<Vec<Column>> {
        if self.current_stream().is_none() {
            return Ok(Vec::new());
        }
        match self.next_record().await? {
            None => {
                self.consumed = true;
                Err(Error::Operational(
                    "Unexpected end of response stream while reading columns.".to_owned(),
                ))
            }
            Some(JsonLinesRecord::Start { result_columns, .. }) => Ok(columns_from_meta(
                &result_columns
                    .into_iter()
                    .map(|c| (c.name, c.type_str))
                    .collect::<Vec<_>>(),
            )),
            Some(other) => {
                self.consumed = true;
                Err(Error::Operational(format!(
                    "Unexpected json line message type {}, expected START",
                    other.message_type()
                )))
            }
        }
    }

    async fn pop_data_batch(&mut self) -> Result<Option<Vec<Vec<serde_json::Value>>>> {
        match self.next_record().await? {
            None => {
                if self.consumed {
                    return Ok(None);
                }
                // The server must terminate every stream with a FINISH record.
                self.consumed = true;
                Err(Error::Operational(
                    "Unexpected end of response stream while reading data.".to_owned(),
                ))
            }
            Some(JsonLinesRecord::Success { statistics }) => {
                self.row_count = self.rows_returned;
                self.statistics = statistics;
                self.consumed = true;
                Ok(None)
            }
            Some(JsonLinesRecord::Data { data }) => Ok(Some(data)),
            Some(other) => Err(Error::Operational(format!(
                "Unexpected json line message type {}, expected DATA",
                other.message_type()
            ))),
        }
    }

    /// Fetch the next row, reading further DATA records as needed.
    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.responses.get(self.current).is_some_and(Option::is_none) {
            return Err(Error::Data("no rows to fetch".to_owned()));
        }
        loop {
            if let Some(record) = &self.record {
                if self.record_idx < record.len() {
                    let row = parse_row(&record[self.record_idx], &self.columns)?;
                    self.record_idx += 1;
                    self.rows_returned += 1;
                    return Ok(Some(row));
                }
                self.record = None;
            }
            if self.consumed {
                return Ok(None);
            }
            match self.pop_data_batch().await? {
                Some(batch) => {
                    self.record = Some(batch);
                    self.record_idx = 0;
                }
                None => return Ok(None),
            }
        }
    }

    /// Advance to the next block: close the current response stream, reset
    /// per-block state, and read the next block's START record.
    pub async fn next_set(&mut self) -> Result<bool> {
        if self.current + 1 >= self.responses.len() {
            return Ok(false);
        }
        if let Some(stream) = self.current_stream() {
            stream.close();
        }
        self.current += 1;
        self.row_count = -1;
        self.statistics = None;
        self.rows_returned = 0;
        self.consumed = false;
        self.record = None;
        self.record_idx = 0;
        self.columns = self.fetch_columns().await?;
        Ok(true)
    }

    /// Close every remaining response stream.
    pub fn close(&mut self) {
        for response in self.responses.iter_mut().skip(self.current) {
            if let Some(stream) = response {
                stream.close();
            }
        }
        self.responses.clear();
        self.record = None;
        self.consumed = true;
    }
}
