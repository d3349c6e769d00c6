//! `COPY` protocol wiring, layered directly over the simple query
//! protocol's `Query` message (no parameters, so no extended-protocol
//! bind/describe round trip is needed for either direction).

use crate::error::{Error, Result};
use crate::protocol::backend::{CommandComplete, ErrorResponse, ReadyForQuery, msg_type};
use crate::protocol::frontend::{write_copy_data, write_copy_done, write_copy_fail, write_query};

use super::Conn;

impl Conn {
    /// Run a `COPY ... TO STDOUT` statement, collecting each row the server
    /// sends back as a raw, undecoded byte buffer (one `CopyData` message
    /// per row, in the server's chosen text or binary sub-format).
    pub async fn copy_out(&mut self, sql: &str) -> Result<Vec<Vec<u8>>> {
        self.buffer_set.write_buffer.clear();
        write_query(&mut self.buffer_set.write_buffer, sql);
        self.stream.write_all(&self.buffer_set.write_buffer).await?;
        self.stream.flush().await?;

        self.stream.read_message(&mut self.buffer_set).await?;
        match self.buffer_set.type_byte {
            msg_type::COPY_OUT_RESPONSE => {}
            msg_type::ERROR_RESPONSE => return Err(self.read_error_to_ready().await),
            other => {
                return Err(Error::Protocol(format!(
                    "expected CopyOutResponse, got message type {other}"
                )));
            }
        }

        let mut rows = Vec::new();
        loop {
            self.stream.read_message(&mut self.buffer_set).await?;
            match self.buffer_set.type_byte {
                msg_type::COPY_DATA => rows.push(self.buffer_set.read_buffer.clone()),
                msg_type::COPY_DONE => {}
                msg_type::COMMAND_COMPLETE => {
                    let _ = CommandComplete::parse(&self.buffer_set.read_buffer)?;
                }
                msg_type::READY_FOR_QUERY => {
                    let ready = ReadyForQuery::parse(&self.buffer_set.read_buffer)?;
                    self.transaction_status = ready.transaction_status().unwrap_or_default();
                    break;
                }
                msg_type::ERROR_RESPONSE => return Err(self.read_error_to_ready().await),
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected message type {other} during COPY OUT"
                    )));
                }
            }
        }
        Ok(rows)
    }

    /// Run a `COPY ... FROM STDIN` statement, streaming `rows` to the
    /// server as individual `CopyData` messages, in the text/binary
    /// sub-format the statement itself declares (e.g. `COPY t FROM STDIN
    /// (FORMAT csv)`). Returns the server-reported row count.
    pub async fn copy_in<I>(&mut self, sql: &str, rows: I) -> Result<Option<u64>>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.buffer_set.write_buffer.clear();
        write_query(&mut self.buffer_set.write_buffer, sql);
        self.stream.write_all(&self.buffer_set.write_buffer).await?;
        self.stream.flush().await?;

        self.stream.read_message(&mut self.buffer_set).await?;
        match self.buffer_set.type_byte {
            msg_type::COPY_IN_RESPONSE => {}
            msg_type::ERROR_RESPONSE => return Err(self.read_error_to_ready().await),
            other => {
                return Err(Error::Protocol(format!(
                    "expected CopyInResponse, got message type {other}"
                )));
            }
        }

        self.buffer_set.write_buffer.clear();
        for row in rows {
            write_copy_data(&mut self.buffer_set.write_buffer, &row);
        }
        write_copy_done(&mut self.buffer_set.write_buffer);
        self.stream.write_all(&self.buffer_set.write_buffer).await?;
        self.stream.flush().await?;

        loop {
            self.stream.read_message(&mut self.buffer_set).await?;
            match self.buffer_set.type_byte {
                msg_type::COMMAND_COMPLETE => {
                    let complete = CommandComplete::parse(&self.buffer_set.read_buffer)?;
                    let rows_affected = complete.rows_affected();
                    self.stream.read_message(&mut self.buffer_set).await?;
                    let ready = ReadyForQuery::parse(&self.buffer_set.read_buffer)?;
                    self.transaction_status = ready.transaction_status().unwrap_or_default();
                    return Ok(rows_affected);
                }
                msg_type::ERROR_RESPONSE => return Err(self.read_error_to_ready().await),
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected message type {other} after COPY IN data"
                    )));
                }
            }
        }
    }

    /// Abort an in-progress `COPY FROM STDIN` with a `CopyFail` message
    /// instead of sending the collected rows, surfacing `reason` as the
    /// server-side error text.
    pub async fn copy_in_fail(&mut self, sql: &str, reason: &str) -> Result<()> {
        self.buffer_set.write_buffer.clear();
        write_query(&mut self.buffer_set.write_buffer, sql);
        self.stream.write_all(&self.buffer_set.write_buffer).await?;
        self.stream.flush().await?;

        self.stream.read_message(&mut self.buffer_set).await?;
        if self.buffer_set.type_byte != msg_type::COPY_IN_RESPONSE {
            return Err(Error::Protocol("expected CopyInResponse".into()));
        }

        self.buffer_set.write_buffer.clear();
        write_copy_fail(&mut self.buffer_set.write_buffer, reason);
        self.stream.write_all(&self.buffer_set.write_buffer).await?;
        self.stream.flush().await?;

        // The server responds with an ErrorResponse for the failed COPY.
        let _ = self.read_error_to_ready().await;
        Ok(())
    }

    /// Drain an `ErrorResponse` and the subsequent `ReadyForQuery`,
    /// returning the error.
    async fn read_error_to_ready(&mut self) -> Error {
        let err = ErrorResponse::parse(&self.buffer_set.read_buffer)
            .map(ErrorResponse::into_error)
            .unwrap_or_else(|e| e);
        loop {
            if self.stream.read_message(&mut self.buffer_set).await.is_err() {
                break;
            }
            if self.buffer_set.type_byte == msg_type::READY_FOR_QUERY {
                if let Ok(ready) = ReadyForQuery::parse(&self.buffer_set.read_buffer) {
                    self.transaction_status = ready.transaction_status().unwrap_or_default();
                }
                break;
            }
        }
        err
    }
}
