//! Large object support.
//!
//! PostgreSQL's large object API is normally driven by libpq's low-level
//! Function Call sub-protocol. This crate doesn't implement that
//! sub-protocol; instead every `lo_*` operation is issued as an ordinary
//! extended-query call to the matching `pg_catalog.lo_*` SQL function,
//! which is functionally equivalent and works over the same machinery as
//! any other statement. Large object handles (`fd`) are only meaningful
//! for the lifetime of the transaction that opened them and the `Conn`
//! that holds that transaction, so callers pass the `fd`/`oid` back in
//! explicitly rather than through an owning guard type.

use super::Conn;
use crate::error::Result;

/// Seek origin for [`Conn::lo_lseek`], mirroring `SEEK_SET`/`SEEK_CUR`/`SEEK_END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Start,
    Current,
    End,
}

impl SeekFrom {
    fn whence(self) -> i32 {
        match self {
            SeekFrom::Start => 0,
            SeekFrom::Current => 1,
            SeekFrom::End => 2,
        }
    }
}

/// Open mode for [`Conn::lo_open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoMode {
    pub read: bool,
    pub write: bool,
}

impl LoMode {
    pub const READ: Self = Self { read: true, write: false };
    pub const WRITE: Self = Self { read: false, write: true };
    pub const READ_WRITE: Self = Self { read: true, write: true };

    fn bits(self) -> i32 {
        const INV_WRITE: i32 = 0x0002_0000;
        const INV_READ: i32 = 0x0004_0000;
        let mut bits = 0;
        if self.read {
            bits |= INV_READ;
        }
        if self.write {
            bits |= INV_WRITE;
        }
        bits
    }
}

impl Conn {
    /// Create a new large object, returning its OID.
    ///
    /// Must be called inside a transaction.
    pub async fn lo_create(&mut self) -> Result<i32> {
        self.exec_value("SELECT pg_catalog.lo_create(0)::int4", ()).await
    }

    /// Open a large object for reading and/or writing, returning a
    /// connection-scoped file descriptor.
    ///
    /// Must be called inside a transaction; the returned `fd` is only
    /// valid until the transaction ends.
    pub async fn lo_open(&mut self, oid: i32, mode: LoMode) -> Result<i32> {
        self.exec_value(
            "SELECT pg_catalog.lo_open($1::oid, $2)::int4",
            (oid, mode.bits()),
        )
        .await
    }

    /// Read up to `max_len` bytes from the large object's current position.
    pub async fn lo_read(&mut self, fd: i32, max_len: i32) -> Result<Vec<u8>> {
        self.exec_value("SELECT pg_catalog.loread($1, $2)", (fd, max_len)).await
    }

    /// Write `data` at the large object's current position, returning the
    /// number of bytes written.
    pub async fn lo_write(&mut self, fd: i32, data: &[u8]) -> Result<i32> {
        self.exec_value("SELECT pg_catalog.lowrite($1, $2)", (fd, data)).await
    }

    /// Move the large object's current position, returning the new offset.
    pub async fn lo_lseek(&mut self, fd: i32, offset: i64, from: SeekFrom) -> Result<i64> {
        self.exec_value(
            "SELECT pg_catalog.lo_lseek64($1, $2, $3)",
            (fd, offset, from.whence()),
        )
        .await
    }

    /// Report the large object's current position.
    pub async fn lo_tell(&mut self, fd: i32) -> Result<i64> {
        self.exec_value("SELECT pg_catalog.lo_tell64($1)", (fd,)).await
    }

    /// Close a large object file descriptor opened via [`Conn::lo_open`].
    pub async fn lo_close(&mut self, fd: i32) -> Result<()> {
        self.exec_drop("SELECT pg_catalog.lo_close($1)", (fd,)).await?;
        Ok(())
    }

    /// Delete a large object by OID.
    pub async fn lo_unlink(&mut self, oid: i32) -> Result<()> {
        self.exec_drop("SELECT pg_catalog.lo_unlink($1::oid)", (oid,)).await?;
        Ok(())
    }
}
