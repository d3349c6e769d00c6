//! An asynchronous PostgreSQL client library.
//!
//! # Features
//!
//! - **Zero-copy parsing**: Message payloads are parsed directly from the read buffer
//! - **Sans-I/O state machines**: Protocol logic is separated from I/O
//! - **Sync and async APIs**: Choose between synchronous and tokio-based async
//! - **Full protocol support**: Simple query, extended query, COPY, pipelining
//! - **Self-contained decimal and calendar engines**: exact `numeric`/`money` and
//!   era-aware date/time handling without relying on the server's text formatting
//!
//! # Example
//!
//! ```no_run
//! use pg_strand::sync::Conn;
//! use pg_strand::Opts;
//!
//! fn main() -> pg_strand::Result<()> {
//!     let opts = Opts {
//!         host: "localhost".into(),
//!         user: "postgres".into(),
//!         database: Some("mydb".into()),
//!         password: Some("secret".into()),
//!         ..Default::default()
//!     };
//!
//!     let mut conn = Conn::new(opts)?;
//!
//!     let rows: Vec<(i32,)> = conn.query_collect("SELECT 1 AS num")?;
//!     println!("Rows: {:?}", rows);
//!
//!     conn.close()?;
//!     Ok(())
//! }
//! ```

// private
mod buffer_pool;
mod buffer_set;
mod error;
mod opts;
mod pipeline;
mod statement;

// pub
pub mod calendar;
pub mod conversion;
pub mod decimal;
pub mod handler;
pub mod money;
pub mod protocol;
pub mod sched;
pub mod state;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use buffer_pool::BufferPool;
pub use buffer_set::BufferSet;
pub use conversion::{
    Array, Bound, BoundingBox, Cidr, Circle, Inet, Json, Jsonb, LSeg, Line, MacAddr, MacAddr8, Path,
    Point, Polygon, Range,
};
pub use decimal::Decimal;
pub use error::{Error, Result, ServerError};
pub use handler::AsyncMessageHandler;
pub use money::Money;
pub use opts::{Opts, SslMode};
pub use state::action::AsyncMessage;
pub use state::extended::PreparedStatement;
pub use statement::IntoStatement;
