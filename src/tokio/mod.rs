//! Asynchronous PostgreSQL client using Tokio.

mod conn;
mod copy;
mod large_object;
mod named_portal;
mod pipeline;
mod pool;
mod stream;
mod transaction;
mod unnamed_portal;

pub use conn::Conn;
pub use large_object::{LoMode, SeekFrom};
pub use named_portal::NamedPortal;
pub use pipeline::Pipeline;
pub use pool::{Pool, PooledConn};
pub use transaction::Transaction;
pub use unnamed_portal::UnnamedPortal;
