//! Database access: pool initialization and the server-side cursor reader.

mod cursor;
mod pool;

pub use cursor::CursorReader;
pub use pool::init_db_pool;
