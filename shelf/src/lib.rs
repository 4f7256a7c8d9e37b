pub mod backend;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod proto;
pub mod ratelimit;
pub mod store;

pub use shelf_api as api;
pub use shelf_query as query;

pub use dispatch::{SearchDispatcher, SearchError};
