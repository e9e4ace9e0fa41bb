//! Page source implementations.

pub mod http;
pub use http::HttpPageSource;

pub mod mock;
pub use mock::MockPageSource;
