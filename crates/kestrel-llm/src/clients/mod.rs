//! Generator backends.

pub mod http;
pub mod mock;

pub use http::HttpGenerator;
pub use mock::MockGenerator;
