pub mod http;
pub mod memory;
pub mod sse;

pub use http::HttpTransport;
pub use memory::InMemoryTransport;
