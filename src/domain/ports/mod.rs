pub mod notification_transport;

pub use notification_transport::*;
