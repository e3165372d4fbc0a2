pub mod observability;
pub mod transport;
