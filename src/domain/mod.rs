pub mod errors;
pub mod ports;
