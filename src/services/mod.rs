pub mod feed_store;
pub mod feed_synchronizer;
pub mod read_state_mutator;
pub mod template;

pub use feed_store::*;
pub use feed_synchronizer::*;
pub use read_state_mutator::*;
pub use template::*;
