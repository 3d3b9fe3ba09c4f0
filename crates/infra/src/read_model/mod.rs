mod store;

pub use store::{InMemoryReadStore, ReadModelStore};
