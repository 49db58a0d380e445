//! Message identity: short handles, long ids, and the lookup cascade between them.

pub mod cache;
pub mod persist;
pub mod resolver;
pub mod store;

pub use resolver::{IdentityResolver, ResolveKey, ResolveStrategy};
pub use store::IdentityStore;
