//! Package records and the on-disk registry.

mod record;
mod store;

pub use record::{Location, Package};
pub use store::PackageStore;
