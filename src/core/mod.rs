//! Foundational and often-reused types.

pub(crate) mod datastore;
pub(crate) mod id;
pub(crate) mod protocol;
pub mod traits;
