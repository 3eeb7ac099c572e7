//! Unified indexing over heterogeneous mesh collections.

pub mod collection;
pub mod unified;

pub use collection::{AsAny, CollectionLink, Handle, IndexedCollection};
pub use unified::UnifiedIndexSpace;
