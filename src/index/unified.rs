//! Contiguous index over several collections.
//!
//! [`UnifiedIndexSpace`] views an ordered list of collections of the same
//! type as one range `0..size()`. Collection `k` occupies
//! `offsets[k]..offsets[k + 1]`, so a global index is located with one
//! upper-bound binary search over the offsets. An index equal to a boundary
//! belongs to the collection starting there; empty collections never match.

use log::debug;

use crate::error::LssError;
use crate::index::collection::{Handle, IndexedCollection};

pub struct UnifiedIndexSpace<'a, D: IndexedCollection + 'static> {
    components: Vec<&'a D>,
    /// `offsets[k]` is the first global index of collection `k`; one extra
    /// trailing entry holds the total size.
    offsets: Vec<usize>,
}

impl<'a, D: IndexedCollection + 'static> Default for UnifiedIndexSpace<'a, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, D: IndexedCollection + 'static> UnifiedIndexSpace<'a, D> {
    pub fn new() -> Self {
        Self { components: Vec::new(), offsets: vec![0] }
    }

    /// Build directly from typed references.
    pub fn from_components(components: impl IntoIterator<Item = &'a D>) -> Self {
        let components: Vec<&'a D> = components.into_iter().collect();
        let offsets = prefix_offsets(&components);
        Self { components, offsets }
    }

    /// Replace the unified collections.
    ///
    /// Links are resolved here, once. If any resolved collection is not a
    /// `D` the call fails with [`LssError::InvalidCollectionType`] and the
    /// previous contents are kept.
    pub fn set_data<I, H>(&mut self, handles: I) -> Result<(), LssError>
    where
        I: IntoIterator<Item = H>,
        H: Into<Handle<'a>>,
    {
        let mut components = Vec::new();
        for handle in handles {
            let handle: Handle<'a> = handle.into();
            let resolved = handle.resolve();
            let data = resolved.downcast_ref::<D>().ok_or(LssError::InvalidCollectionType {
                expected: std::any::type_name::<D>(),
                found: resolved.type_name(),
            })?;
            components.push(data);
        }
        self.offsets = prefix_offsets(&components);
        self.components = components;
        debug!(
            "unified {} collections into {} indices",
            self.components.len(),
            self.size()
        );
        Ok(())
    }

    /// Collection holding `global` and the index inside it.
    pub fn location(&self, global: usize) -> Result<(&'a D, usize), LssError> {
        let (k, local) = self.location_index(global)?;
        Ok((self.components[k], local))
    }

    /// Position of the collection holding `global` and the index inside it.
    pub fn location_index(&self, global: usize) -> Result<(usize, usize), LssError> {
        if global >= self.size() {
            return Err(LssError::IndexOutOfRange(format!(
                "global index {global} in unified space of size {}",
                self.size()
            )));
        }
        // upper bound, minus one: the last collection starting at or before `global`
        let k = self.offsets.partition_point(|&start| start <= global) - 1;
        Ok((k, global - self.offsets[k]))
    }

    pub fn size(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn components(&self) -> &[&'a D] {
        &self.components
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }
}

fn prefix_offsets<D: IndexedCollection>(components: &[&D]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(components.len() + 1);
    let mut sum = 0;
    offsets.push(sum);
    for c in components {
        sum += c.size();
        offsets.push(sum);
    }
    offsets
}
