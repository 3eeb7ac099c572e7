//! Indexed collections and links between them.
//!
//! A collection is any homogeneous store with a record count. Mesh regions
//! refer to each other's storage through [`CollectionLink`]s; a [`Handle`] is
//! either the storage itself or such a link, and [`Handle::resolve`] follows
//! links down to the storage.

use std::any::Any;

/// Upcast helper so trait objects can be downcast to their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A homogeneous store with a stable local index `0..size()`.
pub trait IndexedCollection: AsAny {
    /// Number of records.
    fn size(&self) -> usize;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn IndexedCollection + '_ {
    /// Concrete storage behind the trait object, if it is a `D`.
    pub fn downcast_ref<D: IndexedCollection + 'static>(&self) -> Option<&D> {
        self.as_any().downcast_ref::<D>()
    }
}

impl<T: 'static> IndexedCollection for Vec<T> {
    fn size(&self) -> usize {
        self.len()
    }
}

/// Named indirection to another collection or link.
pub struct CollectionLink<'a> {
    name: String,
    target: Handle<'a>,
}

impl<'a> CollectionLink<'a> {
    pub fn new(name: impl Into<String>, target: Handle<'a>) -> Self {
        Self { name: name.into(), target }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Handle<'a> {
        self.target
    }
}

#[derive(Clone, Copy)]
pub enum Handle<'a> {
    Data(&'a dyn IndexedCollection),
    Link(&'a CollectionLink<'a>),
}

impl<'a> Handle<'a> {
    /// Follow links until the underlying storage is reached.
    ///
    /// Links only borrow already-built handles, so chains are finite.
    pub fn resolve(self) -> &'a dyn IndexedCollection {
        let mut handle = self;
        loop {
            match handle {
                Handle::Data(data) => return data,
                Handle::Link(link) => handle = link.target,
            }
        }
    }
}

impl<'a, T: IndexedCollection> From<&'a T> for Handle<'a> {
    fn from(data: &'a T) -> Self {
        Handle::Data(data)
    }
}

impl<'a> From<&'a CollectionLink<'a>> for Handle<'a> {
    fn from(link: &'a CollectionLink<'a>) -> Self {
        Handle::Link(link)
    }
}
