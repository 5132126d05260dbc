use core::any::{Any, TypeId};
use core::fmt;

/// Runtime identity of a Rust type stored in a [Blob].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeMeta {
    id: TypeId,
    name: &'static str,
}

impl TypeMeta {
    /// Type meta of `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// The [TypeId] of the type.
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified name of the type.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if the meta describes `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Debug for TypeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type-erased value container.
///
/// A blob is either empty or holds exactly one value together with its [TypeMeta]. Tensors,
/// strings and any user type registered with a serializer travel through the same container.
#[derive(Default)]
pub struct Blob {
    inner: Option<(TypeMeta, Box<dyn Any + Send + Sync>)>,
}

impl Blob {
    /// Creates a blob holding `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Some((TypeMeta::of::<T>(), Box::new(value))),
        }
    }

    /// Creates an empty blob.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The type of the held value, if any.
    pub fn meta(&self) -> Option<TypeMeta> {
        self.inner.as_ref().map(|(meta, _)| *meta)
    }

    /// Returns true if the blob holds no value.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Returns true if the blob holds a value of type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.meta().is_some_and(|meta| meta.is::<T>())
    }

    /// Borrows the held value as `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.inner
            .as_ref()
            .and_then(|(_, value)| value.downcast_ref::<T>())
    }

    /// Mutably borrows the held value as `T`.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner
            .as_mut()
            .and_then(|(_, value)| value.downcast_mut::<T>())
    }

    /// Replaces the held value and returns a mutable reference to it.
    pub fn reset<T: Any + Send + Sync>(&mut self, value: T) -> &mut T {
        *self = Self::new(value);
        match self.get_mut::<T>() {
            Some(value) => value,
            None => unreachable!("a freshly stored value always downcasts to its own type"),
        }
    }

    /// Returns the held value as `T`, or `None` if the blob holds something else.
    pub fn into_inner<T: Any>(self) -> Option<T> {
        self.inner
            .and_then(|(_, value)| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.meta() {
            Some(meta) => write!(f, "Blob({})", meta.name()),
            None => f.write_str("Blob(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_and_downcasts() {
        let mut blob = Blob::new(String::from("payload"));

        assert!(blob.is::<String>());
        assert!(!blob.is::<u32>());
        assert_eq!(blob.get::<String>().map(String::as_str), Some("payload"));

        blob.get_mut::<String>().unwrap().push('!');
        assert_eq!(blob.into_inner::<String>().unwrap(), "payload!");
    }

    #[test]
    fn empty_blob_has_no_meta() {
        let blob = Blob::empty();

        assert!(blob.is_empty());
        assert_eq!(blob.meta(), None);
        assert!(blob.get::<String>().is_none());
    }

    #[test]
    fn reset_replaces_type() {
        let mut blob = Blob::new(1u32);
        *blob.reset(String::new()) += "x";

        assert_eq!(blob.meta(), Some(TypeMeta::of::<String>()));
        assert_eq!(blob.get::<String>().unwrap(), "x");
    }
}
