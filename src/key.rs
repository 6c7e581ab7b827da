use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::element::ElementRef;

/// Narrows a type erased element to the element type a key addresses.
///
/// Returns `None` if the element is not of that type.
pub type Narrow<E> = for<'a> fn(&'a dyn Any) -> Option<&'a E>;

fn downcast<E: Any>(element: &dyn Any) -> Option<&E> {
    element.downcast_ref::<E>()
}

mod private {
    pub trait Sealed {}
}

/// A key with its element type erased.
///
/// This is implemented by [`Key`] and [`KeyRef`] and is what removal and
/// containment checks accept, as they never need the typed element.
pub trait AnyKey: private::Sealed + Send + Sync + 'static {
    /// The name the key was declared with.
    fn name(&self) -> &'static str;

    /// Checks if the element is addressed by this key.
    ///
    /// For plain keys this is identity of the element's key.  Covariant keys
    /// additionally require their narrowing function to accept the element.
    fn matches(&self, element: &ElementRef) -> bool;

    #[doc(hidden)]
    fn identity(&self) -> *const () {
        self as *const Self as *const ()
    }
}

/// Names one slot in a [`Context`](crate::Context).
///
/// Keys are compared by identity: two keys are the same slot if and only if
/// they are the same object.  Keys are therefore declared as statics, usually
/// with the [`context_key!`] macro.
///
/// A key is either plain or covariant.  A covariant key is substitutable
/// for a base key: it finds elements stored under itself or under the
/// top-most plain key of its base chain, as long as its narrowing function
/// accepts them.
pub struct Key<E: ?Sized> {
    name: &'static str,
    top_most: Option<KeyRef>,
    narrow: Narrow<E>,
}

impl<E: Any> Key<E> {
    /// Creates a plain key for a concrete element type.
    pub const fn new(name: &'static str) -> Key<E> {
        Key {
            name,
            top_most: None,
            narrow: downcast::<E>,
        }
    }
}

impl<E: ?Sized + 'static> Key<E> {
    /// Creates a plain key with a custom cast.
    ///
    /// This is used for base keys of element families where `E` is a trait
    /// object type implemented by several concrete elements.
    pub const fn with_cast(name: &'static str, cast: Narrow<E>) -> Key<E> {
        Key {
            name,
            top_most: None,
            narrow: cast,
        }
    }

    /// Creates a covariant key derived from `base`.
    ///
    /// If `base` is itself covariant its top-most key is reused, so lookups
    /// never walk a chain of keys.  The narrowing function must only accept
    /// elements that are legitimately addressed by this key; a key that
    /// claims elements it cannot narrow is simply never matched by them.
    pub fn covariant<K: ?Sized + 'static>(
        name: &'static str,
        base: &'static Key<K>,
        narrow: Narrow<E>,
    ) -> Key<E> {
        Key {
            name,
            top_most: Some(base.top_most.unwrap_or_else(|| KeyRef::of(base))),
            narrow,
        }
    }

    /// Returns the name of the key.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks if this key was created by [`Key::covariant`].
    pub fn is_covariant(&self) -> bool {
        self.top_most.is_some()
    }

    /// Returns the outermost plain key a covariant key stands in for.
    pub fn top_most(&self) -> Option<KeyRef> {
        self.top_most
    }

    /// Checks if an element stored under `key` may be addressed by this key.
    pub fn is_sub_key(&self, key: KeyRef) -> bool {
        key.is(self) || self.top_most == Some(key)
    }

    /// Returns the element typed as `E` if this key addresses it.
    ///
    /// An element that is addressed by key identity but rejected by the
    /// narrowing function is not found.
    pub fn resolve<'a>(&self, element: &'a ElementRef) -> Option<&'a E> {
        if self.is_sub_key(element.key()) {
            (self.narrow)(element.as_any())
        } else {
            None
        }
    }
}

impl<E: ?Sized> private::Sealed for Key<E> {}

impl<E: ?Sized + 'static> AnyKey for Key<E> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn matches(&self, element: &ElementRef) -> bool {
        match self.top_most {
            None => element.key().is(self),
            Some(_) => self.resolve(element).is_some(),
        }
    }
}

impl<E: ?Sized> fmt::Debug for Key<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("Key");
        s.field("name", &self.name);
        if let Some(top_most) = self.top_most {
            s.field("top_most", &top_most.name());
        }
        s.finish()
    }
}

/// A copyable reference to a static key with its element type erased.
///
/// This is what elements hand out as their own key.  Equality and hashing
/// are by identity of the referenced key.
#[derive(Clone, Copy)]
pub struct KeyRef(&'static dyn AnyKey);

impl KeyRef {
    /// Erases the element type of a static key.
    pub fn of<E: ?Sized + 'static>(key: &'static Key<E>) -> KeyRef {
        KeyRef(key)
    }

    /// Returns the name of the referenced key.
    pub fn name(self) -> &'static str {
        self.0.name()
    }

    /// Checks if this refers to the given key object.
    pub fn is<K: AnyKey + ?Sized>(self, key: &K) -> bool {
        self.0.identity() == key.identity()
    }
}

impl private::Sealed for KeyRef {}

impl AnyKey for KeyRef {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn matches(&self, element: &ElementRef) -> bool {
        self.0.matches(element)
    }

    fn identity(&self) -> *const () {
        self.0.identity()
    }
}

impl PartialEq for KeyRef {
    fn eq(&self, other: &KeyRef) -> bool {
        self.0.identity() == other.0.identity()
    }
}

impl Eq for KeyRef {}

impl Hash for KeyRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.identity().hash(state)
    }
}

impl fmt::Debug for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyRef({})", self.name())
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
