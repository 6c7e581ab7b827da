use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::context::Context;
use crate::key::{AnyKey, Key, KeyRef};

/// A value stored in a [`Context`] under exactly one key.
///
/// Elements are immutable.  To be stored they also need value equality and
/// a hash consistent with it, which is why [`ElementRef::new`] and the
/// conversions into a context require `PartialEq + Hash` on top of this
/// trait.  Those bounds are kept off the trait itself so element families
/// can be addressed through trait objects.
///
/// ## Example
///
/// ```
/// # #[macro_use] extern crate context_registry;
/// use context_registry::{Element, KeyRef};
///
/// context_key!(static TRACE_ID: Key<TraceId>);
///
/// #[derive(Debug, PartialEq, Hash)]
/// struct TraceId(u64);
///
/// impl Element for TraceId {
///     fn key(&self) -> KeyRef {
///         KeyRef::of(&TRACE_ID)
///     }
/// }
/// # fn main() {}
/// ```
pub trait Element: Any + Send + Sync + fmt::Debug {
    /// The key this element is stored under.
    fn key(&self) -> KeyRef;
}

trait DynElement: Send + Sync {
    fn key(&self) -> KeyRef;
    fn as_any(&self) -> &dyn Any;
    fn eq_element(&self, other: &dyn Any) -> bool;
    fn hash_element(&self) -> u64;
    fn fmt_element(&self, f: &mut fmt::Formatter) -> fmt::Result;
}

impl<T: Element + PartialEq + Hash> DynElement for T {
    fn key(&self) -> KeyRef {
        Element::key(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_element(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().map_or(false, |other| self == other)
    }

    fn hash_element(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn fmt_element(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A shared, type erased handle to an element.
///
/// Cloning the handle is cheap.  Two handles are equal if the elements they
/// point to are of the same type and compare equal.
#[derive(Clone)]
pub struct ElementRef(Arc<dyn DynElement>);

impl ElementRef {
    /// Wraps an element.
    pub fn new<T: Element + PartialEq + Hash>(element: T) -> ElementRef {
        ElementRef(Arc::new(element))
    }

    /// Returns the key the element is stored under.
    pub fn key(&self) -> KeyRef {
        self.0.key()
    }

    /// Returns the element if it is of type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Looks the element up by key, honoring covariant keys.
    pub fn get<E: ?Sized + 'static>(&self, key: &Key<E>) -> Option<&E> {
        key.resolve(self)
    }

    /// Removes the element if `key` addresses it.
    ///
    /// Returns the empty context on a match and a context holding just this
    /// element otherwise.
    pub fn minus_key<K: AnyKey + ?Sized>(&self, key: &K) -> Context {
        if key.matches(self) {
            Context::empty()
        } else {
            Context::from(self.clone())
        }
    }

    /// Checks if both handles point to the same allocation.
    pub fn ptr_eq(&self, other: &ElementRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        self.0.as_any()
    }

    pub(crate) fn hash_code(&self) -> u64 {
        self.0.hash_element()
    }
}

impl<T: Element + PartialEq + Hash> From<T> for ElementRef {
    fn from(element: T) -> ElementRef {
        ElementRef::new(element)
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &ElementRef) -> bool {
        self.ptr_eq(other) || self.0.eq_element(other.0.as_any())
    }
}

impl Eq for ElementRef {}

impl Hash for ElementRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code())
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt_element(f)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt_element(f)
    }
}
