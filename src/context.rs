use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::ops::Add;
use std::sync::Arc;

use crate::element::{Element, ElementRef};
use crate::key::{AnyKey, Key};

/// An immutable registry of context elements.
///
/// A context holds at most one element per key.  It is a persistent value:
/// every operation that "changes" it returns a new context which shares all
/// unchanged structure with the old one.  Contexts are cheap to clone and can
/// be shared freely between threads.
///
/// Internally a context is either empty, a single element, or a combined
/// node which attaches the most recently added element to the context that
/// was there before.  Lookups therefore walk from the newest element to the
/// oldest and extending a context is O(1) after the old occurrence of the
/// key has been removed.
///
/// Equality and hashing do not depend on the order in which elements were
/// added: two contexts are equal if they hold equal elements.
///
/// ## Example
///
/// ```
/// # #[macro_use] extern crate context_registry;
/// # use context_registry::{Context, Element, KeyRef};
/// # context_key!(static USER: Key<User>);
/// # context_key!(static LOCALE: Key<Locale>);
/// # #[derive(Debug, PartialEq, Hash)] struct User(&'static str);
/// # #[derive(Debug, PartialEq, Hash)] struct Locale(&'static str);
/// # impl Element for User { fn key(&self) -> KeyRef { KeyRef::of(&USER) } }
/// # impl Element for Locale { fn key(&self) -> KeyRef { KeyRef::of(&LOCALE) } }
/// # fn main() {
/// let ctx = Context::empty() + User("mitsuhiko") + Locale("de_DE");
/// assert_eq!(ctx.get(&USER), Some(&User("mitsuhiko")));
///
/// let other = ctx.plus(Locale("en_US"));
/// assert_eq!(other.get(&LOCALE), Some(&Locale("en_US")));
/// assert_eq!(ctx.get(&LOCALE), Some(&Locale("de_DE")));
/// assert_eq!(other.len(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct Context {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Empty,
    Single(ElementRef),
    Combined(Arc<Combined>),
}

/// `left` is never empty and holds no element under `element`'s key.
struct Combined {
    left: Context,
    element: ElementRef,
}

// Long chains would otherwise be dropped recursively.
impl Drop for Combined {
    fn drop(&mut self) {
        let mut left = mem::replace(&mut self.left, Context::empty());
        while let Repr::Combined(node) = left.repr {
            match Arc::try_unwrap(node) {
                Ok(mut node) => left = mem::replace(&mut node.left, Context::empty()),
                Err(_) => break,
            }
        }
    }
}

impl Context {
    /// Returns the empty context.
    ///
    /// All empty contexts are the same value, there is nothing allocated
    /// for them.
    pub const fn empty() -> Context {
        Context { repr: Repr::Empty }
    }

    fn combine(left: Context, element: ElementRef) -> Context {
        debug_assert!(!left.is_empty());
        Context {
            repr: Repr::Combined(Arc::new(Combined { left, element })),
        }
    }

    /// Checks if the context holds no elements.
    pub fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Empty)
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        let mut cur = self;
        let mut len = 0;
        loop {
            match cur.repr {
                Repr::Empty => return len,
                Repr::Single(_) => return len + 1,
                Repr::Combined(ref node) => {
                    len += 1;
                    cur = &node.left;
                }
            }
        }
    }

    /// Walks from the newest element to the oldest and returns the first
    /// non-`None` result of `probe`.
    fn find<'a, R, F>(&'a self, mut probe: F) -> Option<R>
    where
        F: FnMut(&'a ElementRef) -> Option<R>,
    {
        let mut cur = self;
        loop {
            match cur.repr {
                Repr::Empty => return None,
                Repr::Single(ref element) => return probe(element),
                Repr::Combined(ref node) => {
                    if let Some(rv) = probe(&node.element) {
                        return Some(rv);
                    }
                    cur = &node.left;
                }
            }
        }
    }

    /// Returns the element stored for a key.
    ///
    /// Covariant keys also find elements stored under their base key if
    /// their narrowing function accepts them.  The newest matching element
    /// wins.
    pub fn get<E: ?Sized + 'static>(&self, key: &Key<E>) -> Option<&E> {
        self.find(|element| key.resolve(element))
    }

    /// Returns the handle of the element a key resolves to.
    ///
    /// This is the same lookup as [`get`](Context::get) but yields the
    /// element handle so it can be added to another context.
    pub fn element<E: ?Sized + 'static>(&self, key: &Key<E>) -> Option<&ElementRef> {
        self.find(|element| key.resolve(element).map(|_| element))
    }

    /// Checks if any element is addressed by the key.
    pub fn contains_key<K: AnyKey + ?Sized>(&self, key: &K) -> bool {
        self.find(|element| key.matches(element).then_some(())).is_some()
    }

    /// Checks if the context holds an element equal to the given one under
    /// the element's own key.
    pub fn contains(&self, element: &ElementRef) -> bool {
        let key = element.key();
        self.find(|candidate| (candidate.key() == key).then_some(candidate))
            .map_or(false, |found| found == element)
    }

    /// Folds over all elements, oldest first.
    ///
    /// The traversal order is the insertion order of the elements and does
    /// not depend on how the context was composed.
    pub fn fold<R, F>(&self, initial: R, mut operation: F) -> R
    where
        F: FnMut(R, &ElementRef) -> R,
    {
        let mut stack = Vec::new();
        let mut cur = self;
        loop {
            match cur.repr {
                Repr::Empty => break,
                Repr::Single(ref element) => {
                    stack.push(element);
                    break;
                }
                Repr::Combined(ref node) => {
                    stack.push(&node.element);
                    cur = &node.left;
                }
            }
        }
        stack
            .into_iter()
            .rev()
            .fold(initial, |acc, element| operation(acc, element))
    }

    /// Returns all elements, oldest first.
    pub fn elements(&self) -> Vec<ElementRef> {
        self.fold(Vec::with_capacity(self.len()), |mut rv, element| {
            rv.push(element.clone());
            rv
        })
    }

    /// Merges another context into this one.
    ///
    /// The elements of `other` are added in their insertion order and
    /// replace elements of this context stored under the same key.
    pub fn plus<C: Into<Context>>(&self, other: C) -> Context {
        let other = other.into();
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other;
        }
        other.fold(self.clone(), |acc, element| {
            let removed = acc.minus_key(&element.key());
            if removed.is_empty() {
                Context::from(element.clone())
            } else {
                Context::combine(removed, element.clone())
            }
        })
    }

    /// Returns a context without the element addressed by `key`.
    ///
    /// If no element is addressed the returned context shares its
    /// representation with this one (see [`ptr_eq`](Context::ptr_eq)).
    pub fn minus_key<K: AnyKey + ?Sized>(&self, key: &K) -> Context {
        self.without(key).unwrap_or_else(|| self.clone())
    }

    /// `None` means nothing was removed.
    fn without<K: AnyKey + ?Sized>(&self, key: &K) -> Option<Context> {
        // elements newer than the removed one, newest first
        let mut newer = Vec::new();
        let mut cur = self;
        let rest = loop {
            match cur.repr {
                Repr::Empty => return None,
                Repr::Single(ref element) => {
                    if key.matches(element) {
                        break Context::empty();
                    }
                    return None;
                }
                Repr::Combined(ref node) => {
                    if key.matches(&node.element) {
                        break node.left.clone();
                    }
                    newer.push(&node.element);
                    cur = &node.left;
                }
            }
        };
        Some(newer.into_iter().rev().fold(rest, |acc, element| {
            if acc.is_empty() {
                Context::from(element.clone())
            } else {
                Context::combine(acc, element.clone())
            }
        }))
    }

    /// Checks if both contexts share the same representation.
    ///
    /// This is identity, not equality: equal contexts built independently
    /// are not `ptr_eq`.  Empty contexts always are.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        match (&self.repr, &other.repr) {
            (&Repr::Empty, &Repr::Empty) => true,
            (&Repr::Single(ref a), &Repr::Single(ref b)) => a.ptr_eq(b),
            (&Repr::Combined(ref a), &Repr::Combined(ref b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Sum of the element hashes.
    fn hash_code(&self) -> u64 {
        self.fold(0u64, |acc, element| acc.wrapping_add(element.hash_code()))
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::empty()
    }
}

impl From<ElementRef> for Context {
    fn from(element: ElementRef) -> Context {
        Context {
            repr: Repr::Single(element),
        }
    }
}

impl<T: Element + PartialEq + Hash> From<T> for Context {
    fn from(element: T) -> Context {
        Context::from(ElementRef::new(element))
    }
}

impl<'a> From<&'a Context> for Context {
    fn from(context: &'a Context) -> Context {
        context.clone()
    }
}

impl<C: Into<Context>> Add<C> for Context {
    type Output = Context;

    fn add(self, other: C) -> Context {
        self.plus(other)
    }
}

impl<'a, C: Into<Context>> Add<C> for &'a Context {
    type Output = Context;

    fn add(self, other: C) -> Context {
        self.plus(other)
    }
}

/// Rebuilds a context from a sequence of elements.
///
/// Later elements win over earlier ones with the same key.
impl FromIterator<ElementRef> for Context {
    fn from_iter<I: IntoIterator<Item = ElementRef>>(iter: I) -> Context {
        iter.into_iter()
            .fold(Context::empty(), |acc, element| acc.plus(element))
    }
}

impl Extend<ElementRef> for Context {
    fn extend<I: IntoIterator<Item = ElementRef>>(&mut self, iter: I) {
        for element in iter {
            *self = self.plus(element);
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Context) -> bool {
        match (&self.repr, &other.repr) {
            (&Repr::Empty, &Repr::Empty) => true,
            (&Repr::Single(ref a), &Repr::Single(ref b)) => a == b,
            (&Repr::Combined(ref a), &Repr::Combined(ref b)) => {
                Arc::ptr_eq(a, b)
                    || (self.len() == other.len()
                        && self
                            .find(|element| (!other.contains(element)).then_some(()))
                            .is_none())
            }
            _ => false,
        }
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.elements()).finish()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.repr {
            Repr::Empty => f.write_str("EmptyContext"),
            Repr::Single(ref element) => fmt::Display::fmt(element, f),
            Repr::Combined(_) => {
                f.write_str("[")?;
                for (idx, element) in self.elements().iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    fmt::Display::fmt(element, f)?;
                }
                f.write_str("]")
            }
        }
    }
}
