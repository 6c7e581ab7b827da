//! This crate implements an immutable registry of context elements for Rust.
//! A context carries cross-cutting state (cancellation handles, correlation
//! identifiers, interceptors and the like) through a logical flow of
//! execution.
//!
//! A [`Context`] is an immutable, structurally shared set of elements, each
//! stored under a [`Key`].  Adding an element returns a new context which
//! shares everything else with the old one, so contexts can be passed along
//! chains of computation and across threads without copying or locking.
//!
//! The main properties:
//!
//! *   Keys are compared by identity.  They are declared as statics with the
//!     [`context_key!`] macro and carry the type of the element they address,
//!     so lookups are typed.
//! *   A context holds at most one element per key.  Merging contexts is
//!     right biased: elements added later replace earlier ones.
//! *   Covariant keys let a family of related element types be looked up both
//!     by their own key and by a shared base key.
//! *   Equality and hashing do not depend on insertion order.
//! *   With the `codec` feature contexts can be serialized as the sequence of
//!     their elements and restored to an equal context.
//! *   [`ExecutionContext`] keeps a current context per thread which can be
//!     captured and carried into other threads.
//!
//! # Example Usage
//!
//! ```
//! #[macro_use]
//! extern crate context_registry;
//!
//! use context_registry::{Context, Element, KeyRef};
//!
//! context_key!(static REQUEST_ID: Key<RequestId>);
//! context_key!(static LOCALE: Key<Locale>);
//!
//! #[derive(Debug, PartialEq, Hash)]
//! struct RequestId(u64);
//!
//! #[derive(Debug, PartialEq, Hash)]
//! struct Locale(String);
//!
//! impl Element for RequestId {
//!     fn key(&self) -> KeyRef {
//!         KeyRef::of(&REQUEST_ID)
//!     }
//! }
//!
//! impl Element for Locale {
//!     fn key(&self) -> KeyRef {
//!         KeyRef::of(&LOCALE)
//!     }
//! }
//!
//! fn main() {
//!     let ctx = Context::empty() + RequestId(1) + Locale("en_US".into());
//!     assert_eq!(ctx.get(&REQUEST_ID), Some(&RequestId(1)));
//!
//!     let ctx = ctx + RequestId(2);
//!     assert_eq!(ctx.len(), 2);
//!     assert_eq!(ctx.to_string(), "[Locale(\"en_US\"), RequestId(2)]");
//!
//!     let ctx = ctx.minus_key(&LOCALE);
//!     assert_eq!(ctx.get(&LOCALE), None);
//!     assert_eq!(ctx.to_string(), "RequestId(2)");
//! }
//! ```
//!
//! # Covariant Keys
//!
//! A base key for a family of elements is declared with a cast to the
//! family's trait object type.  Members of the family can then declare a
//! covariant key which narrows to their own type:
//!
//! ```
//! #[macro_use]
//! extern crate context_registry;
//!
//! use std::any::Any;
//! use context_registry::{Context, Element, KeyRef};
//!
//! trait Interceptor: Send + Sync {
//!     fn label(&self) -> &str;
//! }
//!
//! #[derive(Debug, PartialEq, Hash)]
//! struct Tracing;
//!
//! impl Interceptor for Tracing {
//!     fn label(&self) -> &str {
//!         "tracing"
//!     }
//! }
//!
//! impl Element for Tracing {
//!     fn key(&self) -> KeyRef {
//!         KeyRef::of(&INTERCEPTOR)
//!     }
//! }
//!
//! fn as_interceptor(element: &dyn Any) -> Option<&(dyn Interceptor + 'static)> {
//!     let tracing: &Tracing = element.downcast_ref()?;
//!     Some(tracing)
//! }
//!
//! fn as_tracing(element: &dyn Any) -> Option<&Tracing> {
//!     element.downcast_ref::<Tracing>()
//! }
//!
//! context_key!(static INTERCEPTOR: Key<dyn Interceptor> = cast(as_interceptor));
//! context_key!(static TRACING: Key<Tracing> = covariant(INTERCEPTOR, as_tracing));
//!
//! fn main() {
//!     let ctx = Context::from(Tracing);
//!     assert_eq!(ctx.get(&INTERCEPTOR).map(|x| x.label()), Some("tracing"));
//!     assert_eq!(ctx.get(&*TRACING), Some(&Tracing));
//!     assert!(ctx.minus_key(&*TRACING).is_empty());
//! }
//! ```
#[doc(hidden)]
pub extern crate lazy_static;

#[cfg(feature = "codec")]
mod codec;
mod context;
mod ctx;
mod element;
mod key;

#[cfg(feature = "codec")]
pub use codec::*;
pub use context::*;
pub use ctx::*;
pub use element::*;
pub use key::*;

/// Declares a static context key.
///
/// The key is named after the static.  Three forms are supported:
///
/// * `context_key!(static NAME: Key<T>);` declares a plain key for the
///   element type `T`.
/// * `context_key!(static NAME: Key<dyn Family> = cast(func));` declares a
///   plain key whose lookups go through `func`, used for base keys of
///   element families.
/// * `context_key!(static NAME: Key<T> = covariant(BASE, func));` declares a
///   covariant key derived from `BASE` that narrows with `func`.  These keys
///   are initialized lazily and dereference to the key, use `&*NAME`.
///
/// ## Example
///
/// ```
/// # #[macro_use] extern crate context_registry;
/// # use std::any::Any;
/// # pub trait Limit: Send + Sync {}
/// # #[derive(Debug, PartialEq, Hash)] pub struct Deadline(u64);
/// # impl Limit for Deadline {}
/// # fn as_limit(element: &dyn Any) -> Option<&(dyn Limit + 'static)> {
/// #     let deadline: &Deadline = element.downcast_ref()?;
/// #     Some(deadline)
/// # }
/// # fn as_deadline(element: &dyn Any) -> Option<&Deadline> { element.downcast_ref() }
/// context_key!(pub static DEADLINE: Key<Deadline>);
/// context_key!(static LIMIT: Key<dyn Limit> = cast(as_limit));
/// context_key!(pub static SOFT_DEADLINE: Key<Deadline> = covariant(LIMIT, as_deadline));
///
/// # fn main() {
/// assert_eq!(DEADLINE.name(), "DEADLINE");
/// assert!(!LIMIT.is_covariant());
/// assert_eq!(SOFT_DEADLINE.name(), "SOFT_DEADLINE");
/// assert!(SOFT_DEADLINE.is_sub_key(context_registry::KeyRef::of(&LIMIT)));
/// # }
/// ```
#[macro_export]
macro_rules! context_key {
    ($(#[$attr:meta])* static $name:ident: Key<$t:ty> = covariant($base:expr, $narrow:expr)$(;)?) => {
        $crate::lazy_static::lazy_static! {
            $(#[$attr])*
            static ref $name: $crate::Key<$t> =
                $crate::Key::covariant(stringify!($name), &$base, $narrow);
        }
    };
    ($(#[$attr:meta])* pub static $name:ident: Key<$t:ty> = covariant($base:expr, $narrow:expr)$(;)?) => {
        $crate::lazy_static::lazy_static! {
            $(#[$attr])*
            pub static ref $name: $crate::Key<$t> =
                $crate::Key::covariant(stringify!($name), &$base, $narrow);
        }
    };
    ($(#[$attr:meta])* $vis:vis static $name:ident: Key<$t:ty> = cast($cast:expr)$(;)?) => {
        $(#[$attr])*
        $vis static $name: $crate::Key<$t> = $crate::Key::with_cast(stringify!($name), $cast);
    };
    ($(#[$attr:meta])* $vis:vis static $name:ident: Key<$t:ty>$(;)?) => {
        $(#[$attr])*
        $vis static $name: $crate::Key<$t> = $crate::Key::new(stringify!($name));
    };
}
