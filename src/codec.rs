//! Serialization of contexts.
//!
//! A context is serialized as the sequence of its elements, oldest first,
//! never as the shape of its internal tree.  Restoring folds the elements
//! back into the empty context, so the restored context is equal to the
//! original even if it is laid out differently, and a sequence that names
//! the same key twice resolves to the later element.
//!
//! Elements are type erased, so a [`Codec`] needs to know for each element
//! type how to turn it into a value and back.  Element types are identified
//! on the wire by the name they were registered with, which defaults to the
//! name of their key.
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::element::{Element, ElementRef};
use crate::key::{Key, KeyRef};

/// Errors raised while encoding or decoding contexts.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Two element types were registered under the same name.
    #[error("duplicate key name: {name}")]
    DuplicateName { name: &'static str },
    /// An element type was registered twice.
    #[error("element type {type_name} is already registered")]
    DuplicateType { type_name: &'static str },
    /// An element's key was never registered.
    #[error("no codec registered for key {name}")]
    Unregistered { name: &'static str },
    /// The element stored under a registered key is of a type that was
    /// never registered.
    #[error("element under key {name} is not of the registered type")]
    TypeMismatch { name: &'static str },
    /// A snapshot names a key that was never registered.
    #[error("unknown key name: {name}")]
    UnknownName { name: String },
    /// An element could not be serialized.
    #[error("failed to encode element under key {name}: {source}")]
    Encode {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// An element could not be deserialized.
    #[error("failed to decode element under key {name}: {source}")]
    Decode {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// The snapshot document itself is malformed.
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

/// One serialized element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Name of the key the element is stored under.
    pub key: String,
    /// The serialized element.
    pub value: Value,
}

/// The serialized form of a context: its elements in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<Record>,
}

impl Snapshot {
    /// Returns the serialized elements, oldest first.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Appends a serialized element.
    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.records.push(Record {
            key: key.into(),
            value,
        });
    }

    /// Returns the number of serialized elements.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks if the snapshot holds no elements.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders the snapshot as JSON.
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a snapshot from JSON.
    pub fn from_json(s: &str) -> Result<Snapshot, CodecError> {
        Ok(serde_json::from_str(s)?)
    }
}

type EncodeFn = fn(&ElementRef) -> Option<Result<Value, serde_json::Error>>;
type DecodeFn = fn(Value) -> Result<ElementRef, serde_json::Error>;

struct Entry {
    name: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

fn encode_as<T: Any + Serialize>(element: &ElementRef) -> Option<Result<Value, serde_json::Error>> {
    element.downcast_ref::<T>().map(serde_json::to_value)
}

fn decode_as<T>(value: Value) -> Result<ElementRef, serde_json::Error>
where
    T: Element + PartialEq + Hash + DeserializeOwned,
{
    serde_json::from_value::<T>(value).map(ElementRef::new)
}

/// Encodes contexts into snapshots and restores them.
///
/// Every concrete element type is registered once, under a wire name.
/// Members of an element family are stored under the family's base key and
/// are registered one by one, either through their covariant key or with
/// [`Codec::register_as`].
///
/// ## Example
///
/// ```
/// # #[macro_use] extern crate context_registry;
/// # use context_registry::{Codec, Context, Element, KeyRef};
/// # use serde::{Deserialize, Serialize};
/// # context_key!(static TENANT: Key<Tenant>);
/// # #[derive(Debug, PartialEq, Hash, Serialize, Deserialize)] struct Tenant(String);
/// # impl Element for Tenant { fn key(&self) -> KeyRef { KeyRef::of(&TENANT) } }
/// # fn main() -> Result<(), context_registry::CodecError> {
/// let mut codec = Codec::new();
/// codec.register(&TENANT)?;
///
/// let ctx = Context::from(Tenant("acme".into()));
/// let json = codec.to_json(&ctx)?;
/// assert_eq!(json, r#"[{"key":"TENANT","value":"acme"}]"#);
/// assert_eq!(codec.from_json(&json)?, ctx);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Codec {
    entries: HashMap<&'static str, Entry>,
    types: HashMap<TypeId, &'static str>,
    keys: HashSet<KeyRef>,
}

impl Codec {
    /// Creates a codec without any registered keys.
    pub fn new() -> Codec {
        Codec::default()
    }

    /// Registers the element type of a key under the key's name.
    ///
    /// For a covariant key the elements may be stored under its base key,
    /// which is then also considered registered.
    pub fn register<T>(&mut self, key: &'static Key<T>) -> Result<&mut Codec, CodecError>
    where
        T: Element + PartialEq + Hash + Serialize + DeserializeOwned,
    {
        self.register_as::<T, T>(key, key.name())?;
        if let Some(top_most) = key.top_most() {
            self.keys.insert(top_most);
        }
        Ok(self)
    }

    /// Registers the element type `T` stored under `key` with an explicit
    /// wire name.
    ///
    /// This is how members of a family without a covariant key of their
    /// own are registered under the family's base key.
    pub fn register_as<T, E>(
        &mut self,
        key: &'static Key<E>,
        name: &'static str,
    ) -> Result<&mut Codec, CodecError>
    where
        T: Element + PartialEq + Hash + Serialize + DeserializeOwned,
        E: ?Sized + 'static,
    {
        if self.entries.contains_key(name) {
            return Err(CodecError::DuplicateName { name });
        }
        if self.types.contains_key(&TypeId::of::<T>()) {
            return Err(CodecError::DuplicateType {
                type_name: type_name::<T>(),
            });
        }
        self.types.insert(TypeId::of::<T>(), name);
        self.keys.insert(KeyRef::of(key));
        self.entries.insert(
            name,
            Entry {
                name,
                encode: encode_as::<T>,
                decode: decode_as::<T>,
            },
        );
        Ok(self)
    }

    /// Checks if elements stored under the key can be encoded.
    pub fn is_registered(&self, key: KeyRef) -> bool {
        self.keys.contains(&key)
    }

    /// Decomposes a context into a snapshot.
    pub fn encode(&self, context: &Context) -> Result<Snapshot, CodecError> {
        let mut snapshot = Snapshot::default();
        for element in context.elements() {
            let entry = match self.types.get(&element.as_any().type_id()) {
                Some(name) => &self.entries[name],
                None => {
                    let key = element.key();
                    return Err(if self.keys.contains(&key) {
                        CodecError::TypeMismatch { name: key.name() }
                    } else {
                        CodecError::Unregistered { name: key.name() }
                    });
                }
            };
            let value = (entry.encode)(&element)
                .ok_or(CodecError::TypeMismatch { name: entry.name })?
                .map_err(|source| CodecError::Encode {
                    name: entry.name,
                    source,
                })?;
            snapshot.push(entry.name, value);
        }
        tracing::trace!(elements = snapshot.len(), "encoded context");
        Ok(snapshot)
    }

    /// Restores a context from a snapshot.
    ///
    /// An empty snapshot restores the empty context.  If a key appears more
    /// than once the later element wins.
    pub fn decode(&self, snapshot: Snapshot) -> Result<Context, CodecError> {
        let mut context = Context::empty();
        for record in snapshot.records {
            let entry = self
                .entries
                .get(record.key.as_str())
                .ok_or_else(|| CodecError::UnknownName {
                    name: record.key.clone(),
                })?;
            let element = (entry.decode)(record.value).map_err(|source| CodecError::Decode {
                name: entry.name,
                source,
            })?;
            if context.contains_key(&element.key()) {
                tracing::debug!(key = entry.name, "snapshot repeats key, later element wins");
            }
            context = context.plus(element);
        }
        tracing::trace!(elements = context.len(), "decoded context");
        Ok(context)
    }

    /// Encodes a context as JSON.
    pub fn to_json(&self, context: &Context) -> Result<String, CodecError> {
        self.encode(context)?.to_json()
    }

    /// Restores a context from JSON.
    pub fn from_json(&self, s: &str) -> Result<Context, CodecError> {
        self.decode(Snapshot::from_json(s)?)
    }
}
