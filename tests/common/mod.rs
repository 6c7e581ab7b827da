#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use context_registry::{Element, Key, KeyRef};

context_key!(pub static NAME: Key<Name>);
context_key!(pub static REQUEST_ID: Key<RequestId>);
context_key!(pub static ATTEMPT: Key<Attempt>);
context_key!(pub static DEADLINE: Key<Deadline>);
context_key!(pub static LOCALE: Key<Locale>);

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Name(pub &'static str);

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Attempt(pub u32);

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Deadline(pub u64);

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Locale(pub &'static str);

impl Element for Name {
    fn key(&self) -> KeyRef {
        KeyRef::of(&NAME)
    }
}

impl Element for RequestId {
    fn key(&self) -> KeyRef {
        KeyRef::of(&REQUEST_ID)
    }
}

impl Element for Attempt {
    fn key(&self) -> KeyRef {
        KeyRef::of(&ATTEMPT)
    }
}

impl Element for Deadline {
    fn key(&self) -> KeyRef {
        KeyRef::of(&DEADLINE)
    }
}

impl Element for Locale {
    fn key(&self) -> KeyRef {
        KeyRef::of(&LOCALE)
    }
}

/// One key per slot, all addressing `Tag` elements.
pub static SLOTS: [Key<Tag>; 4] = [
    Key::new("slot0"),
    Key::new("slot1"),
    Key::new("slot2"),
    Key::new("slot3"),
];

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Tag {
    pub slot: usize,
    pub value: u8,
}

impl Element for Tag {
    fn key(&self) -> KeyRef {
        KeyRef::of(&SLOTS[self.slot])
    }
}

pub fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
