#[macro_use]
extern crate context_registry;

mod common;

use common::{hash_of, Tag, SLOTS};
use context_registry::{Context, ElementRef};
use proptest::prelude::*;

/// A sequence of writes, each one setting a slot to a value.
fn arb_writes() -> impl Strategy<Value = Vec<(usize, u8)>> {
    prop::collection::vec((0..SLOTS.len(), any::<u8>()), 0..16)
}

fn build(writes: &[(usize, u8)]) -> Context {
    writes.iter().fold(Context::empty(), |ctx, &(slot, value)| {
        ctx.plus(Tag { slot, value })
    })
}

/// The final value of every slot, ordered by the slot's last write.
fn last_writes(writes: &[(usize, u8)]) -> Vec<(usize, u8)> {
    let mut rv: Vec<(usize, u8)> = Vec::new();
    for &(slot, value) in writes {
        rv.retain(|&(s, _)| s != slot);
        rv.push((slot, value));
    }
    rv
}

proptest! {
    /// Merging with the empty context changes nothing.
    #[test]
    fn prop_identity_laws(writes in arb_writes()) {
        let ctx = build(&writes);
        prop_assert_eq!(&Context::empty().plus(&ctx), &ctx);
        prop_assert_eq!(&ctx.plus(Context::empty()), &ctx);
    }

    /// Every slot holds its last written value and nothing else is stored.
    #[test]
    fn prop_last_write_wins(writes in arb_writes()) {
        let ctx = build(&writes);
        let expected = last_writes(&writes);
        prop_assert_eq!(ctx.len(), expected.len());
        for slot in 0..SLOTS.len() {
            let want = expected.iter().find(|&&(s, _)| s == slot).map(|&(_, value)| Tag { slot, value });
            prop_assert_eq!(ctx.get(&SLOTS[slot]), want.as_ref());
        }
    }

    /// Folding visits elements in the order of their last write.
    #[test]
    fn prop_fold_order(writes in arb_writes()) {
        let ctx = build(&writes);
        let seen = ctx.fold(Vec::new(), |mut rv, element| {
            let tag = element.downcast_ref::<Tag>().unwrap();
            rv.push((tag.slot, tag.value));
            rv
        });
        prop_assert_eq!(seen, last_writes(&writes));
    }

    /// Insertion order does not matter for equality and hashing.
    #[test]
    fn prop_order_independent_equality(writes in arb_writes()) {
        let ctx = build(&writes);
        let mut reversed = last_writes(&writes);
        reversed.reverse();
        let other = build(&reversed);
        prop_assert_eq!(&ctx, &other);
        prop_assert_eq!(hash_of(&ctx), hash_of(&other));
    }

    /// Rebuilding from the element sequence yields an equal context.
    #[test]
    fn prop_round_trip(writes in arb_writes()) {
        let ctx = build(&writes);
        let rebuilt: Context = ctx.elements().into_iter().collect();
        prop_assert_eq!(&rebuilt, &ctx);
        let folded = ctx.fold(Context::empty(), |acc, element| acc.plus(element.clone()));
        prop_assert_eq!(&folded, &ctx);
    }

    /// Removing a key and adding its element back restores the context.
    #[test]
    fn prop_removal_inverse(writes in arb_writes(), slot in 0..SLOTS.len()) {
        let ctx = build(&writes);
        let key = &SLOTS[slot];
        let removed = ctx.minus_key(key);
        prop_assert_eq!(removed.get(key), None);
        match ctx.element(key).cloned() {
            Some(element) => {
                prop_assert_eq!(removed.len(), ctx.len() - 1);
                prop_assert_eq!(&removed.plus(element), &ctx);
            }
            None => prop_assert!(removed.ptr_eq(&ctx)),
        }
    }

    /// Merging is right biased and keeps every key from both sides.
    #[test]
    fn prop_merge(left in arb_writes(), right in arb_writes()) {
        let merged = build(&left).plus(build(&right));
        let mut all = left.clone();
        all.extend(right.iter().cloned());
        prop_assert_eq!(&merged, &build(&all));
        for &(slot, value) in &last_writes(&right) {
            prop_assert_eq!(merged.get(&SLOTS[slot]), Some(&Tag { slot, value }));
        }
    }

    /// Two contexts are equal exactly when they hold the same elements.
    #[test]
    fn prop_equality_matches_contents(left in arb_writes(), right in arb_writes()) {
        let a = build(&left);
        let b = build(&right);
        let mut want_a: Vec<ElementRef> = a.elements();
        let mut want_b: Vec<ElementRef> = b.elements();
        want_a.sort_by_key(|x| x.key().name());
        want_b.sort_by_key(|x| x.key().name());
        prop_assert_eq!(a == b, want_a == want_b);
    }
}
