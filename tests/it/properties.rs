//! Properties of the comparator, allocator, store and diff engine

use crate::helpers::deliver;
use cotext_core::crdt::text::{CharacterStore, Operation, Position, PositionAllocator, TextReplica};
use proptest::prelude::*;
use std::cmp::Ordering;

/// Strategy for arbitrary positions, including negative digits and shared paths
fn arb_position() -> impl Strategy<Value = Position> {
    (
        prop::collection::vec(-5i64..40, 1..4),
        prop::sample::select(vec!["a", "b", "c"]),
        0u64..4,
    )
        .prop_map(|(path, site, clock)| Position::new(path, site.to_string(), clock))
}

/// Strategy for short texts mixing ASCII and multi-codepoint graphemes
///
/// Includes pieces that join with their neighbours: line breaks, a lone
/// combining mark and halves of a flag.
fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            "a",
            "b",
            "c",
            " ",
            "\u{e9}",
            "e\u{301}",
            "\u{1F44D}",
            "\r",
            "\n",
            "\u{301}",
            "\u{1F1EB}",
            "\u{1F1F7}",
        ]),
        0..12,
    )
    .prop_map(|graphemes| graphemes.concat())
}

/// Replica holding `text` as one character per code point, the way a peer
/// typing piece by piece ends up storing it
fn typed_per_char(site_id: &str, text: &str) -> (TextReplica, Vec<Operation>) {
    let mut replica = TextReplica::new(site_id.to_string());
    let mut ops = Vec::new();
    let mut typed = String::new();
    for c in text.chars() {
        typed.push(c);
        ops.extend(replica.local_edit(&typed));
    }
    (replica, ops)
}

/// Apply in the given order, holding back deletes whose insert has not arrived
fn apply_causally(store: &mut CharacterStore, ops: &[&Operation]) {
    let mut deferred = Vec::new();
    for op in ops {
        if let Operation::Delete(delete) = op {
            if !store.contains(&delete.char_id) {
                deferred.push(*op);
                continue;
            }
        }
        store.apply(op);
    }
    for op in deferred {
        store.apply(op);
    }
}

proptest! {
    /// Antisymmetry and agreement with equality
    #[test]
    fn comparator_is_antisymmetric(a in arb_position(), b in arb_position()) {
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        prop_assert_eq!(a.cmp(&b) == Ordering::Equal, a == b);
    }

    /// Transitivity
    #[test]
    fn comparator_is_transitive(a in arb_position(), b in arb_position(), c in arb_position()) {
        if a <= b && b <= c {
            prop_assert!(a <= c);
        }
    }

    /// A generated position falls strictly between distinct neighbours
    #[test]
    fn allocator_is_dense(p in arb_position(), q in arb_position()) {
        prop_assume!(p.path != q.path);
        let (lo, hi) = if p < q { (p, q) } else { (q, p) };

        let mut alloc = PositionAllocator::new("m".to_string());
        let mid = alloc.generate_between(Some(&lo), Some(&hi));
        prop_assert!(lo < mid, "{} !< {}", lo, mid);
        prop_assert!(mid < hi, "{} !< {}", mid, hi);

        let before = alloc.generate_between(None, Some(&lo));
        prop_assert!(before < lo);
        let after = alloc.generate_between(Some(&hi), None);
        prop_assert!(hi < after);
    }

    /// Same operations in any causal order yield the same text
    #[test]
    fn store_converges_under_reordering(
        edits in prop::collection::vec(arb_text(), 1..6),
        keys in prop::collection::vec(any::<u32>(), 64),
    ) {
        let mut source = TextReplica::new("source".to_string());
        let ops: Vec<Operation> = edits.iter().flat_map(|text| source.local_edit(text)).collect();

        let mut order: Vec<usize> = (0..ops.len()).collect();
        order.sort_by_key(|&i| (keys[i % keys.len()], i));
        let shuffled: Vec<&Operation> = order.iter().map(|&i| &ops[i]).collect();

        let mut target = CharacterStore::new();
        apply_causally(&mut target, &shuffled);
        prop_assert_eq!(target.text(), source.text());
    }

    /// Applying every operation twice changes nothing
    #[test]
    fn store_apply_is_idempotent(edits in prop::collection::vec(arb_text(), 1..6)) {
        let mut source = TextReplica::new("source".to_string());
        let ops: Vec<Operation> = edits.iter().flat_map(|text| source.local_edit(text)).collect();

        let mut once = CharacterStore::new();
        let mut twice = CharacterStore::new();
        for op in &ops {
            once.apply(op);
            twice.apply(op);
            twice.apply(op);
        }
        prop_assert_eq!(once.text(), twice.text());
        prop_assert_eq!(twice.text(), source.text());
    }

    /// Diffing prev into next leaves the store showing next, here and on a peer
    #[test]
    fn diff_round_trips(prev in arb_text(), next in arb_text()) {
        let mut replica = TextReplica::new("local".to_string());
        let mut peer = TextReplica::new("peer".to_string());

        let seed = replica.local_edit(&prev);
        prop_assert_eq!(replica.text(), prev.as_str());
        let ops = replica.local_edit(&next);
        prop_assert_eq!(replica.text(), next.as_str());

        deliver(&mut peer, &seed);
        deliver(&mut peer, &ops);
        prop_assert_eq!(peer.text(), next.as_str());
    }

    /// Diffing works in stored characters even when they join on screen
    #[test]
    fn diff_round_trips_over_joined_characters(prev in arb_text(), next in arb_text()) {
        let (mut typist, seed) = typed_per_char("typist", &prev);
        prop_assert_eq!(typist.store().live_characters().count(), prev.chars().count());

        let mut editor = TextReplica::new("editor".to_string());
        deliver(&mut editor, &seed);
        let ops = editor.local_edit(&next);
        prop_assert_eq!(editor.text(), next.as_str());

        deliver(&mut typist, &ops);
        prop_assert_eq!(typist.text(), next.as_str());
    }

    /// Two sessions of one user share a site id and still converge
    #[test]
    fn shared_site_replicas_converge(
        seed in arb_text(),
        left_edits in prop::collection::vec(arb_text(), 1..4),
        right_edits in prop::collection::vec(arb_text(), 1..4),
    ) {
        let mut left = TextReplica::new("alice".to_string());
        let mut right = TextReplica::new("alice".to_string());
        let seed_ops = left.local_edit(&seed);
        deliver(&mut right, &seed_ops);

        let from_left: Vec<Operation> = left_edits.iter().flat_map(|t| left.local_edit(t)).collect();
        let from_right: Vec<Operation> = right_edits.iter().flat_map(|t| right.local_edit(t)).collect();

        deliver(&mut left, &from_right);
        deliver(&mut right, &from_left);
        prop_assert_eq!(left.text(), right.text());
    }

    /// Concurrent edits on two replicas converge once exchanged
    #[test]
    fn concurrent_replicas_converge(
        seed in arb_text(),
        left_edits in prop::collection::vec(arb_text(), 1..4),
        right_edits in prop::collection::vec(arb_text(), 1..4),
    ) {
        let mut left = TextReplica::new("left".to_string());
        let mut right = TextReplica::new("right".to_string());
        let seed_ops = left.local_edit(&seed);
        deliver(&mut right, &seed_ops);

        let from_left: Vec<Operation> = left_edits.iter().flat_map(|t| left.local_edit(t)).collect();
        let from_right: Vec<Operation> = right_edits.iter().flat_map(|t| right.local_edit(t)).collect();

        deliver(&mut left, &from_right);
        deliver(&mut right, &from_left);
        prop_assert_eq!(left.text(), right.text());
    }

    /// State merge agrees with operation exchange
    #[test]
    fn merge_matches_operation_delivery(
        left_edits in prop::collection::vec(arb_text(), 1..4),
        right_edits in prop::collection::vec(arb_text(), 1..4),
    ) {
        let mut left = TextReplica::new("left".to_string());
        let mut right = TextReplica::new("right".to_string());
        for text in &left_edits {
            left.local_edit(text);
        }
        for text in &right_edits {
            right.local_edit(text);
        }

        let mut merged = left.store().clone();
        merged.merge(right.store());
        let mut replayed = CharacterStore::new();
        for op in right.store().to_operations().iter().chain(left.store().to_operations().iter()) {
            replayed.apply(op);
        }
        prop_assert_eq!(merged.text(), replayed.text());
    }
}
