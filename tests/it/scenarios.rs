//! End-to-end replica scenarios

use crate::helpers::deliver;
use cotext_core::awareness::Presence;
use cotext_core::crdt::text::{ApplyOutcome, CharacterStore, Operation, Position, TextReplica};

#[test]
fn test_typing_hello_one_key_at_a_time() {
    let mut replica = TextReplica::new("typist".to_string());
    let mut ops = Vec::new();
    for prefix in ["h", "he", "hel", "hell", "hello"] {
        let step = replica.local_edit(prefix);
        assert_eq!(step.len(), 1);
        ops.extend(step);
    }

    assert_eq!(replica.text(), "hello");

    // Positions strictly increase along the text
    let positions: Vec<&Position> = replica
        .store()
        .live_characters()
        .map(|c| &c.position)
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    // Any peer replaying the stream sees the same text
    let mut peer = TextReplica::new("peer".to_string());
    deliver(&mut peer, &ops);
    assert_eq!(peer.text(), "hello");
}

#[test]
fn test_concurrent_insert_and_delete_converge() {
    let mut one = TextReplica::new("one".to_string());
    let mut two = TextReplica::new("two".to_string());

    let seed = one.local_edit("ab");
    deliver(&mut two, &seed);

    // Concurrently: one types X between a and b, two deletes b
    let from_one = one.local_edit("aXb");
    let from_two = two.local_edit("a");

    deliver(&mut one, &from_two);
    deliver(&mut two, &from_one);

    assert_eq!(one.text(), "aX");
    assert_eq!(two.text(), "aX");
}

#[test]
fn test_concurrent_line_break_halves() {
    let mut left = TextReplica::new("left".to_string());
    let mut right = TextReplica::new("right".to_string());

    let seed = left.local_edit("ab");
    deliver(&mut right, &seed);

    // Each side types half of a CRLF at the same spot
    let from_left = left.local_edit("a\rb");
    let from_right = right.local_edit("a\nb");
    deliver(&mut left, &from_right);
    deliver(&mut right, &from_left);

    assert_eq!(left.text(), right.text());
    assert_eq!(left.store().live_characters().count(), 4);

    // The joined "\r\n" is two characters; editing past it must not split it wrong
    let merged = left.text().to_string();
    let trimmed = merged.trim_end_matches('b').to_string();
    let ops = left.local_edit(&trimmed);
    assert_eq!(ops.len(), 1);
    deliver(&mut right, &ops);

    assert_eq!(left.text(), trimmed);
    assert_eq!(right.text(), trimmed);

    // Deleting one half leaves the other
    let lone = trimmed.replacen('\r', "", 1);
    let ops = right.local_edit(&lone);
    deliver(&mut left, &ops);
    assert_eq!(left.text(), lone);
    assert_eq!(right.text(), lone);
}

#[test]
fn test_same_user_in_two_tabs() {
    let mut tab_one = TextReplica::new("alice".to_string());
    let mut tab_two = TextReplica::new("alice".to_string());

    // Fresh allocators with one site id mint identical positions
    let from_one = tab_one.local_edit("x");
    let from_two = tab_two.local_edit("y");
    deliver(&mut tab_one, &from_two);
    deliver(&mut tab_two, &from_one);

    assert_eq!(tab_one.text(), tab_two.text());
    assert_eq!(tab_one.text().len(), 2);

    let ops = tab_two.local_edit("");
    deliver(&mut tab_one, &ops);
    assert_eq!(tab_one.text(), "");
}

#[test]
fn test_delete_before_insert_is_dropped() {
    let mut store = CharacterStore::new();
    let insert = Operation::insert(
        "c".to_string(),
        "c".to_string(),
        Position::new(vec![32], "s".to_string(), 1),
    );

    assert_eq!(store.apply(&Operation::delete("c".to_string())), ApplyOutcome::Unchanged);
    assert_eq!(store.apply(&insert), ApplyOutcome::Inserted);

    assert_eq!(store.text(), "c");
    assert_eq!(store.relative_index("c"), Some(0));
}

#[test]
fn test_leave_for_unknown_user_after_current_users() {
    let mut presence = Presence::new("me".to_string(), 12);
    presence.apply_current_users(vec![("u1".to_string(), None), ("u2".to_string(), None)]);

    assert!(!presence.apply_leave("u9"));

    let active: Vec<String> = presence.participants().into_iter().map(|p| p.user_id).collect();
    assert_eq!(active, vec!["u1".to_string(), "u2".to_string()]);
}

#[test]
fn test_three_way_interleaved_typing() {
    let mut a = TextReplica::new("a".to_string());
    let mut b = TextReplica::new("b".to_string());
    let mut c = TextReplica::new("c".to_string());

    let seed = a.local_edit("[]");
    deliver(&mut b, &seed);
    deliver(&mut c, &seed);

    let from_a = a.local_edit("[aaa]");
    let from_b = b.local_edit("[bbb]");
    let from_c = c.local_edit("[ccc]");

    deliver(&mut a, &from_b);
    deliver(&mut a, &from_c);
    deliver(&mut b, &from_c);
    deliver(&mut b, &from_a);
    deliver(&mut c, &from_a);
    deliver(&mut c, &from_b);

    assert_eq!(a.text(), b.text());
    assert_eq!(b.text(), c.text());

    let text = a.text();
    assert_eq!(text.len(), 11);
    for site in ['a', 'b', 'c'] {
        assert_eq!(text.matches(site).count(), 3);
    }
    assert!(text.starts_with('[') && text.ends_with(']'));
}

#[test]
fn test_snapshot_restores_replica() {
    let mut writer = TextReplica::new("writer".to_string());
    writer.local_edit("draft text");
    writer.local_edit("final text");

    let json = serde_json::to_string(writer.store()).unwrap();
    let store: CharacterStore = serde_json::from_str(&json).unwrap();
    let mut restored = TextReplica::from_store(
        "writer".to_string(),
        &cotext_core::AllocatorConfig::default(),
        store,
    );
    assert_eq!(restored.text(), "final text");

    // New edits from the restored replica merge cleanly into the writer
    let ops = restored.local_edit("final text!");
    deliver(&mut writer, &ops);
    assert_eq!(writer.text(), "final text!");
}
