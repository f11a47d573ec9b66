// Integration tests for the synchronized walk over decomposed trees.

#![cfg(feature = "codecs")]

use unravel::codec::library;
use unravel::codec::Registry;
use unravel::fragment::Fragment;
use unravel::walk::{Divergence, WalkError, diff, walk, walk_paths};

fn json_registry() -> Registry {
    let mut registry = Registry::new();
    registry.push(library::json()).unwrap();
    registry
}

fn decomposed(input: &[u8], registry: &Registry) -> Fragment {
    let mut root = Fragment::new(input);
    root.decompose(registry);
    root
}

fn joined(contents: &[&[u8]]) -> String {
    contents
        .iter()
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("|")
}

#[test]
fn json_values_walk_side_by_side() {
    let registry = json_registry();
    let alice = decomposed(br#"{"user":"alice"}"#, &registry);
    let bob = decomposed(br#"{"user":"bob"}"#, &registry);

    let out = walk(&[&alice, &bob], joined).unwrap();
    assert_eq!(out, [r#"{"user":"alice"}|{"user":"bob"}"#, "alice|bob"]);

    let found = diff(&[&alice, &bob]).unwrap();
    assert_eq!(
        found,
        vec![Divergence {
            path: vec![0],
            contents: vec![b"alice".to_vec(), b"bob".to_vec()],
        }]
    );
}

#[test]
fn extra_key_is_a_structural_mismatch() {
    let registry = json_registry();
    let a = decomposed(br#"{"user":"alice"}"#, &registry);
    let b = decomposed(br#"{"user":"alice","extra":"x"}"#, &registry);

    match walk(&[&a, &b], joined) {
        Err(WalkError::FingerprintMismatch { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected fingerprint mismatch, got {other:?}"),
    }
    assert!(matches!(
        diff(&[&a, &b]),
        Err(WalkError::FingerprintMismatch { .. })
    ));
}

#[test]
fn three_trees_walk_together() {
    let registry = json_registry();
    let trees: Vec<Fragment> = ["a", "b", "c"]
        .iter()
        .map(|v| decomposed(format!(r#"{{"k":"{v}","n":"1"}}"#).as_bytes(), &registry))
        .collect();
    let refs: Vec<&Fragment> = trees.iter().collect();

    let out = walk(&refs, joined).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[1], "a|b|c");
    assert_eq!(out[2], "1|1|1");

    let found = diff(&refs).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].path, vec![0]);
}

#[test]
fn tree_walked_against_itself_visits_every_node() {
    let root = decomposed(
        br#"{"outer":"{\"inner\":\"deep\"}","flat":"value"}"#,
        &json_registry(),
    );
    assert!(root.depth() >= 2);

    let twin = root.clone();
    let paths = walk_paths(&[&root, &twin], |path, _| path.to_vec()).unwrap();
    assert_eq!(paths.len(), root.node_count());
    assert!(diff(&[&root, &twin]).unwrap().is_empty());

    for path in &paths {
        assert!(root.get(path).is_some());
    }
}

#[test]
fn mismatched_subtree_is_skipped() {
    let registry = json_registry();
    let left = decomposed(br#"{"a":"{\"x\":\"1\"}","b":"same"}"#, &registry);
    let right = decomposed(br#"{"a":"plain","b":"same"}"#, &registry);
    assert_ne!(left.fingerprint(), right.fingerprint());

    // Only the first value expands further, so swap it in under a copy of
    // the left root: the roots agree and child 0 does not.
    let mut grafted = left.clone();
    grafted.children_mut()[0] = right.children()[0].clone();

    let out = walk(&[&left, &grafted], joined).unwrap();
    let root = String::from_utf8_lossy(left.contents()).into_owned();
    assert_eq!(out, [format!("{root}|{root}"), "same|same".to_string()]);
}

#[test]
fn no_trees_is_an_error() {
    assert_eq!(walk(&[], joined), Err(WalkError::NoInput));
}
