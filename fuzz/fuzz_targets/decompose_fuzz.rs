#![no_main]
use libfuzzer_sys::fuzz_target;
use unravel::codec::Registry;
use unravel::fragment::{DecomposeOptions, Fragment};

fuzz_target!(|data: &[u8]| {
    // Compression codecs can expand without bound; keep every run small.
    let opts = DecomposeOptions::default()
        .with_max_depth(8)
        .with_max_nodes(512);

    let mut root = Fragment::new(data);
    let stats = root.decompose_with(&Registry::standard(), &opts);
    assert!(stats.nodes <= 512);
    assert!(root.depth() <= 8);
    assert_eq!(root.node_count(), stats.nodes + 1);

    let _ = root.flatten();
    let twin = root.clone();
    assert!(unravel::diff(&[&root, &twin]).unwrap().is_empty());

    root.recompose();
});
