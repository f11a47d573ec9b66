#![no_main]
use libfuzzer_sys::fuzz_target;
use unravel::codec::{Registry, library};
use unravel::fragment::Fragment;

fuzz_target!(|data: &[u8]| {
    // Base64 decoding is canonical, so an unedited tree reproduces its input.
    let mut registry = Registry::new();
    registry.push(library::base64()).unwrap();

    let mut root = Fragment::new(data);
    root.decompose(&registry);
    root.recompose();
    assert_eq!(root.contents(), data);
});
