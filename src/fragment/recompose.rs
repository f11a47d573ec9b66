// Recomposition: collapse a fragment tree back into a single buffer.
//
// Children are recomposed first, re-encoded with their codec's encoder, and
// spliced into the parent by replacing every occurrence of the child's raw
// bytes. The splice is position-free: a raw slice that occurs more than once
// in the parent rewrites all occurrences, and a later sibling with the same
// raw slice matches text an earlier sibling already rewrote.

use super::Fragment;

impl Fragment {
    /// Re-encode and splice every reversible child into this node's contents,
    /// bottom-up. Children without an encoder are left unspliced.
    pub fn recompose(&mut self) {
        let Fragment {
            contents, children, ..
        } = self;

        for child in children.iter_mut() {
            child.recompose();
            let Some(reverse) = &child.reverse else {
                continue;
            };
            let encoded = reverse.apply(&child.contents);
            *contents = replace_all(contents, &child.raw, &encoded);
        }
    }
}

/// Replace every non-overlapping occurrence of `needle` in `haystack`,
/// scanning left to right. An empty needle matches nothing.
pub fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return haystack.to_vec();
    }

    let first = needle[0];
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while let Some(offset) = haystack[i..].iter().position(|&b| b == first) {
        let at = i + offset;
        if haystack[at..].starts_with(needle) {
            out.extend_from_slice(&haystack[i..at]);
            out.extend_from_slice(replacement);
            i = at + needle.len();
        } else {
            out.extend_from_slice(&haystack[i..=at]);
            i = at + 1;
        }
    }
    out.extend_from_slice(&haystack[i..]);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
