// Linear projection of a fragment tree for display and diffing.
//
// The projection is presentation only; recomposition never reads it.

use crate::fragment::Fragment;

/// Placed between a node's contents and its single decoded child.
pub const THEN_SEPARATOR: &[u8] = b" => ";

const LIST_OPEN: &[u8] = b"[";
const LIST_CLOSE: &[u8] = b"]";
const LIST_SEPARATOR: &[u8] = b", ";

/// Render `fragment` as one byte sequence.
///
/// - A leaf renders as its contents.
/// - A node with one child renders as `contents => child`.
/// - A node with several children renders as `[a, b, ...]` over the distinct
///   child renderings, in first-occurrence order. If only one distinct
///   rendering remains, the one-child form is used; if every child renders
///   empty, the node renders as its own contents.
pub fn flatten(fragment: &Fragment) -> Vec<u8> {
    match fragment.children() {
        [] => fragment.contents().to_vec(),
        [only] => then(fragment.contents(), &flatten(only)),
        children => {
            let rendered: Vec<Vec<u8>> = children.iter().map(flatten).collect();
            if rendered.iter().all(Vec::is_empty) {
                return fragment.contents().to_vec();
            }

            let mut distinct: Vec<Vec<u8>> = Vec::with_capacity(rendered.len());
            for r in rendered {
                if !distinct.contains(&r) {
                    distinct.push(r);
                }
            }

            if let [only] = distinct.as_slice() {
                return then(fragment.contents(), only);
            }

            let mut out = LIST_OPEN.to_vec();
            for (i, r) in distinct.iter().enumerate() {
                if i > 0 {
                    out.extend_from_slice(LIST_SEPARATOR);
                }
                out.extend_from_slice(r);
            }
            out.extend_from_slice(LIST_CLOSE);
            out
        }
    }
}

fn then(contents: &[u8], child: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(contents.len() + THEN_SEPARATOR.len() + child.len());
    out.extend_from_slice(contents);
    out.extend_from_slice(THEN_SEPARATOR);
    out.extend_from_slice(child);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
