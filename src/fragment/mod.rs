// Fragment trees.
//
// A `Fragment` owns a byte buffer and the children that were decoded out of
// it. This module provides:
//
// - `decompose`: extract / decode / accept / recurse, with optional limits
// - `recompose`: bottom-up re-encode and splice
// - tree accessors, in-place editing and pre-order iteration

pub mod decompose;
pub mod recompose;

pub use decompose::{DecomposeOptions, DecomposeStats};
pub use recompose::replace_all;

use crate::codec::Transform;
use crate::fingerprint::Fingerprint;

/// One node of a decomposition tree.
///
/// The root holds the original input. Every other node holds the decoded
/// payload of a region of its parent, together with the exact raw bytes that
/// region was decoded from and the codec's encoder, so the parent can splice
/// an edited payload back in.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    contents: Vec<u8>,
    children: Vec<Fragment>,
    raw: Vec<u8>,
    reverse: Option<Transform>,
    codec: Option<String>,
    fingerprint: Fingerprint,
}

impl Fragment {
    /// A root fragment over `contents`, not yet decomposed.
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            ..Default::default()
        }
    }

    /// A child fragment decoded from `raw`, re-encoded by `reverse` during
    /// recomposition. Decomposition builds these itself; this is for callers
    /// assembling trees by hand.
    pub fn derived(
        contents: impl Into<Vec<u8>>,
        raw: impl Into<Vec<u8>>,
        reverse: Option<Transform>,
    ) -> Self {
        Self {
            contents: contents.into(),
            raw: raw.into(),
            reverse,
            ..Default::default()
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut Vec<u8> {
        &mut self.contents
    }

    /// Replace this node's contents wholesale.
    pub fn set_contents(&mut self, contents: impl Into<Vec<u8>>) {
        self.contents = contents.into();
    }

    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }

    pub fn children(&self) -> &[Fragment] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Fragment] {
        &mut self.children
    }

    pub fn push_child(&mut self, child: Fragment) {
        self.children.push(child);
    }

    /// Bytes in the parent's contents this node was decoded from. Empty for
    /// the root.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Name of the codec that produced this node, `None` for roots and
    /// hand-built nodes.
    pub fn codec(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether recomposition can splice this node back into its parent.
    pub fn is_reversible(&self) -> bool {
        self.reverse.is_some()
    }

    /// Total number of nodes, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Fragment::node_count).sum::<usize>()
    }

    /// Height of the subtree; a leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Node at `path`, a list of child indices from this node.
    pub fn get(&self, path: &[usize]) -> Option<&Fragment> {
        path.iter()
            .try_fold(self, |node, &i| node.children.get(i))
    }

    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Fragment> {
        path.iter()
            .try_fold(self, |node, &i| node.children.get_mut(i))
    }

    /// Replace every node's contents with `visitor(contents)`, parents
    /// before children.
    ///
    /// Each child is rewritten independently of its parent; the parent's
    /// copy of the child's text is refreshed by [`recompose`](Self::recompose).
    pub fn apply<F>(&mut self, mut visitor: F)
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        self.apply_inner(&mut visitor);
    }

    fn apply_inner<F>(&mut self, visitor: &mut F)
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        self.contents = visitor(&self.contents);
        for child in &mut self.children {
            child.apply_inner(visitor);
        }
    }

    /// Pre-order traversal yielding `(depth, node)`.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: vec![(0, self)],
        }
    }

    /// See [`crate::flatten::flatten`].
    pub fn flatten(&self) -> Vec<u8> {
        crate::flatten::flatten(self)
    }
}

/// Pre-order iterator over a fragment tree.
#[derive(Debug)]
pub struct Iter<'a> {
    stack: Vec<(usize, &'a Fragment)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (usize, &'a Fragment);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|c| (depth + 1, c)));
        Some((depth, node))
    }
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = (usize, &'a Fragment);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
