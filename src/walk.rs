// Synchronized walk over structurally equivalent fragment trees.
//
// The walker zips N trees node by node. At every level it first verifies that
// the nodes agree on fingerprint and child count; a disagreement fails that
// level only, and the parent level drops the failed subtree and carries on
// with the remaining siblings.

use thiserror::Error;

use crate::fingerprint::Fingerprint;
use crate::fragment::Fragment;

/// Why a level of a synchronized walk could not be visited.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("no input trees")]
    NoInput,
    #[error("structural mismatch: tree {index} has fingerprint {actual}, expected {expected}")]
    FingerprintMismatch {
        index: usize,
        expected: Fingerprint,
        actual: Fingerprint,
    },
    #[error("child-count mismatch: tree {index} has {actual} children, expected {expected}")]
    ChildCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Walk `trees` in lock-step and reduce the contents of every set of
/// corresponding nodes.
///
/// `reduce` receives one contents slice per tree, in the order of `trees`.
/// Results are returned depth-first, parents before children, children in
/// discovery order. Subtrees whose nodes disagree structurally are omitted;
/// only a disagreement between the roots is returned as an error.
pub fn walk<T, F>(trees: &[&Fragment], mut reduce: F) -> Result<Vec<T>, WalkError>
where
    F: FnMut(&[&[u8]]) -> T,
{
    walk_paths(trees, |_, contents| reduce(contents))
}

/// Like [`walk`], but `reduce` also receives the child-index path of the
/// current nodes (empty at the roots).
pub fn walk_paths<T, F>(trees: &[&Fragment], mut reduce: F) -> Result<Vec<T>, WalkError>
where
    F: FnMut(&[usize], &[&[u8]]) -> T,
{
    let mut out = Vec::new();
    walk_level(
        trees,
        &mut Vec::new(),
        &mut |path: &[usize], nodes: &[&Fragment]| {
            let contents: Vec<&[u8]> = nodes.iter().map(|n| n.contents()).collect();
            reduce(path, &contents)
        },
        &mut out,
    )?;
    Ok(out)
}

/// A leaf position whose contents differ across trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Child-index path from the roots.
    pub path: Vec<usize>,
    /// Contents of the leaf in each tree, in input order.
    pub contents: Vec<Vec<u8>>,
}

/// Every corresponding leaf whose contents are not identical across `trees`.
pub fn diff(trees: &[&Fragment]) -> Result<Vec<Divergence>, WalkError> {
    let mut found = Vec::new();
    walk_level(
        trees,
        &mut Vec::new(),
        &mut |path: &[usize], nodes: &[&Fragment]| {
            let first = nodes[0];
            let differs = nodes.iter().any(|n| n.contents() != first.contents());
            (first.is_leaf() && differs).then(|| Divergence {
                path: path.to_vec(),
                contents: nodes.iter().map(|n| n.contents().to_vec()).collect(),
            })
        },
        &mut found,
    )?;
    Ok(found.into_iter().flatten().collect())
}

fn walk_level<T, F>(
    level: &[&Fragment],
    path: &mut Vec<usize>,
    visit: &mut F,
    out: &mut Vec<T>,
) -> Result<(), WalkError>
where
    F: FnMut(&[usize], &[&Fragment]) -> T,
{
    check_level(level)?;
    out.push(visit(path, level));

    let width = level[0].children().len();
    for i in 0..width {
        let next: Vec<&Fragment> = level.iter().map(|n| &n.children()[i]).collect();
        path.push(i);
        if let Err(e) = walk_level(&next, path, visit, out) {
            log::debug!("walk: skipping subtree at {path:?}: {e}");
        }
        path.pop();
    }
    Ok(())
}

fn check_level(level: &[&Fragment]) -> Result<(), WalkError> {
    let Some((first, rest)) = level.split_first() else {
        return Err(WalkError::NoInput);
    };
    for (i, node) in rest.iter().enumerate() {
        if node.fingerprint() != first.fingerprint() {
            return Err(WalkError::FingerprintMismatch {
                index: i + 1,
                expected: first.fingerprint().clone(),
                actual: node.fingerprint().clone(),
            });
        }
    }
    for (i, node) in rest.iter().enumerate() {
        if node.children().len() != first.children().len() {
            return Err(WalkError::ChildCountMismatch {
                index: i + 1,
                expected: first.children().len(),
                actual: node.children().len(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(contents: &str, children: &[&str]) -> Fragment {
        let mut f = Fragment::new(contents);
        for c in children {
            f.push_child(Fragment::derived(*c, *c, None));
        }
        f
    }

    fn joined(contents: &[&[u8]]) -> String {
        contents
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join("|")
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(walk(&[], joined), Err(WalkError::NoInput));
        assert_eq!(diff(&[]), Err(WalkError::NoInput));
    }

    #[test]
    fn single_tree_visits_every_node() {
        let t = tree("root", &["a", "b"]);
        let out = walk(&[&t], joined).unwrap();
        assert_eq!(out, ["root", "a", "b"]);
    }

    #[test]
    fn results_are_depth_first() {
        let mut a = tree("r", &[]);
        let mut mid = Fragment::derived("m", "m", None);
        mid.push_child(Fragment::derived("m0", "m0", None));
        a.push_child(mid);
        a.push_child(Fragment::derived("z", "z", None));
        let b = a.clone();

        let out = walk(&[&a, &b], joined).unwrap();
        assert_eq!(out, ["r|r", "m|m", "m0|m0", "z|z"]);
    }

    #[test]
    fn paths_follow_child_indices() {
        let t = tree("root", &["a", "b"]);
        let paths = walk_paths(&[&t], |path, _| path.to_vec()).unwrap();
        assert_eq!(paths, vec![vec![], vec![0], vec![1]]);
    }

    #[test]
    fn root_child_count_mismatch_is_fatal() {
        let a = tree("r", &["x"]);
        let b = tree("r", &["x", "y"]);
        assert_eq!(
            walk(&[&a, &b], joined),
            Err(WalkError::ChildCountMismatch {
                index: 1,
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn nested_mismatch_drops_only_that_subtree() {
        let mut a = tree("r", &["ok"]);
        let mut bad_a = Fragment::derived("bad", "bad", None);
        bad_a.push_child(Fragment::derived("only-in-a", "x", None));
        a.push_child(bad_a);

        let mut b = tree("r", &["ok"]);
        b.push_child(Fragment::derived("bad", "bad", None));

        let out = walk(&[&a, &b], joined).unwrap();
        assert_eq!(out, ["r|r", "ok|ok"]);
    }

    #[test]
    fn diff_reports_differing_leaves_only() {
        let a = tree("{a}", &["same", "left"]);
        let b = tree("{b}", &["same", "right"]);
        let found = diff(&[&a, &b]).unwrap();
        assert_eq!(
            found,
            vec![Divergence {
                path: vec![1],
                contents: vec![b"left".to_vec(), b"right".to_vec()],
            }]
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(WalkError::NoInput.to_string(), "no input trees");
        let e = WalkError::ChildCountMismatch {
            index: 2,
            expected: 1,
            actual: 3,
        };
        assert_eq!(
            e.to_string(),
            "child-count mismatch: tree 2 has 3 children, expected 1"
        );
    }
}
