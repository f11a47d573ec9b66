// Decomposition: build a fragment tree from a buffer and a codec registry.
//
// Codecs run in registry order, once per node. For each codec the accepted
// candidates are collected first, then each new child is decomposed with the
// full registry, then the codec's contribution is folded into the node's
// fingerprint. Nesting across codecs therefore happens only through the
// recursive call on children.

use crate::codec::{Codec, Extraction, Registry};
use crate::fingerprint::Fingerprint;

use super::Fragment;

/// Caller-imposed bounds on decomposition.
///
/// The engine itself does not bound recursion: a codec that accepts its own
/// unchanged output never terminates. Limits are applied deterministically,
/// so the same input, registry and options always produce the same tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecomposeOptions {
    /// Nodes at this depth (root = 0) are left undecomposed.
    pub max_depth: Option<usize>,
    /// Maximum number of descendants created below the root.
    pub max_nodes: Option<usize>,
}

impl DecomposeOptions {
    /// No limits.
    pub const UNBOUNDED: Self = Self {
        max_depth: None,
        max_nodes: None,
    };

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_nodes(mut self, nodes: usize) -> Self {
        self.max_nodes = Some(nodes);
        self
    }
}

/// Summary of one decomposition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecomposeStats {
    /// Descendants created below the root.
    pub nodes: usize,
    /// Deepest level reached (root = 0).
    pub depth: usize,
    /// Whether a limit stopped candidates from becoming children.
    pub truncated: bool,
}

impl Fragment {
    /// Decompose this fragment with `registry`, replacing any previous
    /// children and fingerprint.
    pub fn decompose(&mut self, registry: &Registry) {
        self.decompose_with(registry, &DecomposeOptions::UNBOUNDED);
    }

    /// Decompose with limits.
    pub fn decompose_with(&mut self, registry: &Registry, opts: &DecomposeOptions) -> DecomposeStats {
        let mut stats = DecomposeStats::default();
        self.explode(registry, opts, 0, &mut stats);
        log::debug!(
            "decomposed {} bytes into {} nodes (depth {}, fingerprint {})",
            self.contents.len(),
            stats.nodes,
            stats.depth,
            self.fingerprint
        );
        if stats.truncated {
            log::debug!("decomposition truncated by limits {opts:?}");
        }
        stats
    }

    fn explode(
        &mut self,
        registry: &Registry,
        opts: &DecomposeOptions,
        depth: usize,
        stats: &mut DecomposeStats,
    ) {
        self.children.clear();
        self.fingerprint = Fingerprint::empty();
        stats.depth = stats.depth.max(depth);

        if opts.max_depth.is_some_and(|max| depth >= max) {
            // One hit is enough; skip the trial decode once truncation is known.
            if !stats.truncated && registry.iter().any(|codec| self.has_accepted(codec.as_ref())) {
                stats.truncated = true;
            }
            return;
        }

        for (index, codec) in registry.iter().enumerate() {
            let Extraction {
                candidates,
                identity,
            } = codec.extract(&self.contents);
            if candidates.is_empty() {
                continue;
            }

            let mut accepted = Vec::new();
            for raw in candidates {
                let decoded = codec.decode(&raw);
                if !codec.accept(&decoded) {
                    log::trace!(
                        "{}: rejected candidate of {} bytes ({} decoded)",
                        codec.name(),
                        raw.len(),
                        decoded.len()
                    );
                    continue;
                }
                if opts.max_nodes.is_some_and(|max| stats.nodes >= max) {
                    stats.truncated = true;
                    break;
                }
                stats.nodes += 1;
                accepted.push(Fragment {
                    contents: decoded,
                    children: Vec::new(),
                    raw,
                    reverse: codec.encoder(),
                    codec: Some(codec.name().to_string()),
                    fingerprint: Fingerprint::empty(),
                });
            }

            if accepted.is_empty() {
                continue;
            }
            log::debug!(
                "{}: {} candidate(s) accepted at depth {depth}",
                codec.name(),
                accepted.len()
            );

            for child in &mut accepted {
                child.explode(registry, opts, depth + 1, stats);
            }

            // Registry length is capped at 256, so the index fits in a byte.
            let index_byte = [index as u8];
            let mut parts: Vec<&[u8]> = Vec::with_capacity(accepted.len() + 2);
            parts.push(&index_byte);
            parts.push(&identity);
            parts.extend(accepted.iter().map(|c| c.fingerprint.as_bytes()));
            self.fingerprint.fold(&parts);

            self.children.append(&mut accepted);
        }
    }

    fn has_accepted(&self, codec: &dyn Codec) -> bool {
        codec
            .extract(&self.contents)
            .candidates
            .iter()
            .any(|raw| codec.accept(&codec.decode(raw)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
