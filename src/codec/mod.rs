// Codec contract and registry.
//
// This module defines what the decomposition engine needs from a codec:
//
// - `Codec`     : extract / decode / encoder / accept capability
// - `Registry`  : ordered list of codecs; position is part of the fingerprint
// - `transform` : adapters that turn plain functions into codec parts
// - `library`   : built-in codecs (base64, hex, JSON, HTTP, ...), feature `codecs`

pub mod transform;

#[cfg(feature = "codecs")]
pub mod library;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use transform::{CodecDescriptor, Extractor, Filter, Transform};

/// Maximum number of codecs in a registry. The codec index is folded into
/// fingerprints as a single byte.
pub const MAX_CODECS: usize = 256;

/// Result of running a codec's extractor over a buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Candidate byte sequences in discovery order. Each candidate is the
    /// exact text the parent must contain for recomposition to splice it back.
    pub candidates: Vec<Vec<u8>>,
    /// Codec-reported structural identity (JSON keys, header names, ...).
    pub identity: Vec<u8>,
}

impl Extraction {
    /// An extraction with no candidates and no identity.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(candidates: Vec<Vec<u8>>, identity: Vec<u8>) -> Self {
        Self {
            candidates,
            identity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Codec trait
// ---------------------------------------------------------------------------

/// One kind of encoding or structuring that the engine can both identify and
/// reverse.
///
/// Implementations must be pure: the same input always yields the same
/// extraction and the same decoded bytes. Decode failures are reported as an
/// empty buffer, which `accept` is then free to reject.
///
/// A codec whose decoder returns its own input unchanged, and whose filter
/// accepts that input, recurses without bound. Use
/// [`DecomposeOptions`](crate::fragment::DecomposeOptions) to cap the tree when
/// registering such codecs.
pub trait Codec: Send + Sync {
    /// Short display name, e.g. `"base64"`.
    fn name(&self) -> &str;

    /// Find candidate regions in `input`.
    fn extract(&self, input: &[u8]) -> Extraction;

    /// Decode one candidate. Empty output signals failure.
    fn decode(&self, raw: &[u8]) -> Vec<u8>;

    /// The reverse transform, or `None` if regions of this codec cannot be
    /// re-encoded.
    fn encoder(&self) -> Option<Transform>;

    /// Whether a decoded candidate should become a child fragment.
    fn accept(&self, decoded: &[u8]) -> bool;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Errors raised while assembling codecs.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry is full ({MAX_CODECS} codecs)")]
    Full,
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
}

/// Ordered codec list supplied to decomposition.
///
/// The same registry, in the same order, must be used to reproduce a given
/// fingerprint.
#[derive(Clone, Default)]
pub struct Registry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a codec. Fails once [`MAX_CODECS`] codecs are registered.
    pub fn push(&mut self, codec: impl Codec + 'static) -> Result<&mut Self, RegistryError> {
        self.push_shared(Arc::new(codec))
    }

    /// Append an already shared codec.
    pub fn push_shared(&mut self, codec: Arc<dyn Codec>) -> Result<&mut Self, RegistryError> {
        if self.codecs.len() >= MAX_CODECS {
            return Err(RegistryError::Full);
        }
        self.codecs.push(codec);
        Ok(self)
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, codec: impl Codec + 'static) -> Result<Self, RegistryError> {
        self.push(codec)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Codec>> {
        self.codecs.get(index)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codecs.iter().map(|c| c.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Codec>> {
        self.codecs.iter()
    }

    /// A registry holding only the codecs named in `names`, kept in this
    /// registry's order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Registry, RegistryError> {
        for name in names {
            if !self.names().any(|n| n == name.as_ref()) {
                return Err(RegistryError::UnknownCodec(name.as_ref().to_string()));
            }
        }
        let codecs = self
            .codecs
            .iter()
            .filter(|c| names.iter().any(|n| n.as_ref() == c.name()))
            .cloned()
            .collect();
        Ok(Registry { codecs })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
