// Adapters that build codec parts from plain functions.
//
// Byte-oriented and string-oriented, fallible and infallible functions are
// all normalized here, once, into the single `&[u8] -> Vec<u8>` shape the
// engine calls. Errors collapse to an empty buffer.

use std::fmt;
use std::sync::Arc;

use regex::bytes::Regex;

use super::{Codec, Extraction};

type TransformFn = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;
type FilterFn = dyn Fn(&[u8]) -> bool + Send + Sync;
type ExtractFn = dyn Fn(&[u8]) -> Extraction + Send + Sync;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// A byte-to-byte transform: a codec's decoder or encoder.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Returns its input unchanged.
    pub fn identity() -> Self {
        Self::new(<[u8]>::to_vec)
    }

    /// Wrap a fallible byte transform. Errors yield an empty buffer.
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self::new(move |input| match f(input) {
            Ok(out) => out,
            Err(e) => {
                log::trace!("transform failed on {} bytes: {e}", input.len());
                Vec::new()
            }
        })
    }

    /// Wrap a string transform. Input that is not UTF-8 yields an empty buffer.
    pub fn text<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self::text_fallible(move |s| Ok::<_, std::convert::Infallible>(f(s)))
    }

    /// Wrap a fallible string transform.
    pub fn text_fallible<F, E>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self::new(move |input| {
            let Ok(text) = std::str::from_utf8(input) else {
                log::trace!("transform skipped non-UTF-8 input ({} bytes)", input.len());
                return Vec::new();
            };
            match f(text) {
                Ok(out) => out.into_bytes(),
                Err(e) => {
                    log::trace!("transform failed on {} bytes: {e}", input.len());
                    Vec::new()
                }
            }
        })
    }

    pub fn apply(&self, input: &[u8]) -> Vec<u8> {
        (self.0)(input)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Acceptance predicate over decoded bytes.
#[derive(Clone)]
pub struct Filter(Arc<FilterFn>);

impl Filter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn accept_all() -> Self {
        Self::new(|_| true)
    }

    /// Every byte is 7-bit ASCII. Accepts the empty buffer.
    pub fn ascii() -> Self {
        Self::new(<[u8]>::is_ascii)
    }

    pub fn min_len(min: usize) -> Self {
        Self::new(move |input| input.len() >= min)
    }

    /// Conjunction of `filters`, evaluated in order with short-circuit.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        let filters: Vec<Filter> = filters.into_iter().collect();
        Self::new(move |input| filters.iter().all(|f| f.accepts(input)))
    }

    pub fn and(self, other: Filter) -> Self {
        Self::all([self, other])
    }

    pub fn accepts(&self, input: &[u8]) -> bool {
        (self.0)(input)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Candidate finder.
#[derive(Clone)]
pub struct Extractor(Arc<ExtractFn>);

impl Extractor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> Extraction + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Never finds anything.
    pub fn none() -> Self {
        Self::new(|_| Extraction::none())
    }

    /// Every non-overlapping match of `pattern`, leftmost first, with no
    /// identity bytes. The pattern is compiled once, here.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(pattern)?;
        Ok(Self::new(move |input| {
            let candidates = re.find_iter(input).map(|m| m.as_bytes().to_vec()).collect();
            Extraction::new(candidates, Vec::new())
        }))
    }

    pub fn extract(&self, input: &[u8]) -> Extraction {
        (self.0)(input)
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Extractor(..)")
    }
}

// ---------------------------------------------------------------------------
// CodecDescriptor
// ---------------------------------------------------------------------------

/// A [`Codec`] assembled from an extractor, a decoder, an optional encoder
/// and a filter.
///
/// ```
/// use unravel::codec::{CodecDescriptor, Extractor, Filter, Transform};
///
/// let upper = CodecDescriptor::new(
///     "upper",
///     Extractor::regex("[A-Z]{4,}").unwrap(),
///     Transform::text(|s| s.to_lowercase()),
/// )
/// .with_encoder(Transform::text(|s| s.to_uppercase()))
/// .with_filter(Filter::ascii());
/// # let _ = upper;
/// ```
#[derive(Debug, Clone)]
pub struct CodecDescriptor {
    name: String,
    extractor: Extractor,
    decoder: Transform,
    encoder: Option<Transform>,
    filter: Filter,
}

impl CodecDescriptor {
    /// A non-reversible codec that accepts every decoded candidate.
    pub fn new(name: impl Into<String>, extractor: Extractor, decoder: Transform) -> Self {
        Self {
            name: name.into(),
            extractor,
            decoder,
            encoder: None,
            filter: Filter::accept_all(),
        }
    }

    pub fn with_encoder(mut self, encoder: Transform) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

impl Codec for CodecDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, input: &[u8]) -> Extraction {
        self.extractor.extract(input)
    }

    fn decode(&self, raw: &[u8]) -> Vec<u8> {
        self.decoder.apply(raw)
    }

    fn encoder(&self) -> Option<Transform> {
        self.encoder.clone()
    }

    fn accept(&self, decoded: &[u8]) -> bool {
        self.filter.accepts(decoded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
