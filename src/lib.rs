//! Unravel: recursive decomposition of nested encoded payloads.
//!
//! A buffer such as an HTTP response is split into a tree of regions
//! (header values, JSON values, base64 blobs, gzip bodies, ...), each region
//! decoded and decomposed again until no codec applies. The tree can be
//! edited and recomposed into a single buffer, and structurally compared with
//! other trees through fingerprints and synchronized walks.
//!
//! The crate provides:
//! - The codec contract and registry (`codec`)
//! - Fragment trees with decomposition and recomposition (`fragment`)
//! - Structural fingerprints (`fingerprint`)
//! - Flattened projections (`flatten`)
//! - Lock-step walking and diffing (`walk`)
//! - Built-in codecs (`codec::library`, `codecs` feature)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use unravel::codec::library;
//! use unravel::codec::Registry;
//! use unravel::fragment::Fragment;
//!
//! let registry = Registry::new().with(library::base64()).unwrap();
//!
//! let mut root = Fragment::new("data: SGVsbG8=, done");
//! root.decompose(&registry);
//! assert_eq!(root.children()[0].contents(), b"Hello");
//!
//! root.get_mut(&[0]).unwrap().set_contents("Howdy");
//! root.recompose();
//! assert_eq!(root.contents(), b"data: SG93ZHk=, done");
//! ```

pub mod codec;
pub mod fingerprint;
pub mod flatten;
pub mod fragment;
pub mod walk;

#[cfg(feature = "cli")]
pub mod cli;

pub use codec::{Codec, Registry};
pub use fingerprint::Fingerprint;
pub use fragment::{DecomposeOptions, Fragment};
pub use walk::{WalkError, diff, walk};
