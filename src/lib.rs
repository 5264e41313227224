//! # refbundle
//!
//! Resolve, dereference, and bundle JSON and YAML documents connected by
//! JSON References (`$ref`).
//!
//! Given a root document identified by a filesystem path or URL, the crate
//! produces one of four outputs:
//!
//! - [`parse`] — the root document as a single value tree, `$ref`s intact.
//! - [`resolve`] — a [`Catalog`] mapping every transitively reachable
//!   document URL to its parsed contents.
//! - [`dereference`] — a [`Dereferenced`] tree in which every `$ref` has
//!   been replaced by its target; shared targets are shared nodes and
//!   circular chains are back-edges.
//! - [`bundle`] — a single self-contained value tree with every external
//!   target inlined under `definitions/` and all `$ref`s rewritten to local
//!   pointers.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), refbundle::Error> {
//! let schema = refbundle::bundle("specs/openapi.yaml")?;
//! assert!(schema.get("definitions").is_some());
//!
//! let dereferenced = refbundle::dereference("specs/openapi.yaml")?;
//! if dereferenced.circular() {
//!     eprintln!("circular references: {:?}", dereferenced.circular_refs());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Operations are configured through a builder obtained from [`options`]:
//!
//! ```no_run
//! # fn main() -> Result<(), refbundle::Error> {
//! use std::time::Duration;
//!
//! use refbundle::CircularPolicy;
//!
//! let catalog = refbundle::options()
//!     .timeout(Duration::from_secs(5))
//!     .redirects(2)
//!     .circular(CircularPolicy::Ignore)
//!     .continue_on_error(true)
//!     .resolve("https://example.com/schema.json")?;
//! for doc in catalog.errors() {
//!     eprintln!("{}: {}", doc.url(), doc.error().expect("errored entry"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Reference resolving
//!
//! `file:` URLs and plain paths are read from the local filesystem and
//! `http(s):` URLs are fetched with `reqwest`; both built-ins can be
//! disabled via the `resolve-file` / `resolve-http` crate features or
//! replaced at runtime with custom [`Resolve`] implementations. Parsing
//! works the same way through the [`Parse`] trait.
mod bundle;
mod catalog;
mod crawl;
mod dereference;
mod error;
mod file;
mod options;
mod parsers;
mod pointer;
mod resolvers;
pub mod uri;

use serde_json::Value;

pub use catalog::{Catalog, Document, DocumentStatus};
pub use dereference::{CircularPolicy, Dereferenced, Node, NodeId};
pub use error::{BoxError, Error};
pub use file::FileInfo;
pub use options::Options;
pub use parsers::{BinaryParser, Parse, TextParser, YamlParser};
#[cfg(feature = "resolve-file")]
pub use resolvers::FileSystemResolver;
#[cfg(feature = "resolve-http")]
pub use resolvers::HttpResolver;
pub use resolvers::Resolve;
pub use uri::PathType;

/// Start configuring an operation.
#[must_use]
pub fn options() -> Options {
    Options::default()
}

/// Parse the root document at `location` and return its value, `$ref`s
/// intact.
///
/// # Errors
///
/// Fails when the root document cannot be located, read, or parsed.
pub fn parse(location: &str) -> Result<Value, Error> {
    Options::default().parse(location)
}

/// Resolve the document at `location` and everything it transitively
/// references into a [`Catalog`].
///
/// # Errors
///
/// Fails when a referenced document cannot be read or parsed.
pub fn resolve(location: &str) -> Result<Catalog, Error> {
    Options::default().resolve(location)
}

/// Resolve the document at `location`, then replace every `$ref` node by
/// its target.
///
/// # Errors
///
/// Fails on unresolvable documents or pointers.
pub fn dereference(location: &str) -> Result<Dereferenced, Error> {
    Options::default().dereference(location)
}

/// Resolve the document at `location`, then inline every external target
/// and rewrite all `$ref`s to local pointers.
///
/// # Errors
///
/// Fails on unresolvable documents or pointers.
pub fn bundle(location: &str) -> Result<Value, Error> {
    Options::default().bundle(location)
}
