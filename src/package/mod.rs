//! Package resolution.
//!
//! Typst packages are referenced in documents like:
//! ```typst
//! #import "@preview/cetz:0.3.0": canvas, draw
//! ```
//!
//! When such an import is compiled:
//! 1. [`PathResolver`] maps the spec to `{cache_root}/{namespace}/{name}-{version}/`
//! 2. [`PackageRegistry`] checks whether that directory is already resident
//! 3. If not, the bundle is pulled through the injected [`Transport`],
//!    decoded, and committed to the mount in one batch
//!
//! Concurrent resolves of the same spec share a single pull. Failed pulls
//! are not remembered, so the next resolve tries again.

mod archive;
mod registry;
mod resolver;
mod spec;
mod transport;

pub use registry::PackageRegistry;
pub use resolver::PathResolver;
pub use spec::{PackageSpec, PackageVersion, SpecParseError};
pub use transport::{BlockingTransport, FnTransport, Transport};
