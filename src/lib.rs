//! # typst-access
//!
//! Pluggable file access and package resolution for embedding Typst in
//! hosts whose data is not on local disk: browsers, editors holding unsaved
//! buffers, servers serving documents from object storage.
//!
//! Typst reads files synchronously and expects an answer right away. This
//! crate splits that into three layers:
//!
//! - **Access models** ([`access`]): synchronous, non-blocking reads over a
//!   mount of [`VirtualPath`]s. In-memory, directory, overlay and
//!   network-backed implementations are provided.
//! - **Package registry** ([`package`]): resolves `@namespace/name:version`
//!   to a mount directory, pulling and unpacking the bundle through an
//!   injected [`Transport`](package::Transport) on first use. Concurrent
//!   resolves of one package share a single pull.
//! - **Bridge** ([`bridge`]): warms caches ahead of a compile and retries
//!   the compile a bounded number of times while it keeps missing files.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use typst_access::prelude::*;
//!
//! let config = AccessConfig::default();
//! let mount = Arc::new(MemoryAccessModel::new());
//! mount.insert_file(VirtualPath::new("main.typ")?, source.into(), now);
//!
//! let registry = PackageRegistry::new(&config, mount.clone(), Arc::new(transport))?;
//! let world = AccessWorld::builder(mount.clone(), registry.resolver().clone(), VirtualPath::new("main.typ")?)
//!     .build()?;
//!
//! let driver = CompileDriver::new(MountWarmer::new().with_registry(registry), &config);
//! let output = driver.run(&mut TypstEngine::new(world), &[]).await?;
//! std::fs::write("index.html", output.html)?;
//! ```
//!
//! ## Blocking hosts
//!
//! CLI hosts can skip the retry loop: wrap the mount in
//! [`BlockingAccess`](bridge::BlockingAccess) with a registry built on a
//! [`BlockingTransport`](package::BlockingTransport), and every miss is
//! fetched inside the read.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod bridge;
pub mod compile;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod package;
pub mod path;
pub mod prelude;
pub mod resource;
pub mod world;

mod inflight;

#[cfg(test)]
mod testing;

pub use error::{
    AccessError, AccessResult, BridgeError, ConfigError, ConfinementError, RegistryError, TransportError,
    WarmError,
};
pub use path::VirtualPath;

/// Full typst crate for custom compilation workflows.
pub use typst;

/// typst-html crate for HTML rendering.
pub use typst_html;

/// typst-kit for font and package utilities.
pub use typst_kit;
