//! Prelude module for convenient imports.
//!
//! ```ignore
//! use typst_access::prelude::*;
//! ```

// Access models
pub use crate::access::{
    AccessModel, DirAccessModel, FileRecord, MemoryAccessModel, Mount, NetworkAccessModel, OverlayAccessModel,
    WritableAccessModel,
};

// Packages
pub use crate::package::{
    BlockingTransport, FnTransport, PackageRegistry, PackageSpec, PackageVersion, PathResolver, Transport,
};

// Bridge
pub use crate::bridge::{
    Attempt, BlockingAccess, CompileDriver, Discovered, Discovery, Engine, MountWarmer, Warmer,
};
pub use crate::compile::{HtmlOutput, TypstEngine};

// World
pub use crate::resource::{FontOptions, FontSet};
pub use crate::world::{AccessWorld, Timestamp, WorldBuilder};

// Configuration
pub use crate::config::{AccessConfig, ConfigBuilder};

// Diagnostics
pub use crate::diagnostic::{
    CompileError, DiagnosticInfo, DiagnosticOptions, DiagnosticSummary, Diagnostics, format_missing,
};

// Errors
pub use crate::error::{
    AccessError, AccessResult, BridgeError, ConfigError, ConfinementError, RegistryError, TransportError,
    WarmError,
};
pub use crate::path::VirtualPath;
