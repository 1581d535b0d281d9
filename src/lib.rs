//! Bobbin: a line-oriented markup and templating engine for static sites.
//!
//! Pages are lexed and parsed into an [`ast`] tree, then rendered by the
//! [`runtime`] walker inside an [`engine::Session`]. The [`site`] module drives a whole
//! project on disk; [`host`] holds the seams an embedder implements instead.

pub mod ast;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod host;
pub mod logging;
pub mod markup;
pub mod runtime;
pub mod site;
pub mod syntax;

pub use engine::{Options, Session};
pub use errors::{BobbinError, Diagnostics, ErrorKind, Severity};
pub use host::{FileResolver, Resource, ResourceKind, ScriptAccessors, ScriptSandbox};
pub use markup::{Markup, Page};
