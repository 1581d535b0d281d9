//! Rendering: the scope model, the tree walker and its helpers.
//!
//! ## Evaluation model
//!
//! Declarations are not evaluated when bound. A `%name` reference renders the bound
//! children every time it is used, so references inside a loop see the current `it`.
//! Only `name := value` renders once, at the point of declaration.
//!
//! Wrappers (block templates, token templates, `default`, group wrappers and templates
//! with a body) receive their content through the anonymous stack, never through scope.

pub mod inline;
pub mod render;
pub mod scope;
mod script;
pub mod taginator;
pub mod text;

pub use render::Renderer;
pub use scope::{AnonContent, AnonStack, ScopeStack};
pub use taginator::TagQueue;
