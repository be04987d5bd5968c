//! SDL validation and the schema type map.
//!
//! [`validate`] turns SDL text into either a [`ValidatedSchema`] or a list of
//! [`Diagnostic`]s, never both. [`summarize`] reports the object types of a
//! validated schema.
//!
//! ```
//! use gqlwire::schema::{summarize, validate};
//!
//! let schema = validate("type Query { hello: String! }").into_result().unwrap();
//! let types = summarize(&schema);
//! assert_eq!(types[0].type_name, "Query");
//! assert_eq!(types[0].fields, ["hello"]);
//! ```

mod diagnostic;
mod introspect;
mod model;
mod sdl_rules;
mod semantic;
mod validator;

pub use diagnostic::{Diagnostic, DiagnosticKind, Location};
pub use introspect::{TypeSummary, summarize};
pub use model::{BUILTIN_SCALARS, ValidatedSchema, is_builtin_scalar};
pub use validator::{Validation, validate};

pub(crate) use model::{SchemaModel, TypeDef};
