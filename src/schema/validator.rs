use async_graphql::parser::parse_schema;
use tracing::{debug, error};

use super::diagnostic::Diagnostic;
use super::model::{ValidatedSchema, build};
use super::{sdl_rules, semantic};

/// Outcome of [`validate`]: a schema is present only when no stage reported anything.
#[derive(Debug, Clone)]
pub struct Validation {
    pub diagnostics: Vec<Diagnostic>,
    pub schema: Option<ValidatedSchema>,
}

impl Validation {
    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            diagnostics,
            schema: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.schema.is_some()
    }

    pub fn into_result(self) -> Result<ValidatedSchema, Vec<Diagnostic>> {
        match self.schema {
            Some(schema) if self.diagnostics.is_empty() => Ok(schema),
            _ => Err(self.diagnostics),
        }
    }
}

/// Validates and builds a schema from SDL text.
///
/// Stages run in order and stop at the first one that reports anything:
/// parsing, document-level SDL rules, the build into a type map, and the
/// semantic rules on that type map. A schema candidate that fails the last
/// stage is dropped here and never handed to the caller.
pub fn validate(sdl: &str) -> Validation {
    let document = match parse_schema(sdl) {
        Ok(document) => document,
        Err(err) => {
            debug!("SDL failed to parse: {}", err);
            return Validation::failed(vec![Diagnostic::from_parse_error(&err)]);
        }
    };

    let diagnostics = sdl_rules::validate_sdl(sdl, &document);
    if !diagnostics.is_empty() {
        debug!(count = diagnostics.len(), "SDL rules reported diagnostics");
        return Validation::failed(diagnostics);
    }

    let model = match build(&document) {
        Ok(model) => model,
        Err(err) => {
            error!("Schema build failed after SDL validation passed: {}", err);
            return Validation::failed(vec![Diagnostic::internal(format!(
                "Internal error while building schema: {}",
                err
            ))]);
        }
    };
    drop(document);

    let diagnostics = semantic::validate_schema(&model);
    if !diagnostics.is_empty() {
        debug!(count = diagnostics.len(), "schema rules reported diagnostics");
        return Validation::failed(diagnostics);
    }

    debug!(types = model.types.len(), "schema validated");
    Validation {
        diagnostics: Vec::new(),
        schema: Some(ValidatedSchema::new(model)),
    }
}
