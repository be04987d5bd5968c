use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{self, Read};

use crate::schema::Diagnostic;

/// Reads SDL from a file, or from stdin when `source` is `-`.
pub fn read_sdl(source: &str) -> Result<String> {
    if source == "-" {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        return Ok(content);
    }
    std::fs::read_to_string(source).with_context(|| format!("Failed to read SDL from {}", source))
}

/// One line per diagnostic, in the `Error <message> Location Line: L Column: C` shape.
pub fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    match diagnostic.location {
        Some(location) => format!(
            "{} {} Location Line: {} Column: {}",
            "Error".red().bold(),
            diagnostic.message,
            location.line,
            location.column
        ),
        None => format!("{} {}", "Error".red().bold(), diagnostic.message),
    }
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        println!("{}", format_diagnostic(diagnostic));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Location, validate};

    #[test]
    fn test_format_with_location() {
        colored::control::set_override(false);
        let mut diagnostic = Diagnostic::internal("Unknown type \"Ship\".");
        diagnostic.location = Some(Location { line: 3, column: 9 });
        assert_eq!(
            format_diagnostic(&diagnostic),
            "Error Unknown type \"Ship\". Location Line: 3 Column: 9"
        );
    }

    #[test]
    fn test_format_without_location() {
        colored::control::set_override(false);
        let diagnostics = validate("type Ship { id: ID! }").diagnostics;
        assert_eq!(
            format_diagnostic(&diagnostics[0]),
            format!("Error {}", diagnostics[0].message)
        );
    }
}
