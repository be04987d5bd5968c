use anyhow::Result;
use colored::Colorize;
use std::process::ExitCode;

use super::utils::{print_diagnostics, read_sdl};
use crate::schema::{summarize, validate};

pub fn handle_types(source: &str, json: bool) -> Result<ExitCode> {
    let sdl = read_sdl(source)?;
    let schema = match validate(&sdl).into_result() {
        Ok(schema) => schema,
        Err(diagnostics) => {
            print_diagnostics(&diagnostics);
            return Ok(ExitCode::FAILURE);
        }
    };

    let summary = summarize(&schema);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(ExitCode::SUCCESS);
    }

    for ty in &summary {
        println!("{}", ty.type_name.cyan().bold());
        for field in &ty.fields {
            println!("  {}", field);
        }
    }
    Ok(ExitCode::SUCCESS)
}
