use anyhow::Result;
use colored::Colorize;
use std::process::ExitCode;
use tracing::debug;

use super::utils::{print_diagnostics, read_sdl};
use crate::schema::validate;

pub fn handle_check(source: &str, json: bool) -> Result<ExitCode> {
    let sdl = read_sdl(source)?;
    let validation = validate(&sdl);
    debug!(
        source,
        diagnostics = validation.diagnostics.len(),
        "Checked SDL"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&validation.diagnostics)?);
    } else if validation.diagnostics.is_empty() {
        println!("{}", "No errors".green());
    } else {
        print_diagnostics(&validation.diagnostics);
    }

    Ok(if validation.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
