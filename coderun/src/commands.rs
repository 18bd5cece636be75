//! Subcommand handlers for listing languages and printing templates.

use anyhow::Result;
use shared::Language;

use crate::config::CoderunConfig;
use crate::ui;

/// Handle `coderun languages`
pub fn handle_languages(config: &CoderunConfig) -> Result<()> {
    ui::print_languages(config.last_language);
    Ok(())
}

/// Handle `coderun template <LANG>`
pub fn handle_template(language: Language) -> Result<()> {
    println!("{}", language.template());
    Ok(())
}
