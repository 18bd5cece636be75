//! Terminal UI helpers for the coderun CLI.

use colored::Colorize;
use exec_session_lib::SessionState;
use shared::Language;
use std::io::Write;

/// Print the startup banner
pub fn print_startup_banner() {
    println!();
    println!(
        "{}",
        "╭──────────────────────────────────────╮".bright_blue()
    );
    println!(
        "{}",
        "│            coderun session           │".bright_blue()
    );
    println!(
        "{}",
        "╰──────────────────────────────────────╯".bright_blue()
    );
    println!();
}

/// Print what is about to run and where
pub fn print_run_info(language: Language, source: &str, endpoint: &str) {
    println!(
        "  {} {} ({})",
        "Language:".dimmed(),
        language.display_name().bright_white(),
        language.as_str().bright_cyan()
    );
    println!("  {} {}", "Source:".dimmed(), source.bright_white());
    println!("  {} {}", "Backend:".dimmed(), endpoint.bright_white());
    println!();
}

/// Print the key bindings
pub fn print_key_help() {
    println!(
        "  {} stop   {} re-run   {} clear   {} quit",
        "Ctrl+C".bright_yellow(),
        "Ctrl+R".bright_yellow(),
        "Ctrl+L".bright_yellow(),
        "Ctrl+D".bright_yellow()
    );
    println!();
}

/// Print the outcome of a run. Called in raw mode, hence explicit `\r\n`.
pub fn print_finished(state: SessionState) {
    let label = match state {
        SessionState::Completed => "✓ completed".bright_green(),
        SessionState::Stopped => "■ stopped".bright_yellow(),
        SessionState::Errored => "✗ failed".bright_red(),
        _ => return,
    };
    print!(
        "\r\n  {}  {}\r\n",
        label,
        "Ctrl+R to run again, Ctrl+D to quit".dimmed()
    );
    let _ = std::io::stdout().flush();
}

/// Print the language table for `coderun languages`
pub fn print_languages(current: Option<Language>) {
    for language in Language::ALL {
        let marker = if Some(language) == current {
            "→".bright_green()
        } else {
            " ".normal()
        };
        println!(
            "{} {:<11} {:<11} {}",
            marker,
            language.as_str().bright_cyan(),
            language.display_name(),
            language.file_name().dimmed()
        );
    }
}

/// Print config save confirmation
pub fn print_config_saved(path: &str) {
    println!("{} Configuration saved to {}", "✓".bright_green(), path);
}
