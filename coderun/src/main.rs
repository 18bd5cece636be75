mod commands;
mod config;
mod terminal;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::CoderunConfig;
use exec_session_lib::{build_endpoint, SessionDriver, SessionOptions, SessionState, StartPolicy};
use shared::{EraseCode, Language};
use std::path::{Path, PathBuf};
use terminal::{Action, RawModeGuard, TranscriptRenderer};
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "coderun")]
#[command(about = "Run code on a remote execution backend and interact with it from the terminal")]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Source file to run (the language's starter template if omitted)
    file: Option<PathBuf>,

    /// Language: python, javascript or cpp (detected from the file extension if omitted)
    #[arg(short, long)]
    language: Option<Language>,

    /// Execution backend URL
    #[arg(long, env = "CODERUN_SERVER")]
    server: Option<String>,

    /// Auth token passed to the backend as a query parameter
    #[arg(long, env = "CODERUN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Control byte sent for Backspace: backspace (^H) or delete (^?)
    #[arg(long)]
    erase_code: Option<EraseCode>,

    /// What a re-run does while a program is still running: restart or ignore
    #[arg(long)]
    start_policy: Option<StartPolicy>,

    /// Remember --server, --token, --erase-code and --start-policy
    #[arg(long)]
    save: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List supported languages
    Languages,
    /// Print the starter template for a language
    Template { language: Language },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Raw mode owns stdout, so stay quiet unless RUST_LOG asks otherwise
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = CoderunConfig::load().context("Failed to load config file")?;

    match args.command {
        Some(Commands::Languages) => return commands::handle_languages(&config),
        Some(Commands::Template { language }) => return commands::handle_template(language),
        None => {}
    }

    let language = resolve_language(&args, &config);
    let (code, source) = match args.file {
        Some(ref path) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            path.display().to_string(),
        ),
        None => (
            language.template().to_string(),
            format!("{} (template)", language.file_name()),
        ),
    };

    let server_url = config.resolve_server_url(args.server.as_deref());
    let auth_token = config.resolve_auth_token(args.token.as_deref());
    let options = SessionOptions {
        erase_code: args.erase_code.or(config.erase_code).unwrap_or_default(),
        start_policy: args.start_policy.or(config.start_policy).unwrap_or_default(),
    };

    config.last_language = Some(language);
    if args.save {
        config.server_url = Some(server_url.clone());
        config.auth_token = auth_token.clone();
        config.erase_code = Some(options.erase_code);
        config.start_policy = Some(options.start_policy);
    }
    config.save().context("Failed to save config file")?;
    if args.save {
        ui::print_config_saved(&CoderunConfig::config_path()?.display().to_string());
    }

    let endpoint = build_endpoint(&server_url, auth_token.as_deref())
        .context("Invalid backend URL")?;

    ui::print_startup_banner();
    ui::print_run_info(language, &source, &display_endpoint(&endpoint));
    ui::print_key_help();

    run_interactive(endpoint, options, code, language).await
}

/// --language > file extension > last used > python
fn resolve_language(args: &Args, config: &CoderunConfig) -> Language {
    args.language
        .or_else(|| args.file.as_deref().and_then(language_from_path))
        .or(config.last_language)
        .unwrap_or_default()
}

fn language_from_path(path: &Path) -> Option<Language> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(Language::from_extension)
}

/// Endpoint without the token, for display
fn display_endpoint(endpoint: &Url) -> String {
    let mut shown = endpoint.clone();
    shown.set_query(None);
    shown.to_string()
}

/// State a start request leads to, before the driver reports back
fn expected_after_start(current: SessionState, policy: StartPolicy) -> SessionState {
    if current.is_active() && policy == StartPolicy::Ignore {
        current
    } else {
        SessionState::Connecting
    }
}

/// Drive one interactive session until the user quits
async fn run_interactive(
    endpoint: Url,
    options: SessionOptions,
    code: String,
    language: Language,
) -> Result<()> {
    let (driver, handle) = SessionDriver::websocket(endpoint, options, language);
    let driver_task = tokio::spawn(driver.run());
    let mut snapshots = handle.subscribe();

    let _raw_mode = RawModeGuard::enable().context("Failed to enable raw terminal mode")?;
    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    terminal::spawn_key_reader(action_tx);

    handle.start(code.clone(), language)?;

    let mut renderer = TranscriptRenderer::default();
    let mut stdout = std::io::stdout();
    // Tracks requests ahead of the driver so Ctrl+C right after a start stops it
    let mut state = expected_after_start(SessionState::Idle, options.start_policy);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                renderer
                    .render(&snapshot.text, &mut stdout)
                    .context("Failed to write to terminal")?;

                if snapshot.state != state {
                    debug!("Session state {} -> {}", state, snapshot.state);
                    state = snapshot.state;
                    if state.is_terminal() {
                        ui::print_finished(state);
                        renderer.invalidate();
                    }
                }
            }
            action = action_rx.recv() => match action {
                Some(Action::Key(key)) => handle.send_key(key)?,
                Some(Action::Stop) if state.is_active() => handle.stop()?,
                Some(Action::Rerun) => {
                    handle.start(code.clone(), language)?;
                    state = expected_after_start(state, options.start_policy);
                }
                // an emptied transcript redraws the screen
                Some(Action::Clear) => handle.clear()?,
                Some(Action::Stop) | Some(Action::Quit) | None => break,
            },
        }
    }

    info!("Shutting down");
    let _ = handle.shutdown();
    driver_task.await.context("Session driver failed")?;
    print!("\r\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn language_from_flag_wins() {
        let args = parse(&["coderun", "main.py", "--language", "cpp"]);
        assert_eq!(resolve_language(&args, &CoderunConfig::default()), Language::Cpp);
    }

    #[test]
    fn language_from_extension_then_config() {
        let config = CoderunConfig {
            last_language: Some(Language::Javascript),
            ..Default::default()
        };

        let args = parse(&["coderun", "solution.cc"]);
        assert_eq!(resolve_language(&args, &config), Language::Cpp);

        let args = parse(&["coderun", "notes.txt"]);
        assert_eq!(resolve_language(&args, &config), Language::Javascript);

        let args = parse(&["coderun"]);
        assert_eq!(
            resolve_language(&args, &CoderunConfig::default()),
            Language::Python
        );
    }

    #[test]
    fn subcommands_parse() {
        let args = parse(&["coderun", "template", "js"]);
        assert!(matches!(
            args.command,
            Some(Commands::Template {
                language: Language::Javascript
            })
        ));
        assert!(matches!(
            parse(&["coderun", "languages"]).command,
            Some(Commands::Languages)
        ));
    }

    #[test]
    fn options_parse() {
        let args = parse(&[
            "coderun",
            "--erase-code",
            "backspace",
            "--start-policy",
            "ignore",
            "--server",
            "ws://localhost:9000/run",
        ]);
        assert_eq!(args.erase_code, Some(EraseCode::Backspace));
        assert_eq!(args.start_policy, Some(StartPolicy::Ignore));
        assert_eq!(args.server.as_deref(), Some("ws://localhost:9000/run"));
        assert!(Args::try_parse_from(["coderun", "--language", "rust"]).is_err());
    }

    #[test]
    fn start_request_is_tracked_before_driver_reports() {
        for policy in [StartPolicy::Restart, StartPolicy::Ignore] {
            for finished in [
                SessionState::Idle,
                SessionState::Completed,
                SessionState::Errored,
                SessionState::Stopped,
            ] {
                assert_eq!(
                    expected_after_start(finished, policy),
                    SessionState::Connecting
                );
            }
        }

        assert_eq!(
            expected_after_start(SessionState::Running, StartPolicy::Restart),
            SessionState::Connecting
        );
        assert_eq!(
            expected_after_start(SessionState::Running, StartPolicy::Ignore),
            SessionState::Running
        );
        assert!(expected_after_start(SessionState::Idle, StartPolicy::Ignore).is_active());
    }

    #[test]
    fn endpoint_display_hides_token() {
        let endpoint = build_endpoint("ws://localhost:5000/run", Some("secret")).unwrap();
        assert_eq!(display_endpoint(&endpoint), "ws://localhost:5000/run");
    }
}
