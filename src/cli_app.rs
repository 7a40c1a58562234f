//! Top-level CLI definition and dispatch.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use loan_desk::api::ApplicationApi;
use loan_desk::api::http::HttpApi;
use loan_desk::cli::watch::{self, DeskScreen, TerminalModals, TerminalToasts, TerminalView};
use loan_desk::core::config::Config;
use loan_desk::core::errors::DeskError;
use loan_desk::engine::badges::BadgeBoard;
use loan_desk::engine::controller::ControllerSettings;
use loan_desk::engine::desktop::DesktopNotifier;
use loan_desk::engine::host::Collaborators;
use loan_desk::engine::jobs::UNKNOWN_ERROR;
use loan_desk::engine::runtime::Engine;
use loan_desk::engine::signals::SignalHandler;
use loan_desk::logger::activity::{ActivityEvent, ActivityLoggerConfig, spawn_logger};
use loan_desk::logger::jsonl::JsonlConfig;
use loan_desk::model::section::Section;
use loan_desk::model::users::{NewUser, Role, Session};
use loan_desk::table::reconcile::{RowIds, reconcile};
use loan_desk::table::view::{SectionBody, SectionView};

/// Loan Desk: live loan application tables for approvers and officers.
#[derive(Debug, Parser)]
#[command(
    name = "ldk",
    author,
    version,
    about = "Loan Desk - application approval desk",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Desk user; overrides `session.user` from the config.
    #[arg(long, global = true, value_name = "NAME")]
    user: Option<String>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Open the live desk in the terminal.
    Watch(WatchArgs),
    /// Print the applications of one section.
    List(ListArgs),
    /// Show per-section counts and the user's pending count.
    Counts,
    /// Show one application's details.
    Show(ShowArgs),
    /// Manage desk users.
    Users(UsersArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct WatchArgs {
    /// Section to open instead of Pending.
    #[arg(long, value_parser = parse_section, value_name = "SECTION")]
    section: Option<Section>,
    /// Do not raise desktop notifications for new assignments.
    #[arg(long)]
    no_notify: bool,
}

#[derive(Debug, Clone, Args)]
struct ListArgs {
    /// new, pending, pending-approvals or approved.
    #[arg(value_parser = parse_section)]
    section: Section,
    /// Print the table body markup instead of text rows.
    #[arg(long)]
    html: bool,
}

#[derive(Debug, Clone, Args)]
struct ShowArgs {
    /// Application number.
    app_number: String,
}

#[derive(Debug, Clone, Args)]
struct UsersArgs {
    #[command(subcommand)]
    command: UsersCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum UsersCommand {
    /// List users known to the service.
    List,
    /// Create a user.
    Add {
        /// User name.
        name: String,
        /// Role label, e.g. "Credit Officer".
        #[arg(long)]
        role: String,
        /// Approval level; defaults to the role's level.
        #[arg(long)]
        level: Option<u8>,
    },
    /// Delete a user.
    Delete {
        /// User name.
        name: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

fn parse_section(raw: &str) -> Result<Section, String> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<Section>()
        .map_err(|_| {
            let known: Vec<&str> = Section::ALL.iter().map(|s| s.id()).collect();
            format!("unknown section {raw:?} (expected one of: {})", known.join(", "))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment, service or transport failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<DeskError> for CliError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::InvalidConfig { .. }
            | DeskError::MissingConfig { .. }
            | DeskError::ConfigParse { .. }
            | DeskError::UnknownSection { .. }
            | DeskError::NoSession { .. } => Self::User(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Watch(args) => run_watch(cli, args),
        Command::List(args) => run_list(cli, args),
        Command::Counts => run_counts(cli),
        Command::Show(args) => run_show(cli, args),
        Command::Users(args) => run_users(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn desk_user(cli: &Cli, config: &Config) -> Result<String, CliError> {
    cli.user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .or_else(|| config.session.user.clone())
        .ok_or_else(|| {
            CliError::User("no desk user: pass --user or set session.user in the config".into())
        })
}

// ──────────────────── watch ────────────────────

fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let user = desk_user(cli, &config)?;
    let api: Arc<dyn ApplicationApi> = Arc::new(HttpApi::new(&config.api)?);

    let session = Session::from_login(&user, api.login(&user)?)?;

    let (log, log_join) = spawn_logger(ActivityLoggerConfig {
        jsonl_config: JsonlConfig {
            path: config.paths.activity_log.clone(),
            ..JsonlConfig::default()
        },
        channel_capacity: 0,
    })?;
    log.send(ActivityEvent::SessionStarted {
        user: session.user.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        config_hash: config.stable_hash()?,
    });

    let screen = DeskScreen::shared(&session.display_name());
    let mut host = Collaborators::new(Box::new(TerminalView(Arc::clone(&screen))))
        .with_modals(Box::new(TerminalModals(Arc::clone(&screen))))
        .with_toasts(Box::new(TerminalToasts(Arc::clone(&screen))));
    if config.notifications.enabled && !args.no_notify {
        let expire_ms = u64::try_from(config.notifications.dismiss_after().as_millis())
            .unwrap_or(u64::MAX);
        host = host.with_notifier(Box::new(DesktopNotifier::new(expire_ms)));
    }

    let signals = SignalHandler::new();
    let engine = Engine::spawn(
        ControllerSettings::from_config(&config),
        host,
        Arc::clone(&api),
        log.clone(),
    )?;
    engine.sign_in(session)?;
    engine.initialize_and_start_polling()?;
    if let Some(section) = args.section {
        engine.show_section(section)?;
    }

    let ui_result = watch::run(&engine, &screen, &signals);

    let shutdown_result = engine.shutdown();
    log.shutdown();
    if log_join.join().is_err() {
        eprintln!("[LDK-CLI] logger thread panicked");
    }
    let dropped = log.dropped_events();
    if dropped > 0 {
        eprintln!("[LDK-CLI] {dropped} activity events dropped");
    }

    ui_result?;
    shutdown_result?;
    Ok(())
}

// ──────────────────── list / counts / show ────────────────────

fn run_list(cli: &Cli, args: &ListArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let api = HttpApi::new(&config.api)?;
    let section = args.section;

    let records = api
        .fetch_applications(&section.stage())?
        .into_result("applications", UNKNOWN_ERROR)?
        .unwrap_or_default();

    let mut ids = RowIds::new();
    let rows = reconcile(Vec::new(), &records, &mut ids).rows;

    if args.html {
        let view = SectionView {
            body: SectionBody::Rows(rows),
            ..SectionView::default()
        };
        println!("{}", view.to_markup());
        return Ok(());
    }

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{} ({} applications)",
                section.title().bold(),
                rows.len()
            );
            if rows.is_empty() {
                println!("  {}", "No applications".dimmed());
            }
            for row in &rows {
                let v = &row.view;
                println!(
                    "  {:<14} {:<24} {:>14}  {:<12} {}",
                    v.app_number.cyan(),
                    v.applicant_name,
                    v.amount,
                    v.date,
                    v.action_by
                );
            }
        }
        OutputMode::Json => {
            let views: Vec<_> = rows.iter().map(|row| &row.view).collect();
            let payload = json!({
                "command": "list",
                "section": section.id(),
                "stage": section.stage().as_str(),
                "count": views.len(),
                "rows": serde_json::to_value(views)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_counts(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let api = HttpApi::new(&config.api)?;

    let counts = api
        .fetch_application_counts()?
        .into_result("applications/counts", UNKNOWN_ERROR)?
        .unwrap_or_default();
    let mut badges = BadgeBoard::new();
    badges.apply_counts(&counts);

    let user = desk_user(cli, &config).ok();
    let user_count = match &user {
        Some(name) => Some(api.fetch_user_pending_count(name)?.count),
        None => None,
    };
    if let Some(n) = user_count {
        badges.apply_user_count(n);
    }

    match output_mode(cli) {
        OutputMode::Human => {
            for section in Section::ALL {
                println!(
                    "  {:<20} {}",
                    section.title(),
                    counts.for_section(section).to_string().bold()
                );
            }
            if let (Some(name), Some(_)) = (&user, user_count) {
                println!("  {:<20} {}", format!("Awaiting {name}"), badges.user().text.yellow());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "counts",
                "counts": serde_json::to_value(counts)?,
                "user": user,
                "user_pending": user_count,
                "badges": serde_json::to_value(&badges)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_show(cli: &Cli, args: &ShowArgs) -> Result<(), CliError> {
    let app_number = args.app_number.trim();
    if app_number.is_empty() {
        return Err(CliError::User("Invalid application number".to_string()));
    }
    let config = load_config(cli)?;
    let user = desk_user(cli, &config)?;
    let api = HttpApi::new(&config.api)?;

    let detail = api
        .fetch_application_details(app_number, &user)?
        .into_result("applications/details", "Not found")?
        .ok_or_else(|| CliError::Runtime("Not found".to_string()))?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", format!("Application {}", detail.app_number).bold());
            if detail.is_new_draft() {
                println!("  {}", "draft: reopens the application form".yellow());
            }
            for line in watch::detail_lines(&detail) {
                println!("  {line}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "show",
                "draft": detail.is_new_draft(),
                "application": serde_json::to_value(&detail)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── users ────────────────────

fn run_users(cli: &Cli, args: &UsersArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let api = HttpApi::new(&config.api)?;

    match &args.command {
        UsersCommand::List => {
            let users = api
                .list_users()?
                .into_result("users", "Failed to load users")?
                .unwrap_or_default();
            match output_mode(cli) {
                OutputMode::Human => {
                    for user in &users {
                        let level = user
                            .level
                            .map_or_else(|| "-".to_string(), |l| l.to_string());
                        println!("  {:<24} {:<26} {level}", user.name.bold(), user.role);
                    }
                    if users.is_empty() {
                        println!("  {}", "No users".dimmed());
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "users list",
                        "users": serde_json::to_value(&users)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        UsersCommand::Add { name, role, level } => {
            let role: Role = role.parse()?;
            let new_user = NewUser::new(name, role, *level)?;
            api.add_user(&new_user)?
                .into_result("users", "Failed to add user")?;
            emit_done(
                cli,
                "users add",
                &format!("Added {} ({}, level {})", new_user.name, new_user.role, new_user.level),
                serde_json::to_value(&new_user)?,
            )
        }
        UsersCommand::Delete { name, yes } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(CliError::User("user name must not be empty".to_string()));
            }
            if !*yes && !confirm(&format!("Delete user {name}?"))? {
                return Err(CliError::User("aborted".to_string()));
            }
            api.delete_user(name)?
                .into_result("users", "Failed to delete user")?;
            emit_done(cli, "users delete", &format!("Deleted {name}"), json!({ "name": name }))
        }
    }
}

fn emit_done(cli: &Cli, command: &str, message: &str, detail: Value) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => println!("{}", message.green()),
        OutputMode::Json => {
            let payload = json!({
                "command": command,
                "ok": true,
                "detail": detail,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    if !io::stdin().is_terminal() {
        return Err(CliError::User(
            "refusing to prompt without a terminal; pass --yes".to_string(),
        ));
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => println!("{}", config.to_toml()?),
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("LDK_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "ldk",
            "--config",
            "/tmp/ldk.toml",
            "--json",
            "--no-color",
            "--user",
            "alice",
            "counts",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["ldk", "counts", "--json", "--user", "alice"]);
        let cli = after.unwrap();
        assert!(cli.json);
        assert_eq!(cli.user.as_deref(), Some("alice"));
    }

    #[test]
    fn parses_every_subcommand() {
        let cases = [
            vec!["ldk", "watch"],
            vec!["ldk", "watch", "--section", "approved", "--no-notify"],
            vec!["ldk", "list", "pending-approvals"],
            vec!["ldk", "list", "new", "--html"],
            vec!["ldk", "counts"],
            vec!["ldk", "show", "APP-001"],
            vec!["ldk", "users", "list"],
            vec!["ldk", "users", "add", "bob", "--role", "Credit Officer"],
            vec!["ldk", "users", "add", "eve", "--role", "Approver", "--level", "4"],
            vec!["ldk", "users", "delete", "bob", "--yes"],
            vec!["ldk", "config"],
            vec!["ldk", "config", "path"],
            vec!["ldk", "config", "show"],
            vec!["ldk", "config", "validate"],
            vec!["ldk", "completions", "bash"],
        ];
        for case in cases {
            assert!(
                Cli::try_parse_from(case.clone()).is_ok(),
                "failed to parse {case:?}"
            );
        }
    }

    #[test]
    fn section_argument_is_validated() {
        let cli = Cli::try_parse_from(["ldk", "list", "Pending-Approvals"]).unwrap();
        match cli.command {
            Command::List(args) => assert_eq!(args.section, Section::PendingApprovals),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["ldk", "list", "archived"]).is_err());
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn desk_errors_map_to_exit_codes() {
        let user: CliError = DeskError::UnknownSection {
            section: "x".into(),
        }
        .into();
        assert_eq!(user.exit_code(), 1);
        let runtime: CliError = DeskError::Transport {
            endpoint: "login".into(),
            details: "refused".into(),
        }
        .into();
        assert_eq!(runtime.exit_code(), 2);
    }

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
    }

    #[test]
    fn user_flag_wins_over_config() {
        let mut config = Config::default();
        config.session.user = Some("carol".into());
        let cli = Cli::try_parse_from(["ldk", "counts", "--user", " dave "]).unwrap();
        assert_eq!(desk_user(&cli, &config).unwrap(), "dave");
        let cli = Cli::try_parse_from(["ldk", "counts"]).unwrap();
        assert_eq!(desk_user(&cli, &config).unwrap(), "carol");
        config.session.user = None;
        assert!(desk_user(&cli, &config).is_err());
    }
}
