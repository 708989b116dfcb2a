use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use arise_client::OpenCodeClient;
use arise_config::{
    global_config_path, load_config, opencode_config_dir, save_config, AriseConfig,
    CONFIG_FILE_NAME,
};
use arise_core::{SessionService, SessionStatus, ShadowKind, TaskCoordinator, TaskStatus};

const PLUGIN_NAME: &str = "opencode-arise";

const BANNER: &str = r#"
╔═══════════════════════════════════════════════════════╗
║                                                       ║
║               ⚔️  A R I S E !  ⚔️                     ║
║                                                       ║
║         ░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░           ║
║         ░░    Shadow Army Assembled    ░░░           ║
║         ░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░           ║
║                                                       ║
║   Monarch ready. Shadows await your command.          ║
║                                                       ║
╚═══════════════════════════════════════════════════════╝
"#;

#[derive(Parser)]
#[command(name = "arise", about = "Shadow army coordinator for OpenCode", version)]
struct Cli {
    /// Log filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the plugin with OpenCode and create a default config
    Install,
    /// Check installation status
    Doctor,
    /// Print the shadow roster
    Shadows,
    /// Show arise sessions on the server and their status
    Status,
    /// Summon a shadow
    Summon {
        /// Shadow to summon
        shadow: String,
        /// The task for the shadow
        prompt: String,
        /// Short description of the task
        #[arg(long)]
        description: Option<String>,
        /// Launch as a tracked background task
        #[arg(long)]
        background: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = cli
        .log
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Install => run_install(),
        Commands::Doctor => run_doctor(),
        Commands::Shadows => run_shadows(),
        Commands::Status => run_status().await,
        Commands::Summon {
            shadow,
            prompt,
            description,
            background,
        } => run_summon(&shadow, &prompt, description.as_deref(), background).await,
    }
}

/// Locate the user-level OpenCode config, preferring `.json` over `.jsonc`.
fn find_opencode_config() -> Option<PathBuf> {
    find_opencode_config_in(&opencode_config_dir()?)
}

fn find_opencode_config_in(dir: &Path) -> Option<PathBuf> {
    ["opencode.json", "opencode.jsonc"]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Register the plugin with OpenCode and create a default arise config.
fn run_install() -> Result<()> {
    let config = load_config();
    if config.show_banner {
        println!("{BANNER}");
    }
    println!("Installing {PLUGIN_NAME}...");
    println!();

    let config_path = find_opencode_config().ok_or_else(|| {
        anyhow::anyhow!(
            "OpenCode config not found. Is OpenCode installed?\n  \
             Expected: ~/.config/opencode/opencode.json"
        )
    })?;

    register_plugin(&config_path)?;

    let arise_path = global_config_path().context("could not resolve home directory")?;
    create_default_config(&arise_path)?;

    println!();
    println!("Installation complete!");
    println!();
    println!("  The Shadow Army awaits. Run 'opencode' to begin.");
    println!();
    println!("  Shadows available:");
    for shadow in ShadowKind::ALL {
        if shadow.summonable() {
            println!("    @{:<17} - {}", shadow.as_str(), shadow.summary());
        }
    }
    println!();
    Ok(())
}

/// Add the plugin to the OpenCode config's `plugin` array if absent.
///
/// `.jsonc` files are rewritten as plain JSON; comments do not survive
/// the update.
fn register_plugin(config_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let mut config: serde_json::Value = serde_json::from_str(&strip_jsonc(&content))
        .with_context(|| format!("parsing {}", config_path.display()))?;

    let plugins = config
        .as_object_mut()
        .context("OpenCode config is not a JSON object")?
        .entry("plugin")
        .or_insert_with(|| serde_json::json!([]));
    let list = plugins
        .as_array_mut()
        .context("'plugin' entry in OpenCode config is not an array")?;

    if list.iter().any(|p| p.as_str() == Some(PLUGIN_NAME)) {
        println!("  {PLUGIN_NAME} already registered in OpenCode config");
        return Ok(());
    }
    list.push(serde_json::json!(PLUGIN_NAME));

    std::fs::write(config_path, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("writing {}", config_path.display()))?;
    println!("  Added {PLUGIN_NAME} to {}", config_path.display());
    Ok(())
}

/// Write a default arise config unless one already exists.
fn create_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("  {CONFIG_FILE_NAME} already exists");
        return Ok(());
    }
    save_config(path, &AriseConfig::default())?;
    println!("  Created default config at {}", path.display());
    Ok(())
}

/// Check installation status.
fn run_doctor() -> Result<()> {
    println!("Checking {PLUGIN_NAME} installation...");
    println!();

    let Some(config_path) = find_opencode_config() else {
        println!("  OpenCode config: not found (expected ~/.config/opencode/opencode.json)");
        return Ok(());
    };
    println!("  OpenCode config: {}", config_path.display());

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match serde_json::from_str::<serde_json::Value>(&strip_jsonc(&content)) {
            Ok(config) => {
                let registered = config
                    .get("plugin")
                    .and_then(|p| p.as_array())
                    .is_some_and(|list| list.iter().any(|p| p.as_str() == Some(PLUGIN_NAME)));
                if registered {
                    println!("  Plugin:          registered");
                } else {
                    println!("  Plugin:          not registered (run `arise install`)");
                }
            }
            Err(err) => println!("  Plugin:          could not parse config ({err})"),
        },
        Err(err) => println!("  Plugin:          could not read config ({err})"),
    }

    match global_config_path() {
        Some(path) if path.exists() => match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<AriseConfig>(&content) {
                Ok(_) => println!("  Arise config:    {} (valid)", path.display()),
                Err(err) => println!("  Arise config:    {} (invalid: {err})", path.display()),
            },
            Err(err) => println!("  Arise config:    {} (unreadable: {err})", path.display()),
        },
        _ => println!("  Arise config:    not found (optional)"),
    }

    println!();
    println!("Doctor check complete");
    Ok(())
}

/// Print the shadow roster with effective models, marking disabled shadows.
fn run_shadows() -> Result<()> {
    let config = load_config();

    println!("Shadow roster:");
    println!();
    for shadow in ShadowKind::ALL {
        let model = config
            .model_override(shadow.as_str())
            .unwrap_or(shadow.default_model());
        let mark = if config.shadow_disabled(shadow.as_str()) {
            " (disabled)"
        } else {
            ""
        };
        println!(
            "  {:<17} {:<28} {}{mark}",
            shadow.as_str(),
            model,
            shadow.summary()
        );
    }
    Ok(())
}

/// List arise-created sessions on the server with their live status.
async fn run_status() -> Result<()> {
    let config = Arc::new(load_config());
    let client = OpenCodeClient::new(&config.server.base_url, config.clone())?;

    let sessions = client.list_sessions().await?;
    let statuses = client.session_status().await?;

    let arise_sessions: Vec<_> = sessions
        .iter()
        .filter(|s| s.title.starts_with("[arise"))
        .collect();
    if arise_sessions.is_empty() {
        println!("No arise sessions on {}", client.base_url());
        return Ok(());
    }

    println!("Arise sessions on {}:", client.base_url());
    println!();
    for session in arise_sessions {
        // Sessions the server no longer tracks read as idle.
        let status = statuses
            .get(&session.id)
            .copied()
            .unwrap_or(SessionStatus::Idle);
        println!(
            "  {:<28} {:<6} {}",
            session.id,
            status.as_str(),
            session.title
        );
    }
    Ok(())
}

async fn run_summon(
    shadow_name: &str,
    prompt: &str,
    description: Option<&str>,
    background: bool,
) -> Result<()> {
    let Some(shadow) = ShadowKind::from_str(shadow_name).filter(ShadowKind::summonable) else {
        anyhow::bail!(
            "unknown shadow '{shadow_name}' (expected one of: beru, igris, bellion, tusk, \
             tank, shadow-sovereign)"
        );
    };

    let config = Arc::new(load_config());
    if config.shadow_disabled(shadow.as_str()) {
        anyhow::bail!("shadow {shadow} is disabled in configuration");
    }

    let client = Arc::new(OpenCodeClient::new(&config.server.base_url, config.clone())?);
    let task_desc = description
        .map(str::to_string)
        .unwrap_or_else(|| format!("{shadow} task"));

    if background {
        return run_summon_background(client, shadow, prompt, &task_desc).await;
    }

    println!("Summoning {shadow}...");
    let title = format!("[arise] {task_desc}");
    let session_id = client.create_session(&title).await?;
    if session_id.is_empty() {
        anyhow::bail!("server returned no session id");
    }
    client.prompt(&session_id, shadow.as_str(), prompt).await?;

    let messages = client.messages(&session_id).await?;
    match messages.iter().rev().find(|m| m.is_assistant()) {
        Some(reply) => {
            let text = reply.text();
            if text.is_empty() {
                println!("{shadow} returned no text.");
            } else {
                println!();
                println!("{text}");
            }
        }
        None => println!("{shadow} completed but returned no message."),
    }
    Ok(())
}

/// Launch a tracked background task and follow it to completion.
async fn run_summon_background(
    client: Arc<OpenCodeClient>,
    shadow: ShadowKind,
    prompt: &str,
    task_desc: &str,
) -> Result<()> {
    let coordinator = TaskCoordinator::new(client.clone(), client.clone());
    let mut subscription = client.subscribe_events().await?;

    let task = coordinator
        .launch(shadow, prompt, task_desc, "cli")
        .await
        .map_err(|err| anyhow::anyhow!("failed to launch {shadow}: {err}"))?;
    println!("Summoned {shadow} in background.");
    println!("  Task ID:    {}", task.id);
    println!("  Session ID: {}", task.session_id);
    println!();

    let outcome = loop {
        tokio::select! {
            Some(event) = subscription.events.recv() => {
                coordinator.handle_event(&event).await;
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("Cancelling task {}...", task.id);
                if !coordinator.cancel(&task.id).await {
                    warn!("Task {} was already finished", task.id);
                }
            }
        }
        match coordinator.get_task(&task.id).await {
            Some(current) if current.status.is_terminal() => break current,
            _ => {}
        }
    };
    subscription.reader.abort();

    match outcome.status {
        TaskStatus::Completed => {
            println!("{} completed ({}s):", outcome.shadow, outcome.duration_secs());
            println!();
            println!("{}", outcome.result.as_deref().unwrap_or("(No output)"));
        }
        TaskStatus::Error => {
            let error = outcome.error.as_deref().unwrap_or("Unknown error");
            if error == "Cancelled" {
                println!("Task {} cancelled.", outcome.id);
            } else {
                anyhow::bail!("{} failed: {error}", outcome.shadow);
            }
        }
        TaskStatus::Running => unreachable!(),
    }
    Ok(())
}

/// Strip JSONC comments so serde_json can parse the rest. String contents
/// are left untouched.
fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Drop commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in content.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '}' | ']' => {
                let trimmed_len = out.trim_end().len();
                if out[..trimmed_len].ends_with(',') {
                    out.remove(trimmed_len - 1);
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Make JSONC content parseable by serde_json.
fn strip_jsonc(content: &str) -> String {
    strip_trailing_commas(&strip_comments(content))
}
