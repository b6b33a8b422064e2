use crate::api::{HttpInboxApi, InboxApi};
use crate::bus::RealtimeHub;
use crate::config::credentials::credential_status;
use crate::config::{Config, get_config_path, load_config, save_config};
use crate::engine::{Engine, EngineEvent, EngineSettings};
use crate::model::{Direction, Message, MessageStatus};
use crate::notify::LogNotifier;
use crate::window::{Eligibility, WindowSnapshot};
use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// Upper bound on pages fetched by `watch --history`.
const MAX_HISTORY_PAGES: usize = 100;

struct Session {
    engine: Engine,
    api: Arc<HttpInboxApi>,
    hub: Arc<RealtimeHub>,
}

fn connect(config: &Config) -> Session {
    let api = Arc::new(HttpInboxApi::new(
        &config.api.base_url,
        &config.api.access_token,
    ));
    let hub = Arc::new(RealtimeHub::default());
    let engine = Engine::new(
        api.clone(),
        hub.clone(),
        Arc::new(LogNotifier),
        EngineSettings::from_config(config),
    );
    Session { engine, api, hub }
}

/// One transcript line: `[hh:mm:ss] < text` for inbound, `>` for outbound.
pub(super) fn format_message(message: &Message) -> String {
    let arrow = match message.direction {
        Direction::Inbound => '<',
        Direction::Outbound => '>',
    };
    let body = if message.content_text.is_empty() {
        format!("[{}]", message.message_type.as_str())
    } else {
        message.content_text.clone()
    };
    let mut line = format!("[{}] {} {}", message.timestamp.format("%H:%M:%S"), arrow, body);
    if let Some(template) = &message.template_name {
        line.push_str(&format!(" (template {template})"));
    }
    if message.is_optimistic() {
        line.push_str(" (sending)");
    } else if message.status == MessageStatus::Failed {
        line.push_str(&format!(" (failed, id {})", message.id));
    }
    line
}

/// Key under which a message is printed once; an echo shares its placeholder's key.
fn print_key(message: &Message) -> String {
    message
        .client_temp_id
        .clone()
        .unwrap_or_else(|| message.id.clone())
}

pub(super) fn format_window(snapshot: &WindowSnapshot) -> String {
    let mut lines = vec![format!("Mode: {}", snapshot.mode)];
    let eligibility = match snapshot.eligibility {
        Eligibility::Unknown => "unknown (free-form allowed)".to_string(),
        Eligibility::Failed => "check failed (free-form allowed)".to_string(),
        Eligibility::Known(price) if price.is_free => "free-form allowed".to_string(),
        Eligibility::Known(price) => match price.price_eur {
            Some(eur) => format!("template required ({eur:.4} EUR)"),
            None => "template required".to_string(),
        },
    };
    lines.push(format!("Eligibility: {eligibility}"));
    lines.push(format!("Template preference: {:?}", snapshot.preference));
    if let Some(at) = snapshot.last_inbound_at {
        lines.push(format!("Last customer message: {}", at.to_rfc3339()));
    }
    if let Some(at) = snapshot.expires_at {
        lines.push(format!("Service window ends: {}", at.to_rfc3339()));
    }
    if let Some(at) = snapshot.last_template_sent_at {
        lines.push(format!("Last template sent: {}", at.to_rfc3339()));
    }
    if let Some(templates) = &snapshot.templates {
        lines.push(format!("Templates loaded: {}", templates.len()));
    }
    lines.join("\n")
}

pub(super) async fn watch(config_path: Option<&Path>, conversation: &str, history: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let session = connect(&config);
    let engine = session.engine.clone();

    let gateway = if config.gateway.enabled {
        Some(
            crate::gateway::start(
                &config.gateway.host,
                config.gateway.port,
                &config.gateway.secret,
                session.hub.clone(),
            )
            .await?,
        )
    } else {
        None
    };

    let mut events = engine.subscribe();
    engine.open(conversation).await?;
    if history {
        for _ in 0..MAX_HISTORY_PAGES {
            if engine.load_older().await? {
                break;
            }
        }
    }

    let title = engine
        .conversation()
        .await
        .map_or_else(|| conversation.to_string(), |c| c.title().to_string());
    println!("{} ({})", title, engine.window().await.mode);
    println!("Type a line and press enter to send. Ctrl-C quits.\n");

    let mut printed = HashSet::new();
    print_new(&engine, &mut printed).await;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
            line = stdin.next_line() => {
                match line? {
                    Some(text) if !text.trim().is_empty() => {
                        if let Err(failure) = engine.send_text(&text).await {
                            println!("! not sent: {}", failure.error);
                        }
                    }
                    Some(_) => engine.on_compose_input().await,
                    None => break,
                }
            }
            event = events.recv() => match event {
                Ok(EngineEvent::MessagesChanged) => print_new(&engine, &mut printed).await,
                Ok(EngineEvent::WindowChanged(mode)) => println!("-- window: {mode}"),
                Ok(EngineEvent::TemplatesChanged) => {
                    println!("-- {} templates available", engine.templates().await.len());
                }
                Ok(EngineEvent::ReactionsChanged { message_id }) => {
                    let emojis: Vec<String> = engine
                        .reactions(&message_id)
                        .await
                        .into_iter()
                        .map(|r| r.emoji)
                        .collect();
                    println!("-- reactions on {}: {}", message_id, emojis.join(" "));
                }
                Ok(EngineEvent::DraftRestored(content)) => {
                    println!("-- draft restored: {}", content.preview_text());
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("missed {} engine events, reprinting", n);
                    print_new(&engine, &mut printed).await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    engine.close().await;
    if let Some(handle) = gateway {
        handle.abort();
    }
    Ok(())
}

async fn print_new(engine: &Engine, printed: &mut HashSet<String>) {
    for message in engine.visible_messages().await {
        if printed.insert(print_key(&message)) {
            println!("{}", format_message(&message));
        }
    }
}

pub(super) async fn send(
    config_path: Option<&Path>,
    conversation: &str,
    text: &str,
    template: Option<&str>,
    params: &[String],
) -> Result<()> {
    let config = load_config(config_path)?;
    let session = connect(&config);
    session.engine.open(conversation).await?;

    let result = match template {
        Some(name) => {
            let templates = session.api.get_available_templates(conversation).await?;
            let Some(found) = templates.iter().find(|t| t.name == name) else {
                let names: Vec<&str> = templates.iter().map(|t| t.name.as_str()).collect();
                bail!("unknown template {name}; available: {}", names.join(", "));
            };
            let needed = found.placeholder_count();
            if params.len() < needed {
                bail!(
                    "template {name} needs {needed} parameter(s), got {}",
                    params.len()
                );
            }
            session.engine.send_template(found, params).await
        }
        None => session.engine.send_text(text).await,
    };
    session.engine.close().await;

    let client_temp_id = result.context("send failed")?;
    println!("\u{2713} accepted ({client_temp_id})");
    Ok(())
}

pub(super) async fn templates(config_path: Option<&Path>, conversation: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let session = connect(&config);
    let templates = session.api.get_available_templates(conversation).await?;
    if templates.is_empty() {
        println!("No approved templates.");
        return Ok(());
    }
    for template in templates {
        println!(
            "{} [{}] {} ({} parameter(s))",
            template.name,
            template.language,
            template.category.as_deref().unwrap_or("-"),
            template.placeholder_count()
        );
        let body = template.body_text();
        if !body.is_empty() {
            println!("    {body}");
        }
    }
    Ok(())
}

pub(super) async fn window(config_path: Option<&Path>, conversation: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let session = connect(&config);
    session.engine.open(conversation).await?;
    let snapshot = session.engine.window().await;
    session.engine.close().await;
    println!("{}", format_window(&snapshot));
    Ok(())
}

pub(super) fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    save_config(&Config::default(), Some(&path))?;
    println!("\u{2713} Created config at {}", path.display());
    println!("Next: set api.baseUrl and api.accessToken (or CLOUDINBOX_ACCESS_TOKEN).");
    Ok(())
}

pub(super) fn config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
    println!();
    for (name, set) in credential_status(&config) {
        println!("{name}: {}", if set { "[set]" } else { "[empty]" });
    }
    Ok(())
}

pub(super) fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if !shown.api.access_token.is_empty() {
        shown.api.access_token = "[REDACTED]".to_string();
    }
    if !shown.gateway.secret.is_empty() {
        shown.gateway.secret = "[REDACTED]".to_string();
    }
    shown
}
