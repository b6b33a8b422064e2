use super::subcommands::{format_message, format_window, redacted};
use crate::config::Config;
use crate::model::fixtures::{inbound, outbound, template_sent};
use crate::model::{MessageStatus, PriceInfo};
use crate::window::{Eligibility, TemplateMode, WindowMode, WindowSnapshot};
use clap::Parser;

#[test]
fn test_format_inbound_message() {
    let line = format_message(&inbound("m1", "hola", 5));
    assert_eq!(line, "[12:00:05] < hola");
}

#[test]
fn test_format_failed_outbound_message() {
    let mut msg = outbound("m2", "buenas", 0);
    msg.status = MessageStatus::Failed;
    assert_eq!(format_message(&msg), "[12:00:00] > buenas (failed, id m2)");
}

#[test]
fn test_format_template_without_text() {
    let line = format_message(&template_sent("m3", "welcome", 0));
    assert_eq!(line, "[12:00:00] > [template] (template welcome)");
}

#[test]
fn test_format_window_template_required() {
    let snapshot = WindowSnapshot {
        mode: WindowMode::ManualSelectingTemplate,
        eligibility: Eligibility::Known(PriceInfo {
            is_free: false,
            price_eur: Some(0.0632),
            price_usd: None,
        }),
        preference: TemplateMode::Manual,
        last_inbound_at: None,
        last_template_sent_at: None,
        expires_at: None,
        reactivated: false,
        templates: Some(Vec::new()),
    };
    let text = format_window(&snapshot);
    assert!(text.contains("template required (0.0632 EUR)"));
    assert!(text.contains("Templates loaded: 0"));
}

#[test]
fn test_redacted_hides_secrets() {
    let mut config = Config::default();
    config.api.access_token = "tok".into();
    let shown = redacted(&config);
    assert_eq!(shown.api.access_token, "[REDACTED]");
    assert!(shown.gateway.secret.is_empty());
}

#[test]
fn test_cli_parses_send_template() {
    let cli = super::Cli::try_parse_from([
        "cloudinbox",
        "send",
        "conv-1",
        "--template",
        "welcome",
        "-p",
        "Ana",
        "-p",
        "martes",
    ])
    .unwrap();
    let super::Commands::Send {
        conversation,
        template,
        params,
        ..
    } = cli.command
    else {
        panic!("expected send");
    };
    assert_eq!(conversation, "conv-1");
    assert_eq!(template.as_deref(), Some("welcome"));
    assert_eq!(params, vec!["Ana", "martes"]);
}

#[test]
fn test_cli_config_flag_is_global() {
    let cli = super::Cli::try_parse_from([
        "cloudinbox",
        "window",
        "conv-1",
        "--config",
        "/tmp/inbox.json",
    ])
    .unwrap();
    assert_eq!(
        cli.config.as_deref(),
        Some(std::path::Path::new("/tmp/inbox.json"))
    );
}
