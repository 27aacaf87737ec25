//! `eventrelay decode`: render a payload offline.

use anyhow::{bail, Context, Result};
use eventrelay_notify::{EventKind, Notification, NotificationPayload};

pub fn run(event_type: &str, data: &str, json: bool) -> Result<()> {
    let Some(kind) = EventKind::from_type(event_type) else {
        bail!("'{event_type}' is not a routed event type (see `eventrelay types`)");
    };
    let payload = NotificationPayload::decode(kind, data.as_bytes())
        .with_context(|| format!("invalid {kind} payload"))?;

    let Some(notification) = Notification::render(&payload) else {
        println!("✗ {kind} payload is not announced");
        return Ok(());
    };
    let route = if payload.is_test() { "test" } else { "notification" };

    if json {
        println!("{}", serde_json::to_string_pretty(&notification)?);
        return Ok(());
    }

    println!("✓ {kind} → {route} channel");
    println!("  Title:       {}", notification.title);
    println!("  Color:       #{:06X}", notification.color);
    for line in notification.description.lines() {
        println!("  │ {line}");
    }
    for field in &notification.fields {
        println!("  - {}: {}", field.name, field.value.trim_end().replace('\n', " / "));
    }
    if let Some(footer) = &notification.footer {
        println!("  Footer:      {}", footer.text);
    }
    Ok(())
}
