//! `ari-tail`: follow the event stream of an Asterisk server.
//!
//! Connects the event socket for the configured applications, prints one
//! JSON line per event on stdout and logs lifecycle notifications on
//! stderr.  Ctrl-C stops the client and exits.
//!
//! Usage:
//!   ARI_PASSWORD=secret ari-tail --url http://localhost:8088 --app ivr
//!
//! Env vars:
//!   ARI_PASSWORD  password for the ARI user
//!   RUST_LOG      log filter (default: "info")

mod cli;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::Interval;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ari_client::{
    AriClientBuilder, AriEvent, EventListener, EventResources, Notification, NotificationListener,
};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = cli.resolve_config()?;
    config.ensure_valid()?;

    let client = AriClientBuilder::from_config(&config).build()?;
    client.on_notification(NotificationListener::new(log_notification));
    client.on(
        "*",
        EventListener::new(|event, resources| println!("{}", event_line(event, resources))),
    );

    client
        .start(config.ari.apps.clone(), config.ari.subscribe_all)
        .await
        .context("starting event socket")?;

    let mut pinger = (config.ari.ping_interval_secs > 0)
        .then(|| tokio::time::interval(Duration::from_secs(config.ari.ping_interval_secs)));

    let exhausted = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping");
                client.stop();
                client.wait_closed().await;
                break false;
            }
            _ = client.wait_closed() => break true,
            _ = tick(&mut pinger) => client.ping(),
        }
    };

    if exhausted {
        anyhow::bail!("event socket closed after exhausting reconnect attempts");
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the events; logs go to stderr.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn tick(pinger: &mut Option<Interval>) {
    match pinger {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn log_notification(n: &Notification) {
    match n {
        Notification::Pong => tracing::debug!("pong"),
        Notification::FrameDropped { reason } => {
            tracing::warn!(reason = %reason, "frame dropped")
        }
        other => tracing::info!(notification = other.name(), detail = ?other, "lifecycle"),
    }
}

/// One output line: type, timestamp, application and resource identities.
fn event_line(event: &AriEvent, resources: &EventResources) -> serde_json::Value {
    let ids: serde_json::Map<String, serde_json::Value> = match resources {
        EventResources::None => serde_json::Map::new(),
        EventResources::Single(r) => {
            std::iter::once((r.kind().to_string(), r.id().into())).collect()
        }
        EventResources::Many(map) => map
            .iter()
            .map(|(field, r)| (field.clone(), r.id().into()))
            .collect(),
    };

    serde_json::json!({
        "type": event.event_type,
        "timestamp": event.timestamp,
        "application": event.application,
        "resources": ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_line_lists_identities() {
        let client = AriClientBuilder::new().builtin_schema().build().unwrap();
        let ch = client.resource(ari_client::ResourceKind::Channel, "abc").unwrap();
        let event = AriEvent::from_json(
            r#"{"type":"ChannelHold","timestamp":"2024-05-01T10:00:00.000+0000","application":"ivr"}"#,
        )
        .unwrap();

        let line = event_line(&event, &EventResources::Single(ch));
        assert_eq!(line["type"], "ChannelHold");
        assert_eq!(line["application"], "ivr");
        assert_eq!(line["resources"]["Channel"], "abc");

        let line = event_line(&event, &EventResources::None);
        assert!(line["resources"].as_object().unwrap().is_empty());
    }
}
