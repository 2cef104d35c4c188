//! spamgate - anti-spam gate driven by a line-oriented event script.
//!
//! Reads replay commands (see [`spamgate::replay`]) from stdin, feeds them to
//! the anti-spam actor, and prints verdicts and block notices to stdout.
//! Logs go to stderr.

use spamgate::antispam::{
    AntispamRegistry, BlockNotice, Collaborators, Notifier, ObjectMetadata, ObjectQuery,
    SourceId, SystemClock,
};
use spamgate::config::Config;
use spamgate::name_cache::{AsyncNameCache, DirectoryResolver};
use spamgate::replay::{ConfigureTarget, ReplayCommand};
use spamgate::{AntispamActor, AntispamEvent, AntispamHandle, metrics};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Prints block notices to stdout.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: BlockNotice) {
        info!(
            notification = notice.notification_id,
            source = %notice.source_id,
            kind = %notice.source_kind,
            category = notice.context.category.as_str(),
            layer = notice.context.layer.as_str(),
            "block notice"
        );
        println!("{notice}");
    }
}

/// Stands in for the simulator link: the script answers with `object` lines.
struct ScriptedObjectQuery;

impl ObjectQuery for ScriptedObjectQuery {
    fn request_properties(&self, object_id: SourceId) {
        info!(object = %object_id, "object properties requested");
        println!("? object {object_id}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "spamgate.toml".to_string());

    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path).map_err(|e| {
            error!(path = %config_path, error = %e, "Failed to load config");
            e
        })?
    } else {
        warn!(path = %config_path, "Config file not found, using defaults");
        Config::default()
    };
    config.antispam.warn_degenerate();

    metrics::init();

    let (handle, rx) = AntispamActor::channel(config.maintenance.event_queue_capacity);
    let resolver = Arc::new(DirectoryResolver::default());
    let names = Arc::new(AsyncNameCache::new(Arc::clone(&resolver), handle.downgrade()));
    let registry = AntispamRegistry::new(
        &config.antispam,
        config.maintenance.pending_ttl(),
        Collaborators {
            names,
            objects: Arc::new(ScriptedObjectQuery),
            notifier: Arc::new(ConsoleNotifier),
            clock: Arc::new(SystemClock),
        },
    );
    let actor = AntispamActor::new(registry, rx, config.maintenance.purge_interval()).spawn();

    info!(config = %config_path, "spamgate ready; reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<ReplayCommand>() {
            Ok(command) => dispatch(&handle, &resolver, command).await,
            Err(e) => warn!(line, code = e.error_code(), error = %e, "Invalid replay line"),
        }
    }

    handle.shutdown().await;
    actor.await?;
    info!("spamgate stopped");
    Ok(())
}

async fn dispatch(handle: &AntispamHandle, resolver: &DirectoryResolver, command: ReplayCommand) {
    match command {
        ReplayCommand::Check {
            category,
            source,
            kind,
            weight,
        } => {
            let allowed = handle.check(category, source, kind, weight).await;
            println!("{} {category} {source}", verdict(allowed));
        }
        ReplayCommand::Text {
            category,
            source,
            kind,
            message,
        } => {
            let allowed = handle.check_text_flood(category, source, kind, message).await;
            println!("{} {category} {source}", verdict(allowed));
        }
        ReplayCommand::Blocked { category, source } => {
            let blocked = handle.is_blocked(category, source).await;
            println!("blocked {category} {source}: {blocked}");
        }
        ReplayCommand::Sound(sound) => {
            let collision = handle.is_collision_sound(sound).await;
            println!("collision sound {sound}: {collision}");
        }
        ReplayCommand::Block { category, source } => {
            handle
                .send(AntispamEvent::ForceBlock { category, source })
                .await;
        }
        ReplayCommand::Object {
            object_id,
            owner_id,
            name,
        } => {
            handle
                .send(AntispamEvent::ObjectMetadata {
                    object_id,
                    metadata: ObjectMetadata { name, owner_id },
                })
                .await;
        }
        ReplayCommand::Name { id, name } => resolver.insert(id, name),
        ReplayCommand::Configure {
            target,
            threshold,
            window,
        } => {
            let event = match target {
                ConfigureTarget::Category(category) => AntispamEvent::ConfigureCategory {
                    category,
                    threshold,
                    window,
                },
                ConfigureTarget::Global => AntispamEvent::ConfigureGlobal { threshold, window },
            };
            handle.send(event).await;
        }
        ReplayCommand::Global(enabled) => {
            handle.send(AntispamEvent::SetGlobalEnabled(enabled)).await;
        }
        ReplayCommand::Clear(category) => handle.send(AntispamEvent::Clear(category)).await,
        ReplayCommand::Purge(category) => {
            let removed = handle.purge(category).await;
            println!("purged {removed}");
        }
        ReplayCommand::Stats => match handle.stats().await {
            Some(stats) => println!(
                "entries {} (global {}), pending {}, objects {}, global layer {}",
                stats.total_entries(),
                stats.global_entries,
                stats.pending_notifications,
                stats.known_objects,
                if stats.global_enabled { "on" } else { "off" }
            ),
            None => warn!("anti-spam actor unavailable"),
        },
        ReplayCommand::Metrics => print!("{}", metrics::gather_metrics()),
    }
}

fn verdict(allowed: bool) -> &'static str {
    if allowed { "allow" } else { "deny" }
}
