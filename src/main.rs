//! slmod - run one moderation command against a room.
//!
//! Usage: `slmod <config.toml> <room> <actor> <command> [args...]`

use anyhow::{bail, Context};
use slmod::client::http::MatrixClient;
use slmod::config::{self, Config};
use slmod::moderation::{Command, Moderator};
use slmod_proto::UserId;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [config_path, room, actor, name, rest @ ..] = args.as_slice() else {
        bail!("usage: slmod <config.toml> <room> <actor> <command> [args...]");
    };

    let config = Config::load(config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;
    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    let client = MatrixClient::new(&config.homeserver).context("building room service client")?;
    let moderator = Moderator::from_config(Arc::new(client), &config)?;

    let actor = UserId::parse(actor).with_context(|| format!("{actor} is not a user id"))?;
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
    let command = Command::parse(name, &rest)?;
    if command.edits_join_rules() {
        bail!("join rules do not persist between runs; edit join_rules in {config_path} instead");
    }
    let room = moderator.resolve_room(room).await?;

    info!(room = %room, actor = %actor, command = %name, "Running moderation command");

    match moderator.execute(&room, &actor, command).await {
        Ok(outcome) => {
            println!("{outcome}");
            Ok(())
        }
        Err(e) => {
            error!(room = %room, error = %e, code = e.error_code(), "Command failed");
            bail!("{}", e.to_notice(moderator.bot()))
        }
    }
}
