//! Moderator command parsing.

use super::purge::PurgeRequest;
use crate::error::ModerationError;
use slmod_proto::EventId;

const DEFAULT_REASON: &str = "moderation action";

/// A parsed moderator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mute(Vec<String>),
    Unmute(Vec<String>),
    Ban { target: String, reason: String },
    Kick { target: String, reason: String },
    BanEverywhere { target: String, reason: String },
    BanServer { server: String },
    BanServerEverywhere { server: String },
    Purge(PurgeRequest),
    PurgeFrom { anchor: EventId },
    Import { source: String },
    RuleAdd(String),
    RuleDel(String),
    Rules,
}

fn usage(text: &str) -> ModerationError {
    ModerationError::InvalidTarget(format!("Usage: {text}"))
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn reason(rest: &[&str]) -> String {
    if rest.is_empty() {
        DEFAULT_REASON.to_string()
    } else {
        rest.join(" ")
    }
}

impl Command {
    /// Parse `name` and its whitespace-split arguments.
    pub fn parse(name: &str, args: &[&str]) -> Result<Self, ModerationError> {
        let command = match (name.to_ascii_lowercase().as_str(), args) {
            ("mute", []) => return Err(usage("mute <@user>...")),
            ("mute", targets) => Command::Mute(owned(targets)),
            ("unmute" | "umute", []) => return Err(usage("unmute <@user>...")),
            ("unmute" | "umute", targets) => Command::Unmute(owned(targets)),
            ("ban", [target, rest @ ..]) => Command::Ban {
                target: target.to_string(),
                reason: reason(rest),
            },
            ("ban", _) => return Err(usage("ban <@user|glob> [reason]")),
            ("kick", [target, rest @ ..]) => Command::Kick {
                target: target.to_string(),
                reason: reason(rest),
            },
            ("kick", _) => return Err(usage("kick <@user|glob> [reason]")),
            ("banall", [target, rest @ ..]) => Command::BanEverywhere {
                target: target.to_string(),
                reason: reason(rest),
            },
            ("banall", _) => return Err(usage("banall <@user|glob> [reason]")),
            ("banserver", [server]) => Command::BanServer {
                server: server.to_string(),
            },
            ("banserver", _) => return Err(usage("banserver <server>")),
            ("banserverall", [server]) => Command::BanServerEverywhere {
                server: server.to_string(),
            },
            ("banserverall", _) => return Err(usage("banserverall <server>")),
            ("purge", ["from", anchor]) => Command::PurgeFrom {
                anchor: EventId::from(*anchor),
            },
            ("purge", args) => Command::Purge(PurgeRequest::parse(args)?),
            ("import", [source]) => Command::Import {
                source: source.to_string(),
            },
            ("import", _) => return Err(usage("import <#alias|!room>")),
            ("rule", ["add", pattern]) => Command::RuleAdd(pattern.to_string()),
            ("rule", ["del", pattern]) => Command::RuleDel(pattern.to_string()),
            ("rule", _) => return Err(usage("rule add|del <glob>")),
            ("rules", []) => Command::Rules,
            (other, _) => {
                return Err(ModerationError::InvalidTarget(format!(
                    "Unknown command {other}"
                )))
            }
        };
        Ok(command)
    }

    /// Whether the command changes the in-memory join rules, which only
    /// outlive the command in a long-running host.
    pub fn edits_join_rules(&self) -> bool {
        matches!(self, Command::RuleAdd(_) | Command::RuleDel(_))
    }

    /// Parse a full command line such as `ban @spam*:evil.example spam`.
    pub fn parse_line(line: &str) -> Result<Self, ModerationError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or_else(|| usage("<command> [args...]"))?;
        let args: Vec<&str> = words.collect();
        Self::parse(name, &args)
    }
}
