//! Line-oriented event script for the `spamgate` binary.
//!
//! ```text
//! check   <category> <source> <agent|object> [weight]
//! text    <category> <source> <agent|object> <message, "\n" for line breaks>
//! blocked <category> <source>
//! sound   <sound-id>
//! block   <category> <source>
//! object  <object-id> <owner-id> <name...>
//! name    <agent-id> <name...>
//! configure <category|global> <threshold> <window-secs>
//! global  <on|off>
//! clear   [category]
//! purge   [category]
//! stats
//! metrics
//! ```
//!
//! Blank lines and lines starting with `#` are skipped by the caller.

use std::str::FromStr;
use std::time::Duration;

use crate::antispam::{Category, SourceId, SourceKind};
use crate::error::{ParseError, ReplayError, parse_id};

/// Target of a `configure` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureTarget {
    Category(Category),
    Global,
}

/// One parsed replay line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayCommand {
    Check {
        category: Category,
        source: SourceId,
        kind: SourceKind,
        weight: u32,
    },
    Text {
        category: Category,
        source: SourceId,
        kind: SourceKind,
        message: String,
    },
    Blocked {
        category: Category,
        source: SourceId,
    },
    Sound(SourceId),
    Block {
        category: Category,
        source: SourceId,
    },
    Object {
        object_id: SourceId,
        owner_id: SourceId,
        name: String,
    },
    Name {
        id: SourceId,
        name: String,
    },
    Configure {
        target: ConfigureTarget,
        threshold: u32,
        window: Duration,
    },
    Global(bool),
    Clear(Option<Category>),
    Purge(Option<Category>),
    Stats,
    Metrics,
}

struct Args<'a> {
    command: &'static str,
    rest: &'a str,
}

impl<'a> Args<'a> {
    fn next(&mut self, argument: &'static str) -> Result<&'a str, ReplayError> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            return Err(ReplayError::MissingArgument {
                command: self.command,
                argument,
            });
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (word, rest) = trimmed.split_at(end);
        self.rest = rest;
        Ok(word)
    }

    fn optional(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            return None;
        }
        self.next("").ok()
    }

    fn remainder(&mut self, argument: &'static str) -> Result<String, ReplayError> {
        let text = self.rest.trim();
        if text.is_empty() {
            return Err(ReplayError::MissingArgument {
                command: self.command,
                argument,
            });
        }
        self.rest = "";
        Ok(text.to_string())
    }

    fn category(&mut self) -> Result<Category, ReplayError> {
        Ok(self.next("category")?.parse()?)
    }

    fn id(&mut self, argument: &'static str) -> Result<SourceId, ReplayError> {
        Ok(parse_id(self.next(argument)?)?)
    }

    fn kind(&mut self) -> Result<SourceKind, ReplayError> {
        Ok(self.next("kind")?.parse()?)
    }
}

fn number<T: FromStr>(input: &str) -> Result<T, ParseError> {
    input
        .parse()
        .map_err(|_| ParseError::InvalidNumber(input.to_string()))
}

impl FromStr for ReplayCommand {
    type Err = ReplayError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        if word.is_empty() {
            return Err(ReplayError::Empty);
        }

        let command: &'static str = match word.to_ascii_lowercase().as_str() {
            "check" => "check",
            "text" => "text",
            "blocked" => "blocked",
            "sound" => "sound",
            "block" => "block",
            "object" => "object",
            "name" => "name",
            "configure" => "configure",
            "global" => "global",
            "clear" => "clear",
            "purge" => "purge",
            "stats" => "stats",
            "metrics" => "metrics",
            _ => return Err(ReplayError::UnknownCommand(word.to_string())),
        };
        let mut args = Args { command, rest };

        let parsed = match command {
            "check" => {
                let category = args.category()?;
                let source = args.id("source")?;
                let kind = args.kind()?;
                let weight = match args.optional() {
                    Some(w) => number(w)?,
                    None => 1,
                };
                Self::Check {
                    category,
                    source,
                    kind,
                    weight,
                }
            }
            "text" => Self::Text {
                category: args.category()?,
                source: args.id("source")?,
                kind: args.kind()?,
                message: args.remainder("message")?.replace("\\n", "\n"),
            },
            "blocked" => Self::Blocked {
                category: args.category()?,
                source: args.id("source")?,
            },
            "sound" => Self::Sound(args.id("sound-id")?),
            "block" => Self::Block {
                category: args.category()?,
                source: args.id("source")?,
            },
            "object" => Self::Object {
                object_id: args.id("object-id")?,
                owner_id: args.id("owner-id")?,
                name: args.remainder("name")?,
            },
            "name" => Self::Name {
                id: args.id("agent-id")?,
                name: args.remainder("name")?,
            },
            "configure" => {
                let target = match args.next("category|global")? {
                    t if t.eq_ignore_ascii_case("global") => ConfigureTarget::Global,
                    t => ConfigureTarget::Category(t.parse()?),
                };
                let threshold = number(args.next("threshold")?)?;
                let window_secs: u64 = number(args.next("window-secs")?)?;
                Self::Configure {
                    target,
                    threshold,
                    window: Duration::from_secs(window_secs),
                }
            }
            "global" => {
                let flag = args.next("on|off")?;
                match flag.to_ascii_lowercase().as_str() {
                    "on" | "true" | "1" => Self::Global(true),
                    "off" | "false" | "0" => Self::Global(false),
                    _ => return Err(ParseError::InvalidNumber(flag.to_string()).into()),
                }
            }
            "clear" => Self::Clear(args.optional().map(str::parse).transpose()?),
            "purge" => Self::Purge(args.optional().map(str::parse).transpose()?),
            "stats" => Self::Stats,
            _ => Self::Metrics,
        };
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "11111111-2222-3333-4444-555555555555";
    const B: &str = "66666666-7777-8888-9999-aaaaaaaaaaaa";

    #[test]
    fn parses_check_with_default_weight() {
        let cmd: ReplayCommand = format!("check chat {A} agent").parse().unwrap();
        assert_eq!(
            cmd,
            ReplayCommand::Check {
                category: Category::Chat,
                source: parse_id(A).unwrap(),
                kind: SourceKind::Agent,
                weight: 1,
            }
        );
    }

    #[test]
    fn parses_check_with_weight() {
        let cmd: ReplayCommand = format!("CHECK sound {A} object 4").parse().unwrap();
        assert!(matches!(cmd, ReplayCommand::Check { weight: 4, kind: SourceKind::Object, .. }));
    }

    #[test]
    fn text_unescapes_line_breaks() {
        let cmd: ReplayCommand = format!("text im {A} agent one\\ntwo\\nthree").parse().unwrap();
        match cmd {
            ReplayCommand::Text { message, .. } => assert_eq!(message, "one\ntwo\nthree"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn object_name_keeps_spaces() {
        let cmd: ReplayCommand = format!("object {A} {B} Spinning  Cube").parse().unwrap();
        match cmd {
            ReplayCommand::Object { name, .. } => assert_eq!(name, "Spinning  Cube"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn configure_global_and_category() {
        let cmd: ReplayCommand = "configure global 20 5".parse().unwrap();
        assert_eq!(
            cmd,
            ReplayCommand::Configure {
                target: ConfigureTarget::Global,
                threshold: 20,
                window: Duration::from_secs(5),
            }
        );
        let cmd: ReplayCommand = "configure teleport 2 60".parse().unwrap();
        assert!(matches!(
            cmd,
            ReplayCommand::Configure { target: ConfigureTarget::Category(Category::Teleport), .. }
        ));
    }

    #[test]
    fn optional_category() {
        assert_eq!("clear".parse::<ReplayCommand>().unwrap(), ReplayCommand::Clear(None));
        assert_eq!(
            "purge chat".parse::<ReplayCommand>().unwrap(),
            ReplayCommand::Purge(Some(Category::Chat))
        );
    }

    #[test]
    fn errors_are_specific() {
        assert!(matches!("".parse::<ReplayCommand>(), Err(ReplayError::Empty)));
        assert!(matches!(
            "explode".parse::<ReplayCommand>(),
            Err(ReplayError::UnknownCommand(_))
        ));
        assert!(matches!(
            "check chat".parse::<ReplayCommand>(),
            Err(ReplayError::MissingArgument { command: "check", argument: "source" })
        ));
        assert!(matches!(
            format!("check chat {A} agent lots").parse::<ReplayCommand>(),
            Err(ReplayError::Parse(ParseError::InvalidNumber(_)))
        ));
        assert!(matches!(
            "blocked gesture 1".parse::<ReplayCommand>(),
            Err(ReplayError::Parse(ParseError::UnknownCategory(_)))
        ));
    }
}
