//! Slash commands for the interactive chat.

use std::path::PathBuf;

/// Definition of a slash command.
#[derive(Debug, Clone)]
pub struct Command {
    /// Primary name (e.g., "new") - without the leading slash.
    pub name: &'static str,
    /// Aliases - without leading slashes.
    pub aliases: &'static [&'static str],
    /// Argument placeholder shown in help, if any.
    pub usage: &'static str,
    pub description: &'static str,
}

impl Command {
    fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

pub const COMMANDS: &[Command] = &[
    Command {
        name: "artifacts",
        aliases: &[],
        usage: "",
        description: "Show the artifact panel of the last turn",
    },
    Command {
        name: "conversations",
        aliases: &["list", "history"],
        usage: "",
        description: "List saved conversations",
    },
    Command {
        name: "export",
        aliases: &[],
        usage: "<dir>",
        description: "Write the artifact panel to a directory",
    },
    Command {
        name: "help",
        aliases: &["?"],
        usage: "",
        description: "Show this help",
    },
    Command {
        name: "model",
        aliases: &[],
        usage: "<name>",
        description: "Switch model",
    },
    Command {
        name: "new",
        aliases: &["clear"],
        usage: "",
        description: "Start a new conversation",
    },
    Command {
        name: "open",
        aliases: &["resume"],
        usage: "<id>",
        description: "Switch to a saved conversation",
    },
    Command {
        name: "quit",
        aliases: &["q", "exit"],
        usage: "",
        description: "Exit",
    },
    Command {
        name: "settings",
        aliases: &[],
        usage: "[save]",
        description: "Show settings, or save them as defaults",
    },
    Command {
        name: "temperature",
        aliases: &["temp"],
        usage: "<0.0-1.0>",
        description: "Set sampling temperature",
    },
    Command {
        name: "upload",
        aliases: &[],
        usage: "<path>",
        description: "Send a file to the document store",
    },
    Command {
        name: "verbosity",
        aliases: &[],
        usage: "<1-5>",
        description: "Set answer verbosity",
    },
];

/// A parsed line of REPL input.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Text to send as a chat message.
    Message(String),
    Quit,
    New,
    Open(String),
    List,
    Upload(PathBuf),
    Model(String),
    Temperature(f32),
    Verbosity(u8),
    ShowSettings,
    SaveSettings,
    Artifacts,
    Export(PathBuf),
    Help,
    Empty,
}

/// Parses one line. Lines starting with `/` are commands (`:q` also
/// quits); a doubled `//` sends the rest as a literal message.
///
/// # Errors
/// Returns a user-facing message for unknown commands or bad arguments.
pub fn parse(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if line == ":q" {
        return Ok(Input::Quit);
    }
    if let Some(literal) = line.strip_prefix("//") {
        return Ok(Input::Message(format!("/{literal}")));
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Message(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let command = COMMANDS
        .iter()
        .find(|c| c.is_named(name))
        .ok_or_else(|| format!("Unknown command '/{name}'. Type /help for commands."))?;

    let require = |what: &str| -> Result<String, String> {
        if arg.is_empty() {
            Err(format!("Usage: /{} {what}", command.name))
        } else {
            Ok(arg.to_string())
        }
    };

    let input = match command.name {
        "artifacts" => Input::Artifacts,
        "conversations" => Input::List,
        "export" => Input::Export(PathBuf::from(require(command.usage)?)),
        "help" => Input::Help,
        "model" => Input::Model(require(command.usage)?),
        "new" => Input::New,
        "open" => Input::Open(require(command.usage)?),
        "quit" => Input::Quit,
        "settings" => match arg {
            "" => Input::ShowSettings,
            "save" => Input::SaveSettings,
            other => return Err(format!("Unknown settings action '{other}'")),
        },
        "temperature" => {
            let raw = require(command.usage)?;
            let value = raw
                .parse::<f32>()
                .map_err(|e| format!("Invalid temperature '{raw}': {e}"))?;
            Input::Temperature(value)
        }
        "upload" => Input::Upload(PathBuf::from(require(command.usage)?)),
        "verbosity" => {
            let raw = require(command.usage)?;
            let value = raw
                .parse::<u8>()
                .map_err(|e| format!("Invalid verbosity '{raw}': {e}"))?;
            Input::Verbosity(value)
        }
        other => return Err(format!("Unhandled command '/{other}'")),
    };
    Ok(input)
}

/// Help text listing every command.
pub fn help_text() -> String {
    let mut lines = vec!["Commands:".to_string()];
    for command in COMMANDS {
        let usage = if command.usage.is_empty() {
            format!("/{}", command.name)
        } else {
            format!("/{} {}", command.name, command.usage)
        };
        let aliases = if command.aliases.is_empty() {
            String::new()
        } else {
            format!(" (also /{})", command.aliases.join(", /"))
        };
        lines.push(format!("  {usage:<26}{}{aliases}", command.description));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(parse("  hello  ").unwrap(), Input::Message("hello".to_string()));
        assert_eq!(parse("   ").unwrap(), Input::Empty);
    }

    #[test]
    fn test_double_slash_sends_literal() {
        assert_eq!(
            parse("//etc/hosts is missing").unwrap(),
            Input::Message("/etc/hosts is missing".to_string())
        );
    }

    #[test]
    fn test_aliases_resolve() {
        assert_eq!(parse("/q").unwrap(), Input::Quit);
        assert_eq!(parse(":q").unwrap(), Input::Quit);
        assert_eq!(parse("/EXIT").unwrap(), Input::Quit);
        assert_eq!(parse("/clear").unwrap(), Input::New);
        assert_eq!(parse("/temp 0.3").unwrap(), Input::Temperature(0.3));
    }

    #[test]
    fn test_arguments_are_parsed() {
        assert_eq!(parse("/verbosity 4").unwrap(), Input::Verbosity(4));
        assert_eq!(
            parse("/model gemini-2.5-pro").unwrap(),
            Input::Model("gemini-2.5-pro".to_string())
        );
        assert_eq!(
            parse("/upload docs/report one.pdf").unwrap(),
            Input::Upload(PathBuf::from("docs/report one.pdf"))
        );
        assert_eq!(parse("/settings save").unwrap(), Input::SaveSettings);
    }

    #[test]
    fn test_bad_input_is_reported() {
        assert!(parse("/frobnicate").unwrap_err().contains("Unknown command"));
        assert_eq!(parse("/open").unwrap_err(), "Usage: /open <id>");
        assert!(parse("/verbosity loud").unwrap_err().contains("Invalid verbosity"));
        assert!(parse("/settings reset").is_err());
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text();
        for command in COMMANDS {
            assert!(help.contains(&format!("/{}", command.name)));
        }
    }
}
