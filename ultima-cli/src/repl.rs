//! REPL command parsing.

use ultima_chat::{Credentials, Mode, ModelKind};

pub const HELP: &str = "\
Type a question to ask it. Commands:
  :auth [openai_key] [index_token] [index_org]   authenticate (missing values from the env)
  :source <file|directory|url>                    switch the data source
  :mode <api|local>                               switch mode
  :model <name>                                   switch model
  :set <option> <value>                           change an option (k, fetch_k, chunk_size, ...)
  :rebuild                                        rebuild the chain
  :options                                        show the current options
  :usage                                          show token usage and cost
  :history                                        show the conversation
  :help                                           show this help
  :quit                                           leave";

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ask(String),
    Auth(Credentials),
    Source(String),
    Mode(Mode),
    Model(ModelKind),
    Set { key: String, value: String },
    Rebuild,
    Options,
    Usage,
    History,
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Ask(line.to_string()));
        };

        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let args = args.trim();
        let required = |what: &str| {
            if args.is_empty() {
                Err(format!(":{name} needs {what}"))
            } else {
                Ok(args.to_string())
            }
        };

        match name {
            "auth" => {
                let mut parts = args.split_whitespace().map(str::to_string);
                Ok(Command::Auth(Credentials {
                    openai_api_key: parts.next(),
                    index_token: parts.next(),
                    index_org: parts.next(),
                    index_url: None,
                }))
            }
            "source" => Ok(Command::Source(required("a file, directory or URL")?)),
            "mode" => {
                required("api or local")?.parse().map(Command::Mode).map_err(|e| e.to_string())
            }
            "model" => {
                required("a model name")?.parse().map(Command::Model).map_err(|e| e.to_string())
            }
            "set" => {
                let (key, value) = args
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| ":set needs an option and a value".to_string())?;
                Ok(Command::Set { key: key.to_string(), value: value.trim().to_string() })
            }
            "rebuild" => Ok(Command::Rebuild),
            "options" => Ok(Command::Options),
            "usage" => Ok(Command::Usage),
            "history" => Ok(Command::History),
            "help" | "h" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command :{other}, try :help")),
        }
    }

    /// Lines that are kept out of the readline history.
    pub fn is_secret(&self) -> bool {
        matches!(self, Command::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_questions() {
        assert_eq!(
            Command::parse("  what is new?  ").unwrap(),
            Command::Ask("what is new?".into())
        );
        assert_eq!(Command::parse("   ").unwrap(), Command::Empty);
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            Command::parse(":source ./my docs").unwrap(),
            Command::Source("./my docs".into())
        );
        assert_eq!(Command::parse(":mode local").unwrap(), Command::Mode(Mode::Local));
        assert_eq!(
            Command::parse(":model gpt-3.5-turbo").unwrap(),
            Command::Model(ModelKind::Gpt35Turbo)
        );
        assert_eq!(
            Command::parse(":set temperature 0.7").unwrap(),
            Command::Set { key: "temperature".into(), value: "0.7".into() }
        );
        assert_eq!(Command::parse(":q").unwrap(), Command::Quit);
    }

    #[test]
    fn auth_takes_optional_secrets() {
        let Command::Auth(partial) = Command::parse(":auth sk-1").unwrap() else { panic!() };
        assert_eq!(partial.openai_api_key.as_deref(), Some("sk-1"));
        assert_eq!(partial.index_token, None);
        assert!(Command::parse(":auth").unwrap().is_secret());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse(":source").is_err());
        assert!(Command::parse(":mode cloud").is_err());
        assert!(Command::parse(":model nope").is_err());
        assert!(Command::parse(":set k").is_err());
        assert!(Command::parse(":frobnicate").is_err());
    }
}
