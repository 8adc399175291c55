// ABOUTME: Slash-command parsing for the interactive session
// ABOUTME: Plain lines are messages; lines starting with '/' map to session operations

use buddy_core::Language;
use std::path::PathBuf;

pub const HELP: &str = "\
/new                 start a new chat
/chats               list chats
/switch <n>          activate chat n
/rename <title>      rename the active chat
/delete              delete the active chat
/upload <path>...    add documents
/docs                list documents (* = focused in this chat)
/focus <n>           toggle focus on document n
/rm <n>              remove document n
/reply <n> <text>    answer message n of the active chat
/lang pt|en          switch language
/web on|off          web search instead of file tools
/export              save the chat as a DOCX transcript
/quit                leave (Ctrl+C cancels a running answer)";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    New,
    Chats,
    Switch(usize),
    Rename(String),
    Delete,
    Upload(Vec<PathBuf>),
    Docs,
    Focus(usize),
    Remove(usize),
    Reply(usize, String),
    Lang(Language),
    Web(bool),
    Export,
    Quit,
    /// Recognized as a command but unusable; carries the hint to print
    Unknown(String),
}

/// 1-based index from user input
fn index(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok().filter(|n| *n > 0)
}

impl Command {
    /// Parse a line. Returns `None` for ordinary message text.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        let rest = line.strip_prefix('/')?;
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "help" | "h" | "?" => Command::Help,
            "new" => Command::New,
            "chats" => Command::Chats,
            "switch" => match index(args) {
                Some(n) => Command::Switch(n),
                None => Command::Unknown("/switch requires a chat number".to_string()),
            },
            "rename" => Command::Rename(args.to_string()),
            "delete" => Command::Delete,
            "upload" => {
                if args.is_empty() {
                    Command::Unknown("/upload requires at least one path".to_string())
                } else {
                    Command::Upload(args.split_whitespace().map(PathBuf::from).collect())
                }
            }
            "docs" => Command::Docs,
            "focus" => match index(args) {
                Some(n) => Command::Focus(n),
                None => Command::Unknown("/focus requires a document number".to_string()),
            },
            "rm" => match index(args) {
                Some(n) => Command::Remove(n),
                None => Command::Unknown("/rm requires a document number".to_string()),
            },
            "reply" => {
                let (target, text) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
                match (index(target), text.trim()) {
                    (Some(n), text) if !text.is_empty() => Command::Reply(n, text.to_string()),
                    _ => Command::Unknown("/reply requires a message number and text".to_string()),
                }
            }
            "lang" => match Language::from_code(args) {
                Some(language) => Command::Lang(language),
                None => Command::Unknown("/lang expects pt or en".to_string()),
            },
            "web" => match args {
                "on" => Command::Web(true),
                "off" => Command::Web(false),
                _ => Command::Unknown("/web expects on or off".to_string()),
            },
            "export" => Command::Export,
            "quit" | "exit" | "q" => Command::Quit,
            other => Command::Unknown(format!("unknown command /{} (try /help)", other)),
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert!(Command::parse("hello there").is_none());
        assert!(Command::parse("  what about /new?").is_none());
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("/new"), Some(Command::New));
        assert_eq!(Command::parse("  /chats  "), Some(Command::Chats));
        assert_eq!(Command::parse("/q"), Some(Command::Quit));
        assert_eq!(Command::parse("/export"), Some(Command::Export));
    }

    #[test]
    fn test_indexed_commands() {
        assert_eq!(Command::parse("/switch 2"), Some(Command::Switch(2)));
        assert_eq!(Command::parse("/focus 1"), Some(Command::Focus(1)));
        assert!(matches!(
            Command::parse("/switch 0"),
            Some(Command::Unknown(hint)) if hint.contains("chat number")
        ));
        assert!(matches!(
            Command::parse("/rm"),
            Some(Command::Unknown(hint)) if hint.contains("document number")
        ));
    }

    #[test]
    fn test_upload_paths() {
        assert_eq!(
            Command::parse("/upload a.pdf notes/b.docx"),
            Some(Command::Upload(vec![
                PathBuf::from("a.pdf"),
                PathBuf::from("notes/b.docx")
            ]))
        );
        assert!(matches!(Command::parse("/upload"), Some(Command::Unknown(_))));
    }

    #[test]
    fn test_reply_and_settings() {
        assert_eq!(
            Command::parse("/reply 3 can you expand?"),
            Some(Command::Reply(3, "can you expand?".to_string()))
        );
        assert!(matches!(Command::parse("/reply 3"), Some(Command::Unknown(_))));
        assert_eq!(Command::parse("/lang en"), Some(Command::Lang(Language::English)));
        assert_eq!(Command::parse("/web on"), Some(Command::Web(true)));
        assert!(matches!(
            Command::parse("/teleport"),
            Some(Command::Unknown(hint)) if hint.contains("/teleport")
        ));
    }
}
