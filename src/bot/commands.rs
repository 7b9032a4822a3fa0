//! Fixed-prefix command parsing for the bot's message surface.
//!
//! Commands are matched case-sensitively against the exact prefixes the bot
//! advertises; any other text is ignored. Argument shapes are validated here
//! so handlers only ever see well-formed commands.

use crate::store::ChatRef;
use thiserror::Error;

/// A fully parsed bot command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Ping,
    Login {
        api_id: i32,
        api_hash: String,
        phone: String,
    },
    VerifyCode {
        code: String,
    },
    VerifyTwoFa {
        password: String,
    },
    ListChats,
    Settings,
    Logout,
    CleanAll,
    AllowChat {
        chat: ChatRef,
    },
}

/// Why a recognized command prefix could not be parsed into a [`Command`]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("api_id must be an integer")]
    InvalidApiId,
    #[error("chat must be a numeric id or start with @")]
    InvalidChat,
}

/// Parse a message text. `None` means the text is not a command at all;
/// `Some(Err(_))` is a recognized command with malformed arguments.
pub fn parse(text: &str) -> Option<Result<Command, CommandError>> {
    let text = text.trim();
    let (prefix, rest) = match text.split_once(char::is_whitespace) {
        Some((prefix, rest)) => (prefix, rest.trim()),
        None => (text, ""),
    };

    let parsed = match prefix {
        "/start" => Ok(Command::Start),
        "/ping" => Ok(Command::Ping),
        "/list_chats" => Ok(Command::ListChats),
        "/settings" => Ok(Command::Settings),
        "/logout" => Ok(Command::Logout),
        "/clean_all" => Ok(Command::CleanAll),
        "/login" => parse_login(rest),
        "/verify_code" => parse_verify_code(rest),
        "/verify_2fa" => parse_verify_two_fa(rest),
        "/allow_chat" => parse_allow_chat(rest),
        _ => return None,
    };

    Some(parsed)
}

fn parse_login(rest: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "/login <api_id> <api_hash> <phone>";
    let args: Vec<&str> = rest.split_whitespace().collect();
    let &[api_id, api_hash, phone] = &args[..] else {
        return Err(CommandError::Usage(USAGE));
    };
    let api_id = api_id.parse().map_err(|_| CommandError::InvalidApiId)?;
    Ok(Command::Login {
        api_id,
        api_hash: api_hash.to_string(),
        phone: phone.to_string(),
    })
}

fn parse_verify_code(rest: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "/verify_code <code>";
    let args: Vec<&str> = rest.split_whitespace().collect();
    let &[code] = &args[..] else {
        return Err(CommandError::Usage(USAGE));
    };
    Ok(Command::VerifyCode {
        code: code.to_string(),
    })
}

// The password is the whole remainder: 2FA passwords may contain spaces.
fn parse_verify_two_fa(rest: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "/verify_2fa <password>";
    if rest.is_empty() {
        return Err(CommandError::Usage(USAGE));
    }
    Ok(Command::VerifyTwoFa {
        password: rest.to_string(),
    })
}

fn parse_allow_chat(rest: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "/allow_chat <@username|id>";
    let args: Vec<&str> = rest.split_whitespace().collect();
    let &[chat] = &args[..] else {
        return Err(CommandError::Usage(USAGE));
    };
    let chat = chat.parse().map_err(|_| CommandError::InvalidChat)?;
    Ok(Command::AllowChat { chat })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(text: &str) -> Command {
        match parse(text) {
            Some(Ok(cmd)) => cmd,
            other => panic!("{text:?} did not parse cleanly: {other:?}"),
        }
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(parse_ok("/start"), Command::Start);
        assert_eq!(parse_ok("/ping"), Command::Ping);
        assert_eq!(parse_ok("/list_chats"), Command::ListChats);
        assert_eq!(parse_ok("/settings"), Command::Settings);
        assert_eq!(parse_ok("/logout"), Command::Logout);
        assert_eq!(parse_ok("/clean_all"), Command::CleanAll);
    }

    #[test]
    fn test_login_arguments() {
        assert_eq!(
            parse_ok("/login 12345 abcdef +39123456789"),
            Command::Login {
                api_id: 12_345,
                api_hash: "abcdef".into(),
                phone: "+39123456789".into(),
            }
        );
        assert_eq!(
            parse("/login 12345 abcdef"),
            Some(Err(CommandError::Usage("/login <api_id> <api_hash> <phone>")))
        );
        assert_eq!(
            parse("/login twelve abcdef +39123456789"),
            Some(Err(CommandError::InvalidApiId))
        );
    }

    #[test]
    fn test_verification_arguments() {
        assert_eq!(
            parse_ok("/verify_code 12345"),
            Command::VerifyCode {
                code: "12345".into()
            }
        );
        assert_eq!(
            parse("/verify_code"),
            Some(Err(CommandError::Usage("/verify_code <code>")))
        );
        assert_eq!(
            parse_ok("/verify_2fa hunter two"),
            Command::VerifyTwoFa {
                password: "hunter two".into()
            }
        );
        assert_eq!(
            parse("/verify_2fa"),
            Some(Err(CommandError::Usage("/verify_2fa <password>")))
        );
    }

    #[test]
    fn test_allow_chat_arguments() {
        assert_eq!(
            parse_ok("/allow_chat @example"),
            Command::AllowChat {
                chat: ChatRef::Username("@example".into())
            }
        );
        assert_eq!(
            parse_ok("/allow_chat -1001234"),
            Command::AllowChat {
                chat: ChatRef::Id(-1_001_234)
            }
        );
        assert_eq!(
            parse("/allow_chat notanumber"),
            Some(Err(CommandError::InvalidChat))
        );
    }

    #[test]
    fn test_non_commands_are_ignored() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse(""), None);
        // Prefixes are case-sensitive.
        assert_eq!(parse("/Start"), None);
        assert_eq!(parse("/unknown"), None);
    }
}
