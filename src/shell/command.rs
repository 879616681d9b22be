//! Shell command parsing
//!
//! Turns one input line into a typed command. Keywords are case-insensitive;
//! keys and values are taken verbatim.

use std::time::Duration;

use crate::error::{CacheError, Result};

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        key: String,
        value: String,
        ttl: Duration,
    },
    Get {
        key: String,
    },
    GetMany {
        keys: Vec<String>,
    },
    Update {
        key: String,
        value: String,
        ttl: Duration,
    },
    Delete {
        key: String,
    },
    Keys,
    Count,
    Size,
    Stats,
    Help,
    Quit,
}

impl Command {
    /// Parses a single line.
    ///
    /// # Formats
    /// - `SET key value [ttl_secs]` / `UPDATE key value [ttl_secs]`
    /// - `GET key` / `DEL key` / `MGET key...`
    /// - `KEYS`, `COUNT`, `SIZE`, `STATS`, `HELP`, `QUIT`
    ///
    /// An omitted TTL is zero, which the cache turns into its default TTL.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let keyword = parts
            .next()
            .ok_or_else(|| invalid("empty command"))?
            .to_ascii_uppercase();
        let args: Vec<&str> = parts.collect();

        let command = match keyword.as_str() {
            "SET" | "UPDATE" => {
                let (key, value, ttl) = match args.as_slice() {
                    [key, value] => (*key, *value, Duration::ZERO),
                    [key, value, ttl] => (*key, *value, parse_ttl(ttl)?),
                    _ => return Err(invalid(&format!("usage: {} key value [ttl_secs]", keyword))),
                };
                let (key, value) = (key.to_string(), value.to_string());
                if keyword == "SET" {
                    Command::Set { key, value, ttl }
                } else {
                    Command::Update { key, value, ttl }
                }
            }
            "GET" => Command::Get {
                key: single_key(&args, "GET")?,
            },
            "DEL" | "DELETE" => Command::Delete {
                key: single_key(&args, "DEL")?,
            },
            "MGET" => {
                if args.is_empty() {
                    return Err(invalid("usage: MGET key [key...]"));
                }
                Command::GetMany {
                    keys: args.iter().map(|k| k.to_string()).collect(),
                }
            }
            "KEYS" => no_args(&args, Command::Keys)?,
            "COUNT" => no_args(&args, Command::Count)?,
            "SIZE" => no_args(&args, Command::Size)?,
            "STATS" => no_args(&args, Command::Stats)?,
            "HELP" => Command::Help,
            "QUIT" | "EXIT" => Command::Quit,
            other => return Err(invalid(&format!("unknown command '{}'", other))),
        };

        Ok(command)
    }
}

fn invalid(message: &str) -> CacheError {
    CacheError::InvalidArgument(message.to_string())
}

fn parse_ttl(raw: &str) -> Result<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| invalid(&format!("ttl must be a whole number of seconds, got '{}'", raw)))
}

fn single_key(args: &[&str], keyword: &str) -> Result<String> {
    match args {
        [key] => Ok(key.to_string()),
        _ => Err(invalid(&format!("usage: {} key", keyword))),
    }
}

fn no_args(args: &[&str], command: Command) -> Result<Command> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(invalid("command takes no arguments"))
    }
}
