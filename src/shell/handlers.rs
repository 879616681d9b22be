//! Shell command handlers
//!
//! Runs a parsed command against any backend and renders the reply text.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::shell::Command;

const HELP: &str = "\
SET key value [ttl_secs]     store a value (ttl 0 or omitted = default)
UPDATE key value [ttl_secs]  replace an existing value
GET key                      read a value
MGET key [key...]            read several values
DEL key                      delete an existing key
KEYS                         list live keys
COUNT                        stored entries, expired-but-unswept included
SIZE                         approximate size in bytes
STATS                        hit/miss/expiry counters as JSON
QUIT                         close the cache and exit";

/// Executes `command` and returns the text to print.
///
/// `Quit` is the caller's concern and renders as an empty reply.
pub fn execute(cache: &dyn CacheBackend<String>, command: Command) -> Result<String> {
    let reply = match command {
        Command::Set { key, value, ttl } => {
            cache.set(&key, value, ttl)?;
            "OK".to_string()
        }
        Command::Update { key, value, ttl } => {
            cache.update(&key, value, ttl)?;
            "OK".to_string()
        }
        Command::Get { key } => cache.get(&key)?.unwrap_or_else(|| "(nil)".to_string()),
        Command::GetMany { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            let result = cache.get_many(&keys)?;
            keys.iter()
                .map(|key| match result.found.get(*key) {
                    Some(value) => format!("{} = {}", key, value),
                    None => format!("{} = (nil)", key),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Delete { key } => {
            cache.delete(&key)?;
            "OK".to_string()
        }
        Command::Keys => {
            let mut keys = Vec::new();
            cache.range(&mut |key, _| {
                keys.push(key.to_string());
                true
            })?;
            keys.sort();
            if keys.is_empty() {
                "(empty)".to_string()
            } else {
                keys.join("\n")
            }
        }
        Command::Count => cache.number_of_records().to_string(),
        Command::Size => format!("{} bytes", cache.capacity()?),
        Command::Stats => serde_json::to_string_pretty(&cache.stats()?)?,
        Command::Help => HELP.to_string(),
        Command::Quit => String::new(),
    };

    Ok(reply)
}
