//! # Front-End Module
//!
//! Accepts TCP connections and UDP datagrams, parses the text command
//! protocol, invokes the engine façade, and replies (component C10).
//!
//! ## Wire protocol
//!
//! | Command | Success reply | Failure reply |
//! |---------|----------------|----------------|
//! | `PUT key value` | `OK` | `Invalid command` (wrong arity) or `Error writing to WAL` |
//! | `GET key` | `<value>` or `Data not found` | `Error persisting WAL` |
//! | `DEL key` | `OK` | `Error writing to WAL` |
//! | anything else | — | `Invalid command` |
//!
//! TCP carries one reply per line, newline-terminated, in command order.
//! UDP accepts only `GET key`, one command per datagram; whitespace is
//! canonicalized (trimmed) before tokenizing so a trailing newline on the
//! wire never breaks key comparison.

pub mod tcp;
pub mod udp;

use crate::facade::EngineFacade;

/// Parses and executes one `PUT`/`GET`/`DEL` line against `facade`,
/// returning the reply body (without a trailing newline).
fn execute_command(facade: &EngineFacade, line: &str) -> String {
    let tokens: Vec<&str> = line.trim().split_whitespace().collect();
    match tokens.as_slice() {
        ["PUT", key, value] => match facade.put(key, value) {
            Ok(()) => "OK".to_string(),
            Err(_) => "Error writing to WAL".to_string(),
        },
        ["GET", key] => match facade.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => "Data not found".to_string(),
            Err(_) => "Error persisting WAL".to_string(),
        },
        ["DEL", key] => match facade.delete(key) {
            Ok(()) => "OK".to_string(),
            Err(_) => "Error writing to WAL".to_string(),
        },
        _ => "Invalid command".to_string(),
    }
}

/// The UDP front end only accepts `GET` — matching the wire protocol table.
fn execute_udp_command(facade: &EngineFacade, line: &str) -> String {
    let tokens: Vec<&str> = line.trim().split_whitespace().collect();
    match tokens.as_slice() {
        ["GET", key] => match facade.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => "Data not found".to_string(),
            Err(_) => "Error persisting WAL".to_string(),
        },
        _ => "Invalid command".to_string(),
    }
}
