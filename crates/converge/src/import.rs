//! Import token resolution
//!
//! Tokens are either a single identifier or `parent<sep>id` for kinds
//! addressed inside another object. Splitting is strict: the field count
//! must match and no field may be empty.

use crate::error::{Error, Result};
use crate::registry::registry;
use crate::schema::{ImportFormat, KindSchema};
use crate::types::Identity;

/// Resolve `token` into the identity of a `kind` instance
pub fn resolve(token: &str, kind: &str) -> Result<Identity> {
    resolve_with(token, registry().require(kind)?)
}

/// Resolve against an explicit schema
pub fn resolve_with(token: &str, kind: &KindSchema) -> Result<Identity> {
    let invalid = || Error::InvalidImportToken {
        kind: kind.name.to_string(),
        token: token.to_string(),
        expected: kind.import.expected(&kind.identity),
    };

    let token = token.trim();
    match kind.import {
        ImportFormat::Single => {
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                return Err(invalid());
            }
            Ok(Identity::new(token))
        }
        ImportFormat::Scoped { separator } => {
            let parts: Vec<&str> = token.split(separator).collect();
            match parts.as_slice() {
                [parent, id] if !parent.is_empty() && !id.is_empty() => {
                    Ok(Identity::scoped(*parent, *id))
                }
                _ => Err(invalid()),
            }
        }
    }
}
