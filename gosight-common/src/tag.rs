// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

/// Parse custom tags typically provided by environment variables.
/// The tags are expected to be comma separated `key=value` pairs:
///     "env=prod,team=infra"
/// Keys are required and may not be empty; an empty value is allowed.
///
/// Returns a tuple of the correctly parsed tags and an optional error
/// message describing issues encountered during parsing.
pub fn parse_tags(str: &str) -> (HashMap<String, String>, Option<String>) {
    let chunks = str
        .split(',')
        .map(|chunk| chunk.trim())
        .filter(|chunk| !chunk.is_empty());

    let mut tags = HashMap::new();
    let mut error_message = String::new();
    for chunk in chunks {
        match chunk.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                tags.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => {
                if error_message.is_empty() {
                    error_message += "Errors while parsing tags: ";
                } else {
                    error_message += ", ";
                }
                error_message += &format!("invalid tag '{chunk}'");
            }
        }
    }

    let error_message = if error_message.is_empty() {
        None
    } else {
        Some(error_message)
    };
    (tags, error_message)
}

/// Merge `overlay` into a copy of `base`; keys present in both take the
/// overlay value.
pub fn merge(
    base: &HashMap<String, String>,
    overlay: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = base.clone();
    for (k, v) in overlay {
        merged.insert(k.clone(), v.clone());
    }
    merged
}
