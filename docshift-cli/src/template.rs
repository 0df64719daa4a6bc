//! Migration file generation

use chrono::{DateTime, Utc};

/// Timestamp layout of generated versions: minutes, then seconds and microseconds
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S%6f";

/// Version for a migration created at `now`
///
/// Versions must stay unique and sort after their parent, so a clock that
/// has not moved past `last_version` yields the next number instead.
pub fn next_version(now: DateTime<Utc>, last_version: Option<&str>) -> String {
    let candidate = now.format(VERSION_FORMAT).to_string();
    match last_version {
        Some(last) if candidate.as_str() <= last => last
            .parse::<u128>()
            .map(|value| (value + 1).to_string())
            .unwrap_or(candidate),
        _ => candidate,
    }
}

/// Contents of a new migration file with empty operation lists
pub fn render_migration(title: &str, version: &str, last_version: Option<&str>) -> String {
    let quote = |value: &str| serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value));
    let last_version = match last_version {
        Some(parent) => quote(parent),
        None => "None".to_string(),
    };

    format!(
        r#"# Generated by docshift
title: {title}
version: {version}
last_version: {last_version}

# Operations run by `docshift upgrade`, in order. Example:
#   - op: create_collection
#     name: users
upgrade: []

# Operations run by `docshift downgrade`; they should undo `upgrade`. Example:
#   - op: drop_collection
#     name: users
downgrade: []
"#,
        title = quote(title),
        version = quote(version),
        last_version = last_version,
    )
}
