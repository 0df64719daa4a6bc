//! Migration history listing

use std::fmt;

use crate::node::MigrationNode;

/// Position of a migration relative to the current version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Applied,
    Current,
    Pending,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Applied => write!(f, "APPLIED"),
            EntryState::Current => write!(f, "CURRENT"),
            EntryState::Pending => write!(f, "PENDING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub version: String,
    pub title: String,
    pub state: EntryState,
}

impl HistoryEntry {
    pub fn new(node: &MigrationNode, state: EntryState) -> Self {
        Self {
            version: node.version.clone(),
            title: node.title.clone(),
            state,
        }
    }
}

/// Render entries as a tree, marking the current one with an arrow
pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "[+] Migration history is empty".to_string();
    }

    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push("[+] Migration history:".to_string());

    for (index, entry) in entries.iter().enumerate() {
        let branch = if index + 1 == entries.len() { "└──" } else { "├──" };
        let marker = if entry.state == EntryState::Current { ">" } else { " " };
        lines.push(format!(
            "{}{}({}) {} - {}",
            branch, marker, entry.state, entry.version, entry.title
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: &str, state: EntryState) -> HistoryEntry {
        HistoryEntry {
            version: version.to_string(),
            title: format!("Test migration {}", version),
            state,
        }
    }

    #[test]
    fn test_render_history() {
        let entries = vec![
            entry("1", EntryState::Applied),
            entry("2", EntryState::Applied),
            entry("3", EntryState::Current),
            entry("4", EntryState::Pending),
            entry("5", EntryState::Pending),
        ];

        let expected = [
            "[+] Migration history:",
            "├── (APPLIED) 1 - Test migration 1",
            "├── (APPLIED) 2 - Test migration 2",
            "├──>(CURRENT) 3 - Test migration 3",
            "├── (PENDING) 4 - Test migration 4",
            "└── (PENDING) 5 - Test migration 5",
        ]
        .join("\n");
        assert_eq!(render_history(&entries), expected);
    }

    #[test]
    fn test_render_current_leaf() {
        let entries = vec![entry("1", EntryState::Applied), entry("2", EntryState::Current)];
        assert!(render_history(&entries).ends_with("└──>(CURRENT) 2 - Test migration 2"));
    }

    #[test]
    fn test_render_empty_history() {
        assert_eq!(render_history(&[]), "[+] Migration history is empty");
    }
}
