//! Discovery, linking and validation of migration units
//!
//! Every migration file carries a metadata block (`title`, `version`,
//! `last_version`) plus optional `upgrade` and `downgrade` operation lists.
//! Files are linked through `last_version` into what must be one simple chain.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::action::Operations;
use crate::error::HistoryError;
use crate::node::MigrationNode;

const MIGRATION_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Spellings of an absent parent accepted in `last_version`
const ROOT_MARKERS: [&str; 3] = ["None", "null", "~"];

/// All migrations found in a directory, linked by parent version
#[derive(Debug, Default)]
pub struct MigrationHistory {
    migrations: BTreeMap<String, MigrationNode>,
    roots: Vec<String>,
    /// Versions whose `last_version` names no known migration
    dangling: Vec<String>,
}

impl MigrationHistory {
    /// Empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every migration file in `dir` and link the result
    ///
    /// A single unreadable or malformed file aborts the whole load.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| HistoryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| HistoryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && is_migration_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let nodes = paths
            .iter()
            .map(|path| parse_migration_file(path))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded {} migration(s) from {}", nodes.len(), dir.display());
        Self::from_nodes(nodes)
    }

    /// Link already constructed nodes
    pub fn from_nodes(nodes: impl IntoIterator<Item = MigrationNode>) -> Result<Self, HistoryError> {
        let mut migrations = BTreeMap::new();
        for node in nodes {
            if migrations.contains_key(&node.version) {
                return Err(HistoryError::DuplicateVersion { version: node.version });
            }
            migrations.insert(node.version.clone(), node);
        }

        let mut history = Self {
            migrations,
            roots: Vec::new(),
            dangling: Vec::new(),
        };
        history.link();
        Ok(history)
    }

    fn link(&mut self) {
        let links: Vec<(String, Option<String>)> = self
            .migrations
            .values()
            .map(|node| (node.version.clone(), node.last_version.clone()))
            .collect();

        for (version, parent) in links {
            match parent {
                None => self.roots.push(version),
                Some(parent) => {
                    let Some(child) = self.migrations.get(&version).cloned() else {
                        continue;
                    };
                    match self.migrations.get_mut(&parent) {
                        Some(parent_node) => parent_node.add_child(&child),
                        None => self.dangling.push(version),
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn get(&self, version: &str) -> Option<&MigrationNode> {
        self.migrations.get(version)
    }

    /// Versions of the nodes without a parent
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Whether the migrations form exactly one chain from a single root
    pub fn validate(&self) -> bool {
        if self.roots.len() != 1 {
            return false;
        }
        if !self.dangling.is_empty() {
            tracing::debug!("Migrations reference unknown parents: {:?}", self.dangling);
            return false;
        }
        if let Some(node) = self.migrations.values().find(|node| node.children().len() > 1) {
            tracing::debug!("Migration {} has {} children", node.version, node.children().len());
            return false;
        }
        // Catches nodes that are only reachable through a cycle
        self.chain().len() == self.migrations.len()
    }

    /// Nodes in chain order, from the first root following the first child
    pub fn chain(&self) -> Vec<&MigrationNode> {
        let mut chain = Vec::with_capacity(self.migrations.len());
        let mut seen = HashSet::new();
        let mut next = self.get_first_node();

        while let Some(node) = next {
            if !seen.insert(node.version.as_str()) {
                break;
            }
            chain.push(node);
            next = node
                .children()
                .first()
                .and_then(|version| self.migrations.get(version));
        }
        chain
    }

    /// Index of `version` within the chain
    pub fn position(&self, version: &str) -> Option<usize> {
        self.chain().iter().position(|node| node.version == version)
    }

    pub fn get_first_node(&self) -> Option<&MigrationNode> {
        self.roots.first().and_then(|version| self.migrations.get(version))
    }

    pub fn get_first_version(&self) -> Option<&str> {
        self.get_first_node().map(|node| node.version.as_str())
    }

    pub fn get_last_node(&self) -> Option<&MigrationNode> {
        self.chain().last().copied()
    }

    pub fn get_last_version(&self) -> Option<&str> {
        self.get_last_node().map(|node| node.version.as_str())
    }

    /// Contiguous slice of the chain from `start_version` through `to_version`
    ///
    /// Both bounds are inclusive and default to the root and the leaf. An
    /// unknown version is an error; a start positioned after the end yields
    /// nothing.
    pub fn get_migrations(
        &self,
        start_version: Option<&str>,
        to_version: Option<&str>,
    ) -> Result<Vec<&MigrationNode>, HistoryError> {
        let chain = self.chain();
        if chain.is_empty() {
            return match start_version.or(to_version) {
                Some(version) => Err(HistoryError::VersionNotFound {
                    version: version.to_string(),
                }),
                None => Ok(Vec::new()),
            };
        }

        let find = |version: &str| {
            chain
                .iter()
                .position(|node| node.version == version)
                .ok_or_else(|| HistoryError::VersionNotFound {
                    version: version.to_string(),
                })
        };

        let start = match start_version {
            Some(version) => find(version)?,
            None => 0,
        };
        let end = match to_version {
            Some(version) => find(version)?,
            None => chain.len() - 1,
        };

        if start > end {
            return Ok(Vec::new());
        }
        Ok(chain[start..=end].to_vec())
    }
}

fn is_migration_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MIGRATION_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Parse one migration file into a node with its actions attached
pub fn parse_migration_file(path: &Path) -> Result<MigrationNode, HistoryError> {
    let content = std::fs::read_to_string(path).map_err(|source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_migration(path, &content)
}

fn parse_migration(path: &Path, content: &str) -> Result<MigrationNode, HistoryError> {
    let file: MigrationFile =
        serde_yaml::from_str(content).map_err(|e| HistoryError::invalid(path, e.to_string()))?;

    let title = metadata_text(path, "title", file.title)?
        .ok_or_else(|| HistoryError::invalid(path, "title cannot be empty"))?;
    let version = metadata_text(path, "version", file.version)?
        .ok_or_else(|| HistoryError::invalid(path, "version cannot be empty"))?;
    let last_version = metadata_text(path, "last_version", file.last_version)?
        .filter(|parent| !ROOT_MARKERS.contains(&parent.as_str()));

    Ok(MigrationNode::new(title, version, last_version)
        .with_upgrade(file.upgrade.unwrap_or_default())
        .with_downgrade(file.downgrade.unwrap_or_default()))
}

/// On-disk layout of a migration file
#[derive(Deserialize)]
struct MigrationFile {
    #[serde(default)]
    title: MetadataValue,
    #[serde(default)]
    version: MetadataValue,
    #[serde(default)]
    last_version: MetadataValue,
    #[serde(default)]
    upgrade: Option<Operations>,
    #[serde(default)]
    downgrade: Option<Operations>,
}

/// A metadata scalar, kept as the text it was written with
///
/// Integers of any width keep their digits. Floats are refused because
/// `1.10` and `1.1` would otherwise name the same version.
#[derive(Debug, Default, PartialEq)]
enum MetadataValue {
    #[default]
    Missing,
    Null,
    Text(String),
}

impl<'de> Deserialize<'de> for MetadataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MetadataVisitor)
    }
}

struct MetadataVisitor;

impl<'de> Visitor<'de> for MetadataVisitor {
    type Value = MetadataValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, an integer or a boolean")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(MetadataValue::Text(value.trim().to_string()))
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(MetadataValue::Text(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(MetadataValue::Text(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(MetadataValue::Text(value.to_string()))
    }

    fn visit_i128<E: de::Error>(self, value: i128) -> Result<Self::Value, E> {
        Ok(MetadataValue::Text(value.to_string()))
    }

    fn visit_u128<E: de::Error>(self, value: u128) -> Result<Self::Value, E> {
        Ok(MetadataValue::Text(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Err(E::custom(format!(
            "`{}` was read as a decimal number and may not match what was written; quote the value",
            value
        )))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(MetadataValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(MetadataValue::Null)
    }
}

/// Text of a metadata key that must be present; blank values come back as `None`
fn metadata_text(path: &Path, key: &str, value: MetadataValue) -> Result<Option<String>, HistoryError> {
    match value {
        MetadataValue::Missing => Err(HistoryError::invalid(path, format!("missing field `{}`", key))),
        MetadataValue::Null => Ok(None),
        MetadataValue::Text(text) if text.is_empty() => Ok(None),
        MetadataValue::Text(text) => Ok(Some(text)),
    }
}

/// Path of the migration file for a node, used by callers that write new files
pub fn migration_file_name(version: &str, title: &str) -> PathBuf {
    let slug: String = title
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if slug.is_empty() {
        PathBuf::from(format!("{}.yaml", version))
    } else {
        PathBuf::from(format!("{}_{}.yaml", version, slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn node(version: &str, parent: Option<&str>) -> MigrationNode {
        MigrationNode::new(format!("Migration {}", version), version, parent.map(str::to_string))
    }

    fn linear(count: usize) -> MigrationHistory {
        let nodes = (1..=count).map(|i| {
            let parent = if i == 1 { None } else { Some((i - 1).to_string()) };
            MigrationNode::new(format!("Migration {}", i), i.to_string(), parent)
        });
        MigrationHistory::from_nodes(nodes).unwrap()
    }

    fn versions(nodes: &[&MigrationNode]) -> Vec<String> {
        nodes.iter().map(|node| node.version.clone()).collect()
    }

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_is_empty_history() {
        let history = MigrationHistory::new();
        assert!(history.is_empty());

        let history = MigrationHistory::from_nodes([node("1", None)]).unwrap();
        assert!(!history.is_empty());
    }

    #[test]
    fn test_validate_history() {
        // Empty history
        assert!(!MigrationHistory::new().validate());

        // Several first migrations
        let history = MigrationHistory::from_nodes([node("1", None), node("2", None)]).unwrap();
        assert!(!history.validate());

        // A node with several children
        let history =
            MigrationHistory::from_nodes([node("1", None), node("2", Some("1")), node("3", Some("1"))]).unwrap();
        assert!(!history.validate());

        // A parent that does not exist
        let history = MigrationHistory::from_nodes([node("1", None), node("2", Some("9"))]).unwrap();
        assert!(!history.validate());

        // A cycle detached from the root
        let history = MigrationHistory::from_nodes([
            node("1", None),
            node("2", Some("3")),
            node("3", Some("2")),
        ])
        .unwrap();
        assert!(!history.validate());

        assert!(linear(3).validate());
    }

    #[test]
    fn test_duplicate_versions_are_rejected() {
        let result = MigrationHistory::from_nodes([node("1", None), node("1", None)]);
        assert!(matches!(result, Err(HistoryError::DuplicateVersion { .. })));
    }

    #[test]
    fn test_first_and_last() {
        let empty = MigrationHistory::new();
        assert!(empty.get_first_version().is_none());
        assert!(empty.get_first_node().is_none());
        assert!(empty.get_last_version().is_none());
        assert!(empty.get_last_node().is_none());

        let history = linear(3);
        assert_eq!(history.get_first_version(), Some("1"));
        assert_eq!(history.get_last_version(), Some("3"));
        assert_eq!(history.get_first_node(), Some(&node("1", None)));
        assert_eq!(history.get_last_node(), Some(&node("3", Some("2"))));
    }

    #[test]
    fn test_get_migrations() {
        let history = linear(5);

        assert_eq!(versions(&history.get_migrations(None, None).unwrap()), ["1", "2", "3", "4", "5"]);
        assert_eq!(versions(&history.get_migrations(None, Some("4")).unwrap()), ["1", "2", "3", "4"]);
        assert_eq!(versions(&history.get_migrations(Some("3"), None).unwrap()), ["3", "4", "5"]);
        assert_eq!(versions(&history.get_migrations(Some("2"), Some("4")).unwrap()), ["2", "3", "4"]);
        assert!(history.get_migrations(Some("4"), Some("2")).unwrap().is_empty());
    }

    #[test]
    fn test_get_migrations_unknown_version() {
        let history = linear(3);
        assert!(matches!(
            history.get_migrations(Some("9"), None),
            Err(HistoryError::VersionNotFound { version }) if version == "9"
        ));
        assert!(history.get_migrations(None, Some("9")).is_err());
        assert!(MigrationHistory::new().get_migrations(Some("1"), None).is_err());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "202610191200_first.yaml",
            "title: First\nversion: \"202610191200\"\nlast_version: None\nupgrade:\n  - op: create_collection\n    name: users\n",
        );
        write(
            &dir,
            "202610191201_second.yml",
            "title: Second\nversion: 202610191201\nlast_version: \"202610191200\"\n",
        );
        write(&dir, "README.md", "not a migration");

        let history = MigrationHistory::load(dir.path()).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.validate());
        assert_eq!(history.get_first_version(), Some("202610191200"));
        assert_eq!(history.get_last_version(), Some("202610191201"));
        assert_eq!(history.get("202610191200").unwrap().title, "First");
    }

    #[test]
    fn test_root_markers() {
        for marker in ["None", "null", "~", "\"\""] {
            let content = format!("title: T\nversion: \"1\"\nlast_version: {}\n", marker);
            let node = parse_migration(Path::new("m.yaml"), &content).unwrap();
            assert!(node.is_root(), "{} should mark the root", marker);
        }
    }

    #[test]
    fn test_missing_metadata_fails_the_whole_load() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_ok.yaml", "title: Ok\nversion: \"1\"\nlast_version: None\n");
        write(&dir, "2_broken.yaml", "upgrade: []\ndowngrade: []\n");

        let err = MigrationHistory::load(dir.path()).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidMigrationFormat { .. }));
        assert!(err.to_string().contains("Invalid migration file format"));
    }

    #[test]
    fn test_invalid_operations_are_format_errors() {
        let content = "title: T\nversion: \"1\"\nlast_version: None\nupgrade:\n  - op: explode\n";
        let err = parse_migration(Path::new("m.yaml"), content).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidMigrationFormat { .. }));

        let err = parse_migration(Path::new("m.yaml"), "- just\n- a list\n").unwrap_err();
        assert!(matches!(err, HistoryError::InvalidMigrationFormat { .. }));
    }

    #[test]
    fn test_unquoted_versions_keep_their_digits() {
        let content = "title: A\nversion: 20261019123045123456\nlast_version: 20261019123045123455\n";
        let node = parse_migration(Path::new("m.yaml"), content).unwrap();
        assert_eq!(node.version, "20261019123045123456");
        assert_eq!(node.last_version.as_deref(), Some("20261019123045123455"));

        let node = parse_migration(Path::new("m.yaml"), "title: 42\nversion: 7\nlast_version: ~\n").unwrap();
        assert_eq!(node.title, "42");
        assert_eq!(node.version, "7");
        assert!(node.is_root());
    }

    #[test]
    fn test_decimal_versions_must_be_quoted() {
        let content = "title: A\nversion: \"2\"\nlast_version: 1.10\n";
        let err = parse_migration(Path::new("m.yaml"), content).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidMigrationFormat { .. }));
        assert!(err.to_string().contains("quote the value"));

        let content = "title: A\nversion: \"2\"\nlast_version: \"1.10\"\n";
        let node = parse_migration(Path::new("m.yaml"), content).unwrap();
        assert_eq!(node.last_version.as_deref(), Some("1.10"));
    }

    #[test]
    fn test_metadata_must_be_scalar() {
        let content = "title: [a, b]\nversion: \"1\"\nlast_version: None\n";
        let err = parse_migration(Path::new("m.yaml"), content).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidMigrationFormat { .. }));
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = MigrationHistory::load(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, HistoryError::Io { .. }));
    }

    #[test]
    fn test_migration_file_name() {
        assert_eq!(
            migration_file_name("20261019", "Add users: v2!"),
            PathBuf::from("20261019_add_users_v2.yaml")
        );
        assert_eq!(migration_file_name("20261019", "???"), PathBuf::from("20261019.yaml"));
    }
}
