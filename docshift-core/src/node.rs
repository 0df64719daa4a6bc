//! A single migration unit

use std::fmt;
use std::sync::Arc;

use crate::action::{MigrationAction, Operations};

/// One migration: identity, parent link and the two directional actions
///
/// Identity is the `version`; two nodes are equal when their versions are.
#[derive(Clone)]
pub struct MigrationNode {
    pub title: String,
    pub version: String,
    /// Version of the parent node, `None` for the origin of the chain
    pub last_version: Option<String>,
    children: Vec<String>,
    upgrade: Arc<dyn MigrationAction>,
    downgrade: Arc<dyn MigrationAction>,
}

impl MigrationNode {
    pub fn new(title: impl Into<String>, version: impl Into<String>, last_version: Option<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            last_version,
            children: Vec::new(),
            upgrade: Arc::new(Operations::default()),
            downgrade: Arc::new(Operations::default()),
        }
    }

    pub fn with_upgrade(mut self, action: impl MigrationAction + 'static) -> Self {
        self.upgrade = Arc::new(action);
        self
    }

    pub fn with_downgrade(mut self, action: impl MigrationAction + 'static) -> Self {
        self.downgrade = Arc::new(action);
        self
    }

    /// Record `child` as a successor of this node
    pub fn add_child(&mut self, child: &MigrationNode) {
        self.children.push(child.version.clone());
    }

    /// Versions of the nodes whose parent is this node
    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.last_version.is_none()
    }

    pub fn upgrade(&self) -> &dyn MigrationAction {
        self.upgrade.as_ref()
    }

    pub fn downgrade(&self) -> &dyn MigrationAction {
        self.downgrade.as_ref()
    }
}

impl PartialEq for MigrationNode {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for MigrationNode {}

impl fmt::Display for MigrationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MigrationNode(title={}, version={}, last_version={})",
            self.title,
            self.version,
            self.last_version.as_deref().unwrap_or("None")
        )
    }
}

impl fmt::Debug for MigrationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationNode")
            .field("title", &self.title)
            .field("version", &self.version)
            .field("last_version", &self.last_version)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
