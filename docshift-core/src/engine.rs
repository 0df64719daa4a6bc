//! Upgrade and downgrade traversal
//!
//! After every completed step the persisted pointer is moved, so after a
//! failure it names the last step that fully completed. Earlier steps are not
//! rolled back.

use std::fmt;
use std::time::Instant;

use docshift_interfaces::DocumentDatabase;

use crate::error::EngineError;
use crate::history::MigrationHistory;
use crate::node::MigrationNode;
use crate::status::{EntryState, HistoryEntry};
use crate::version_store::VersionStore;

/// Direction a migration is applied in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upgrade => write!(f, "Upgrade"),
            Direction::Downgrade => write!(f, "Downgrade"),
        }
    }
}

/// How far an upgrade goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeTarget {
    /// Up to and including the last migration
    Latest,
    /// Up to and including the given version
    Version(String),
}

/// How far a downgrade goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DowngradeTarget {
    /// Revert the current migration only
    Previous,
    /// Revert everything, leaving no current version
    All,
    /// Revert until the given ancestor is current
    Version(String),
}

/// Outcome of one upgrade or downgrade run
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub direction: Direction,
    pub from_version: Option<String>,
    pub to_version: Option<String>,
    /// Versions whose action ran, in the order they ran
    pub applied: Vec<String>,
    pub duration_ms: u64,
}

impl ApplyReport {
    fn new(direction: Direction, from_version: Option<String>) -> Self {
        Self {
            direction,
            to_version: from_version.clone(),
            from_version,
            applied: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Whether nothing was applied
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Walks a validated history against one database
pub struct Migrator<'a> {
    history: &'a MigrationHistory,
    db: &'a dyn DocumentDatabase,
    store: &'a VersionStore,
}

impl<'a> Migrator<'a> {
    pub fn new(history: &'a MigrationHistory, db: &'a dyn DocumentDatabase, store: &'a VersionStore) -> Self {
        Self { history, db, store }
    }

    /// Apply pending migrations in ascending order up to `target`
    ///
    /// A target that is unknown or not strictly after the current version is a no-op.
    pub async fn upgrade(&self, target: UpgradeTarget) -> Result<ApplyReport, EngineError> {
        let started = Instant::now();
        let current = self.store.get_current_version(self.db).await?;
        let mut report = ApplyReport::new(Direction::Upgrade, current.clone());

        if self.history.is_empty() {
            tracing::info!("No migrations found, nothing to upgrade");
            return Ok(report);
        }
        self.ensure_valid()?;

        let chain = self.history.chain();
        let start = match &current {
            Some(version) => self.position_of_current(version)? + 1,
            None => 0,
        };
        let Some(first) = chain.get(start) else {
            tracing::info!("Already at the latest version, nothing to upgrade");
            return Ok(report);
        };

        let target_version = match &target {
            UpgradeTarget::Latest => chain[chain.len() - 1].version.clone(),
            UpgradeTarget::Version(version) => match self.history.position(version) {
                Some(index) if index >= start => version.clone(),
                Some(_) => {
                    tracing::info!("Version {} is already applied, nothing to upgrade", version);
                    return Ok(report);
                }
                None => {
                    tracing::info!("Version {} not found in the history, nothing to upgrade", version);
                    return Ok(report);
                }
            },
        };

        let steps = self
            .history
            .get_migrations(Some(first.version.as_str()), Some(target_version.as_str()))?;
        tracing::info!(
            "Upgrading from {} to {} ({} migration(s))",
            current.as_deref().unwrap_or("None"),
            target_version,
            steps.len()
        );

        for node in steps {
            self.run_step(Direction::Upgrade, node, &mut report).await?;
            self.store.set_current_version(self.db, Some(&node.version)).await?;
            report.to_version = Some(node.version.clone());
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!("Upgrade complete, current version is {}", target_version);
        Ok(report)
    }

    /// Revert applied migrations in descending order
    ///
    /// Nothing applied, or a target that is not a strict ancestor of the
    /// current version, is a no-op.
    pub async fn downgrade(&self, target: DowngradeTarget) -> Result<ApplyReport, EngineError> {
        let started = Instant::now();
        let current = self.store.get_current_version(self.db).await?;
        let mut report = ApplyReport::new(Direction::Downgrade, current.clone());

        let Some(current_version) = current.as_deref() else {
            tracing::info!("No migration has been applied, nothing to downgrade");
            return Ok(report);
        };
        if self.history.is_empty() {
            tracing::info!("No migrations found, nothing to downgrade");
            return Ok(report);
        }
        self.ensure_valid()?;

        let chain = self.history.chain();
        let current_index = self.position_of_current(current_version)?;

        let first_reverted = match &target {
            DowngradeTarget::Previous => current_index,
            DowngradeTarget::All => 0,
            DowngradeTarget::Version(version) => match self.history.position(version) {
                Some(index) if index < current_index => index + 1,
                Some(_) => {
                    tracing::info!("Version {} is not an ancestor of {}, nothing to downgrade", version, current_version);
                    return Ok(report);
                }
                None => {
                    tracing::info!("Version {} not found in the history, nothing to downgrade", version);
                    return Ok(report);
                }
            },
        };

        let steps = &chain[first_reverted..=current_index];
        tracing::info!(
            "Downgrading from {} to {} ({} migration(s))",
            current_version,
            steps[0].last_version.as_deref().unwrap_or("None"),
            steps.len()
        );

        for node in steps.iter().rev() {
            self.run_step(Direction::Downgrade, node, &mut report).await?;
            self.store
                .set_current_version(self.db, node.last_version.as_deref())
                .await?;
            report.to_version = node.last_version.clone();
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Downgrade complete, current version is {}",
            report.to_version.as_deref().unwrap_or("None")
        );
        Ok(report)
    }

    /// Every migration tagged relative to the current version, in chain order
    pub async fn status(&self) -> Result<Vec<HistoryEntry>, EngineError> {
        let current = self.store.get_current_version(self.db).await?;
        if self.history.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_valid()?;

        let current_index = match &current {
            Some(version) => Some(self.position_of_current(version)?),
            None => None,
        };

        Ok(self
            .history
            .chain()
            .into_iter()
            .enumerate()
            .map(|(index, node)| {
                let state = match current_index {
                    Some(current) if index < current => EntryState::Applied,
                    Some(current) if index == current => EntryState::Current,
                    _ => EntryState::Pending,
                };
                HistoryEntry::new(node, state)
            })
            .collect())
    }

    async fn run_step(
        &self,
        direction: Direction,
        node: &MigrationNode,
        report: &mut ApplyReport,
    ) -> Result<(), EngineError> {
        tracing::info!("{} {} - {}", direction, node.version, node.title);
        let step_started = Instant::now();

        let action = match direction {
            Direction::Upgrade => node.upgrade(),
            Direction::Downgrade => node.downgrade(),
        };

        match action.apply(self.db).await {
            Ok(()) => {
                tracing::debug!(
                    "{} {} completed in {:.2}s",
                    direction,
                    node.version,
                    step_started.elapsed().as_secs_f64()
                );
                report.applied.push(node.version.clone());
                Ok(())
            }
            Err(source) => {
                tracing::error!("{} {} failed: {}", direction, node.version, source);
                Err(EngineError::StepFailed {
                    direction,
                    version: node.version.clone(),
                    title: node.title.clone(),
                    completed: report.applied.clone(),
                    source,
                })
            }
        }
    }

    fn ensure_valid(&self) -> Result<(), EngineError> {
        if self.history.validate() {
            Ok(())
        } else {
            Err(EngineError::InvalidHistory)
        }
    }

    fn position_of_current(&self, version: &str) -> Result<usize, EngineError> {
        self.history
            .position(version)
            .ok_or_else(|| EngineError::UnknownCurrentVersion {
                version: version.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionError, MigrationAction, Operation, Operations};
    use async_trait::async_trait;
    use bson::doc;
    use docshift_storage::MemoryDatabase;

    const COLLECTION: &str = "docshift_version";

    struct FailingAction;

    #[async_trait]
    impl MigrationAction for FailingAction {
        async fn apply(&self, _db: &dyn DocumentDatabase) -> Result<(), ActionError> {
            Err(ActionError::custom("boom"))
        }
    }

    fn collection_ops(i: usize) -> (Operations, Operations) {
        let name = format!("test_collection_{}", i);
        (
            Operations::new(vec![Operation::CreateCollection { name: name.clone() }]),
            Operations::new(vec![Operation::DropCollection { name }]),
        )
    }

    fn node(i: usize) -> MigrationNode {
        let parent = if i == 1 { None } else { Some((i - 1).to_string()) };
        let (up, down) = collection_ops(i);
        MigrationNode::new(format!("Test migration {}", i), i.to_string(), parent)
            .with_upgrade(up)
            .with_downgrade(down)
    }

    fn history(count: usize) -> MigrationHistory {
        MigrationHistory::from_nodes((1..=count).map(node)).unwrap()
    }

    async fn setup() -> (MemoryDatabase, VersionStore) {
        let db = MemoryDatabase::new("test_db");
        let store = VersionStore::new(COLLECTION);
        store.initialize(&db).await.unwrap();
        (db, store)
    }

    async fn collections(db: &MemoryDatabase) -> Vec<String> {
        db.list_collection_names()
            .await
            .unwrap()
            .into_iter()
            .filter(|name| name.starts_with("test_collection_"))
            .collect()
    }

    async fn current(db: &MemoryDatabase, store: &VersionStore) -> Option<String> {
        store.get_current_version(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_upgrade_all_applies_in_order() {
        let (db, store) = setup().await;
        let history = history(5);
        let migrator = Migrator::new(&history, &db, &store);

        let report = migrator.upgrade(UpgradeTarget::Latest).await.unwrap();
        assert_eq!(report.applied, ["1", "2", "3", "4", "5"]);
        assert_eq!(report.from_version, None);
        assert_eq!(report.to_version.as_deref(), Some("5"));
        assert_eq!(current(&db, &store).await.as_deref(), Some("5"));
        assert_eq!(collections(&db).await.len(), 5);

        // Nothing left to do
        let report = migrator.upgrade(UpgradeTarget::Latest).await.unwrap();
        assert!(report.is_noop());
        assert_eq!(current(&db, &store).await.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_upgrade_to_version() {
        let (db, store) = setup().await;
        let history = history(5);
        let migrator = Migrator::new(&history, &db, &store);

        migrator.upgrade(UpgradeTarget::Version("2".to_string())).await.unwrap();
        assert_eq!(current(&db, &store).await.as_deref(), Some("2"));
        assert_eq!(collections(&db).await, ["test_collection_1", "test_collection_2"]);

        // Already applied and unknown targets are no-ops
        for target in ["1", "2", "42"] {
            let report = migrator.upgrade(UpgradeTarget::Version(target.to_string())).await.unwrap();
            assert!(report.is_noop());
        }
        assert_eq!(current(&db, &store).await.as_deref(), Some("2"));
        assert!(!db.has_collection("test_collection_3").await.unwrap());
    }

    #[tokio::test]
    async fn test_upgrade_failure_keeps_last_success() {
        let (db, store) = setup().await;
        let nodes = (1..=5).map(|i| if i == 3 { node(i).with_upgrade(FailingAction) } else { node(i) });
        let history = MigrationHistory::from_nodes(nodes).unwrap();
        let migrator = Migrator::new(&history, &db, &store);

        let err = migrator.upgrade(UpgradeTarget::Latest).await.unwrap_err();
        match err {
            EngineError::StepFailed {
                direction,
                version,
                completed,
                ..
            } => {
                assert_eq!(direction, Direction::Upgrade);
                assert_eq!(version, "3");
                assert_eq!(completed, ["1", "2"]);
            }
            other => panic!("expected StepFailed, got {:?}", other),
        }

        assert_eq!(current(&db, &store).await.as_deref(), Some("2"));
        assert_eq!(collections(&db).await, ["test_collection_1", "test_collection_2"]);
    }

    #[tokio::test]
    async fn test_upgrade_empty_history_is_noop() {
        let (db, store) = setup().await;
        let history = MigrationHistory::new();
        let report = Migrator::new(&history, &db, &store)
            .upgrade(UpgradeTarget::Latest)
            .await
            .unwrap();
        assert!(report.is_noop());
        assert_eq!(current(&db, &store).await, None);
    }

    #[tokio::test]
    async fn test_invalid_history_is_rejected() {
        let (db, store) = setup().await;
        let history = MigrationHistory::from_nodes([
            MigrationNode::new("a", "1", None),
            MigrationNode::new("b", "2", None),
        ])
        .unwrap();
        let migrator = Migrator::new(&history, &db, &store);

        assert!(matches!(
            migrator.upgrade(UpgradeTarget::Latest).await,
            Err(EngineError::InvalidHistory)
        ));
        assert_eq!(current(&db, &store).await, None);
    }

    #[tokio::test]
    async fn test_unknown_current_version() {
        let (db, store) = setup().await;
        store.set_current_version(&db, Some("99")).await.unwrap();
        let history = history(2);
        let migrator = Migrator::new(&history, &db, &store);

        assert!(matches!(
            migrator.upgrade(UpgradeTarget::Latest).await,
            Err(EngineError::UnknownCurrentVersion { .. })
        ));
        assert!(matches!(
            migrator.downgrade(DowngradeTarget::Previous).await,
            Err(EngineError::UnknownCurrentVersion { .. })
        ));
        assert!(collections(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_uninitialized_store_is_an_error() {
        let db = MemoryDatabase::new("test_db");
        let store = VersionStore::new(COLLECTION);
        let history = history(1);

        let result = Migrator::new(&history, &db, &store)
            .upgrade(UpgradeTarget::Latest)
            .await;
        assert!(matches!(result, Err(EngineError::Store(_))));
    }

    #[tokio::test]
    async fn test_downgrade_previous_with_nothing_applied() {
        let (db, store) = setup().await;
        let history = history(3);
        let report = Migrator::new(&history, &db, &store)
            .downgrade(DowngradeTarget::Previous)
            .await
            .unwrap();
        assert!(report.is_noop());
        assert_eq!(current(&db, &store).await, None);
    }

    #[tokio::test]
    async fn test_downgrade_modes() {
        let (db, store) = setup().await;
        let history = history(5);
        let migrator = Migrator::new(&history, &db, &store);
        migrator.upgrade(UpgradeTarget::Latest).await.unwrap();

        // One step back
        let report = migrator.downgrade(DowngradeTarget::Previous).await.unwrap();
        assert_eq!(report.applied, ["5"]);
        assert_eq!(current(&db, &store).await.as_deref(), Some("4"));
        assert!(!db.has_collection("test_collection_5").await.unwrap());

        // Descendants, the current version itself and unknown versions are no-ops
        for target in ["5", "4", "42"] {
            let report = migrator
                .downgrade(DowngradeTarget::Version(target.to_string()))
                .await
                .unwrap();
            assert!(report.is_noop());
        }
        assert_eq!(current(&db, &store).await.as_deref(), Some("4"));
        assert!(db.has_collection("test_collection_4").await.unwrap());

        // Back to an ancestor
        let report = migrator
            .downgrade(DowngradeTarget::Version("2".to_string()))
            .await
            .unwrap();
        assert_eq!(report.applied, ["4", "3"]);
        assert_eq!(current(&db, &store).await.as_deref(), Some("2"));

        // All the way
        let report = migrator.downgrade(DowngradeTarget::All).await.unwrap();
        assert_eq!(report.applied, ["2", "1"]);
        assert_eq!(report.to_version, None);
        assert_eq!(current(&db, &store).await, None);
        assert!(collections(&db).await.is_empty());

        // Again, nothing to do
        assert!(migrator.downgrade(DowngradeTarget::All).await.unwrap().is_noop());
    }

    #[tokio::test]
    async fn test_downgrade_failure_keeps_last_success() {
        let (db, store) = setup().await;
        let nodes = (1..=3).map(|i| if i == 2 { node(i).with_downgrade(FailingAction) } else { node(i) });
        let history = MigrationHistory::from_nodes(nodes).unwrap();
        let migrator = Migrator::new(&history, &db, &store);
        migrator.upgrade(UpgradeTarget::Latest).await.unwrap();

        let err = migrator.downgrade(DowngradeTarget::All).await.unwrap_err();
        assert!(matches!(err, EngineError::StepFailed { ref version, .. } if version == "2"));

        // 3 was reverted, 2 failed, 1 untouched
        assert_eq!(current(&db, &store).await.as_deref(), Some("2"));
        assert_eq!(collections(&db).await, ["test_collection_1", "test_collection_2"]);
    }

    #[tokio::test]
    async fn test_round_trip_restores_database() {
        let (db, store) = setup().await;
        let up = Operations::new(vec![
            Operation::CreateCollection {
                name: "users".to_string(),
            },
            Operation::InsertMany {
                collection: "users".to_string(),
                documents: vec![serde_json::from_value(serde_json::json!({"name": "ada"})).unwrap()],
            },
        ]);
        let down = Operations::new(vec![Operation::DropCollection {
            name: "users".to_string(),
        }]);
        let history = MigrationHistory::from_nodes([
            MigrationNode::new("Users", "1", None).with_upgrade(up).with_downgrade(down),
            node(2).with_upgrade(Operations::default()).with_downgrade(Operations::default()),
        ])
        .unwrap();
        let migrator = Migrator::new(&history, &db, &store);

        migrator.upgrade(UpgradeTarget::Latest).await.unwrap();
        assert_eq!(db.count_documents("users", doc! { "name": "ada" }).await.unwrap(), 1);

        migrator.downgrade(DowngradeTarget::All).await.unwrap();
        assert_eq!(current(&db, &store).await, None);
        assert_eq!(db.list_collection_names().await.unwrap(), [COLLECTION]);
    }

    #[tokio::test]
    async fn test_status_tags_entries() {
        let (db, store) = setup().await;
        let history = history(5);
        let migrator = Migrator::new(&history, &db, &store);

        let states: Vec<EntryState> = migrator.status().await.unwrap().iter().map(|e| e.state).collect();
        assert_eq!(states, vec![EntryState::Pending; 5]);

        migrator.upgrade(UpgradeTarget::Version("3".to_string())).await.unwrap();
        let states: Vec<EntryState> = migrator.status().await.unwrap().iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            [
                EntryState::Applied,
                EntryState::Applied,
                EntryState::Current,
                EntryState::Pending,
                EntryState::Pending
            ]
        );
    }
}
