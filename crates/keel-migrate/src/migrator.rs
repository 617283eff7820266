//! The migration engine.
//!
//! Every schema-changing operation runs under the database lock and follows
//! the same protocol per unit: mark the target version dirty, execute the
//! unit, mark it clean. A failure stops the run with the record still dirty,
//! and later runs refuse to start until an operator calls [`Migrator::force`].

use std::future::Future;
use std::sync::Arc;

use keel_core::{
    Direction, MigrationSet, MigrationSource, MigrationUnit, SchemaVersion, VersionRecord,
};
use keel_db::{Backend, Driver, Locker, VersionStore};

use crate::config::MigratorConfig;
use crate::error::{MigrateError, MigrateResult};
use crate::outcome::{MigrationOutcome, StatusReport};
use crate::verify::{verify_relations, VerifyReport};

/// Applies a migration source to one database
pub struct Migrator {
    driver: Arc<dyn Driver>,
    store: Arc<dyn VersionStore>,
    locker: Arc<dyn Locker>,
    source: Arc<dyn MigrationSource>,
    config: MigratorConfig,
}

impl Migrator {
    pub fn new(
        backend: Backend,
        source: Arc<dyn MigrationSource>,
        config: MigratorConfig,
    ) -> Self {
        Self::from_parts(
            backend.driver,
            backend.store,
            backend.locker,
            source,
            config,
        )
    }

    /// Build from separately supplied capabilities.
    pub fn from_parts(
        driver: Arc<dyn Driver>,
        store: Arc<dyn VersionStore>,
        locker: Arc<dyn Locker>,
        source: Arc<dyn MigrationSource>,
        config: MigratorConfig,
    ) -> Self {
        Self {
            driver,
            store,
            locker,
            source,
            config,
        }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Apply pending units in ascending order, stopping after `to` if given.
    pub async fn up(&self, to: Option<SchemaVersion>) -> MigrateResult<MigrationOutcome> {
        if let Some(outcome) = self.deferred().await? {
            return Ok(outcome);
        }
        let set = self.load()?;
        if let Some(target) = to {
            self.check_known(&set, target)?;
        }
        let limit = to.unwrap_or(SchemaVersion::MAX);

        self.with_lock(|| async {
            let current = self.clean_record().await?;
            self.run_up(current, set.units_between(current, limit))
                .await
        })
        .await
    }

    /// Revert applied units in descending order until the schema is at `to`.
    pub async fn down(&self, to: SchemaVersion) -> MigrateResult<MigrationOutcome> {
        if let Some(outcome) = self.deferred().await? {
            return Ok(outcome);
        }
        let set = self.load()?;
        self.check_known(&set, to)?;

        self.with_lock(|| async {
            let current = self.clean_record().await?;
            self.run_down(&set, current, to).await
        })
        .await
    }

    /// Migrate up or down to exactly `target`.
    pub async fn goto(&self, target: SchemaVersion) -> MigrateResult<MigrationOutcome> {
        if let Some(outcome) = self.deferred().await? {
            return Ok(outcome);
        }
        let set = self.load()?;
        self.check_known(&set, target)?;

        self.with_lock(|| async {
            let current = self.clean_record().await?;
            if target >= current {
                self.run_up(current, set.units_between(current, target))
                    .await
            } else {
                self.run_down(&set, current, target).await
            }
        })
        .await
    }

    /// Apply the next `n` units (`n > 0`) or revert the last `-n` (`n < 0`).
    ///
    /// Asking for more steps than exist applies or reverts everything there is.
    pub async fn steps(&self, n: i64) -> MigrateResult<MigrationOutcome> {
        if n == 0 {
            let record = self.current_version().await?;
            return Ok(MigrationOutcome::NoChange {
                version: record.version,
            });
        }
        if let Some(outcome) = self.deferred().await? {
            return Ok(outcome);
        }
        let set = self.load()?;
        let count = usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX);

        self.with_lock(|| async {
            let current = self.clean_record().await?;
            if n > 0 {
                let pending = set.units_after(current);
                self.run_up(current, &pending[..count.min(pending.len())])
                    .await
            } else {
                self.check_known(&set, current)?;
                let applied = set.units_between(SchemaVersion::NONE, current);
                let target = applied
                    .len()
                    .checked_sub(count)
                    .and_then(|keep| keep.checked_sub(1))
                    .map(|last_kept| applied[last_kept].version)
                    .unwrap_or(SchemaVersion::NONE);
                self.run_down(&set, current, target).await
            }
        })
        .await
    }

    /// The stored record. Takes no lock.
    pub async fn current_version(&self) -> MigrateResult<VersionRecord> {
        self.store.read().await.map_err(MigrateError::Store)
    }

    /// Every source unit marked applied, dirty or pending. Takes no lock.
    pub async fn status(&self) -> MigrateResult<StatusReport> {
        let set = self.load()?;
        let current = self.current_version().await?;
        Ok(StatusReport::new(&set, current))
    }

    /// Record `version` as cleanly applied, whatever the current state.
    ///
    /// The recovery path after a failed unit has been repaired by hand. No
    /// statements run.
    pub async fn force(&self, version: SchemaVersion) -> MigrateResult<VersionRecord> {
        let set = self.load()?;
        self.check_known(&set, version)?;

        self.with_lock(|| async {
            let previous = self.current_version().await?;
            let record = VersionRecord::clean(version);
            self.write(record).await?;
            log::warn!("Forced schema version from {previous} to {record}");
            Ok(record)
        })
        .await
    }

    /// Clear a lock left behind by a crashed run.
    pub async fn unlock(&self) -> MigrateResult<()> {
        self.locker
            .force_release()
            .await
            .map_err(MigrateError::Lock)?;
        log::info!("Cleared migration lock on {}", self.driver.db_type());
        Ok(())
    }

    /// Check that each of `names` exists as a table or view.
    pub async fn verify(&self, names: &[String]) -> MigrateResult<VerifyReport> {
        verify_relations(self.driver.as_ref(), names).await
    }

    fn load(&self) -> MigrateResult<MigrationSet> {
        let set = self.source.list()?;
        log::debug!(
            "{} migration(s) available from {}",
            set.len(),
            self.source.location()
        );
        Ok(set)
    }

    fn check_known(&self, set: &MigrationSet, version: SchemaVersion) -> MigrateResult<()> {
        if set.is_known(version) {
            Ok(())
        } else {
            Err(MigrateError::UnknownVersion {
                version,
                location: self.source.location(),
            })
        }
    }

    async fn deferred(&self) -> MigrateResult<Option<MigrationOutcome>> {
        if !self.config.defers() {
            return Ok(None);
        }
        let record = self.current_version().await?;
        log::info!("Prod environment. Migration is run before deployment.");
        Ok(Some(MigrationOutcome::Deferred {
            version: record.version,
        }))
    }

    /// Run `op` holding the lock. The lock is released whatever `op` returns.
    async fn with_lock<T, F, Fut>(&self, op: F) -> MigrateResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MigrateResult<T>>,
    {
        let handle = self
            .locker
            .acquire()
            .await
            .map_err(MigrateError::from_lock)?;
        log::debug!("Acquired migration lock {}", handle.key());

        let result = op().await;

        if let Err(e) = self.locker.release(&handle).await {
            log::warn!("Failed to release migration lock {}: {e}", handle.key());
        }
        result
    }

    /// Current version, refusing to continue from a dirty record.
    async fn clean_record(&self) -> MigrateResult<SchemaVersion> {
        let record = self.current_version().await?;
        if record.dirty {
            return Err(MigrateError::DirtyState {
                version: record.version,
            });
        }
        Ok(record.version)
    }

    async fn write(&self, record: VersionRecord) -> MigrateResult<()> {
        self.store.write(record).await.map_err(MigrateError::Store)
    }

    async fn run_up(
        &self,
        from: SchemaVersion,
        pending: &[MigrationUnit],
    ) -> MigrateResult<MigrationOutcome> {
        let Some(last) = pending.last() else {
            return Ok(MigrationOutcome::NoChange { version: from });
        };

        let mut applied = Vec::with_capacity(pending.len());
        for unit in pending {
            self.apply(unit, Direction::Up, unit.version).await?;
            applied.push(unit.version);
        }
        Ok(MigrationOutcome::Migrated {
            from,
            to: last.version,
            applied,
        })
    }

    async fn run_down(
        &self,
        set: &MigrationSet,
        from: SchemaVersion,
        to: SchemaVersion,
    ) -> MigrateResult<MigrationOutcome> {
        if to >= from {
            return Ok(MigrationOutcome::NoChange { version: from });
        }
        self.check_known(set, from)?;

        let units = set.units_between(to, from);
        if let Some(unit) = units.iter().find(|u| !u.has_down()) {
            return Err(MigrateError::MissingDown {
                version: unit.version,
            });
        }

        let mut reverted = Vec::with_capacity(units.len());
        for unit in units.iter().rev() {
            let below = set.previous(unit.version).max(to);
            self.apply(unit, Direction::Down, below).await?;
            reverted.push(unit.version);
        }
        Ok(MigrationOutcome::Migrated {
            from,
            to,
            applied: reverted,
        })
    }

    /// Run one unit, bracketing it with dirty and clean writes of `record_as`.
    async fn apply(
        &self,
        unit: &MigrationUnit,
        direction: Direction,
        record_as: SchemaVersion,
    ) -> MigrateResult<()> {
        let statements = unit
            .statements(direction)
            .ok_or(MigrateError::MissingDown {
                version: unit.version,
            })?;
        let within_transaction = self.config.use_transactions
            && unit.transactional
            && self.driver.supports_transactional_ddl();

        self.write(VersionRecord::dirty(record_as)).await?;
        log::info!("Applying {unit} ({direction})");

        self.driver
            .execute(statements, within_transaction)
            .await
            .map_err(|cause| MigrateError::MigrationFailed {
                version: unit.version,
                direction,
                cause,
            })?;

        self.write(VersionRecord::clean(record_as)).await?;
        log::info!("Applied {unit} ({direction}), schema version is now {record_as}");
        Ok(())
    }
}

#[cfg(test)]
#[path = "migrator_test.rs"]
mod tests;
