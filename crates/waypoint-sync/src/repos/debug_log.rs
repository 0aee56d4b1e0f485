//! Debug log operations and views.

use waypoint_core::entities::{DebugLog, NewDebugLog};
use waypoint_core::enums::{Collection, DebugStatus};
use waypoint_core::ids::{PREFIX_DEBUG_LOG, generate_id};
use waypoint_core::rows::debug_log_to_row;
use waypoint_db::PersistenceAdapter;

use crate::error::SyncError;
use crate::store::TaskStore;
use crate::updates::debug_log::DebugLogUpdate;

const COLLECTION: Collection = Collection::DebugLogs;

impl<A: PersistenceAdapter> TaskStore<A> {
    /// Log a defect as `open` and return its id.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for a blank component or description,
    /// or the remote write error after rolling the log back.
    pub async fn log_debug(&self, new: NewDebugLog) -> Result<String, SyncError> {
        self.ensure_open()?;
        let component = new.component.trim();
        let description = new.description.trim();
        if component.is_empty() || description.is_empty() {
            return Err(SyncError::Validation(
                "debug log needs a component and a description".into(),
            ));
        }

        let log = DebugLog {
            id: generate_id(PREFIX_DEBUG_LOG)?,
            date_logged: self.shared.now(),
            component: component.to_string(),
            description: description.to_string(),
            severity: new.severity,
            status: DebugStatus::Open,
            fix_reference: None,
            logged_by: new.logged_by.trim().to_string(),
        };
        let id = log.id.clone();
        let row = debug_log_to_row(&log);
        let seq = self.shared.state.lock().debug_logs.upsert_local(log);

        self.commit(COLLECTION, seq, async {
            self.shared
                .adapter
                .insert(COLLECTION, row)
                .await
                .map(|_| ())
                .map_err(|e| SyncError::from_write(COLLECTION, e))
        })
        .await?;

        self.record_activity("debug_log.created", &id);
        Ok(id)
    }

    /// Change a debug log's status or fix reference.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for an empty update,
    /// `SyncError::NotFound` for an unknown id, or the remote write error
    /// after rolling the change back.
    pub async fn update_debug_log(
        &self,
        id: &str,
        update: DebugLogUpdate,
    ) -> Result<DebugLog, SyncError> {
        self.ensure_open()?;
        update.validate()?;

        let (seq, next) = {
            let mut state = self.shared.state.lock();
            let current = state
                .debug_logs
                .get(id)
                .ok_or_else(|| SyncError::not_found(COLLECTION, id))?;
            let next = update.apply_to(current);
            (state.debug_logs.upsert_local(next.clone()), next)
        };
        let patch = update.to_patch(self.shared.now());

        self.commit(COLLECTION, seq, async {
            match self.shared.adapter.update(COLLECTION, id, patch).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(SyncError::not_found(COLLECTION, id)),
                Err(e) => Err(SyncError::from_write(COLLECTION, e)),
            }
        })
        .await?;

        self.record_activity("debug_log.updated", id);
        Ok(next)
    }

    /// # Errors
    ///
    /// Returns `SyncError::NotFound` for an unknown id, or the remote write
    /// error after restoring the log.
    pub async fn delete_debug_log(&self, id: &str) -> Result<(), SyncError> {
        self.ensure_open()?;
        let seq = self
            .shared
            .state
            .lock()
            .debug_logs
            .delete_local(id)
            .ok_or_else(|| SyncError::not_found(COLLECTION, id))?;

        self.commit(COLLECTION, seq, async {
            self.shared
                .adapter
                .delete(COLLECTION, id)
                .await
                .map(|_| ())
                .map_err(|e| SyncError::from_write(COLLECTION, e))
        })
        .await?;

        self.record_activity("debug_log.deleted", id);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SyncError::NotFound` if no debug log has this id.
    pub fn get_debug_log(&self, id: &str) -> Result<DebugLog, SyncError> {
        self.shared
            .state
            .lock()
            .debug_logs
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::not_found(COLLECTION, id))
    }

    /// Critical logs not yet fixed, most recently logged first.
    #[must_use]
    pub fn list_critical_open(&self) -> Vec<DebugLog> {
        let mut logs: Vec<DebugLog> = self
            .shared
            .state
            .lock()
            .debug_logs
            .rows()
            .iter()
            .filter(|l| l.is_critical_open())
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.date_logged.cmp(&a.date_logged).then_with(|| a.id.cmp(&b.id)));
        logs
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use waypoint_core::entities::NewDebugLog;
    use waypoint_core::enums::{DebugStatus, Severity};

    use crate::test_support::helpers::test_store;
    use crate::updates::debug_log::DebugLogUpdateBuilder;

    fn defect(component: &str, severity: Severity) -> NewDebugLog {
        NewDebugLog {
            component: component.into(),
            description: "crashes on empty input".into(),
            severity,
            logged_by: "qa".into(),
        }
    }

    #[tokio::test]
    async fn fixing_a_critical_log_removes_it_from_the_view() {
        let (store, _, _) = test_store();
        let id = store.log_debug(defect("parser", Severity::Critical)).await.unwrap();
        assert_eq!(store.list_critical_open().len(), 1);

        let update = DebugLogUpdateBuilder::new()
            .status(DebugStatus::Fixed)
            .fix_reference(Some("PR-42".into()))
            .build();
        let fixed = store.update_debug_log(&id, update).await.unwrap();
        assert_eq!(fixed.fix_reference.as_deref(), Some("PR-42"));
        assert!(store.list_critical_open().is_empty());
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let (store, _, _) = test_store();
        let mut bad = defect(" ", Severity::Minor);
        assert!(store.log_debug(bad.clone()).await.is_err());
        bad.component = "parser".into();
        bad.description = String::new();
        assert!(store.log_debug(bad).await.is_err());
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let (store, _, _) = test_store();
        let id = store.log_debug(defect("parser", Severity::Major)).await.unwrap();
        store.delete_debug_log(&id).await.unwrap();
        assert!(matches!(
            store.get_debug_log(&id),
            Err(crate::SyncError::NotFound { .. })
        ));
    }
}
