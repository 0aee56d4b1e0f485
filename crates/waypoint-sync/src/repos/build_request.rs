//! Build request operations and views.

use serde_json::json;
use waypoint_core::entities::{BuildRequest, NewBuildRequest};
use waypoint_core::enums::{Collection, Lane};
use waypoint_core::ids::{PREFIX_BUILD_REQUEST, generate_id};
use waypoint_core::rows::{Row, build_request_to_row};
use waypoint_db::PersistenceAdapter;

use crate::error::SyncError;
use crate::store::TaskStore;

const COLLECTION: Collection = Collection::BuildRequests;

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

impl<A: PersistenceAdapter> TaskStore<A> {
    /// Create a build request in `BACKLOG` and return its id.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for a blank name, or the remote write
    /// error after rolling the request back.
    pub async fn create_build_request(&self, new: NewBuildRequest) -> Result<String, SyncError> {
        self.ensure_open()?;
        let name = trimmed(&new.name);
        if name.is_empty() {
            return Err(SyncError::Validation("build request name must not be empty".into()));
        }

        let request = BuildRequest {
            id: generate_id(PREFIX_BUILD_REQUEST)?,
            name,
            context: trimmed(&new.context),
            module: trimmed(&new.module),
            deadline: new.deadline,
            notes: new.notes.map(|n| trimmed(&n)).filter(|n| !n.is_empty()),
            lane: Lane::Backlog,
            created_by: trimmed(&new.created_by),
            created_at: self.shared.now(),
        };
        let id = request.id.clone();
        let row = build_request_to_row(&request);
        let seq = self.shared.state.lock().build_requests.upsert_local(request);

        self.commit(COLLECTION, seq, async {
            self.shared
                .adapter
                .insert(COLLECTION, row)
                .await
                .map(|_| ())
                .map_err(|e| SyncError::from_write(COLLECTION, e))
        })
        .await?;

        self.record_activity("build_request.created", &id);
        Ok(id)
    }

    /// Move a build request to `lane`. Moving to its current lane is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotFound` for an unknown id, or the remote write
    /// error after moving the request back.
    pub async fn move_build_request(&self, id: &str, lane: Lane) -> Result<BuildRequest, SyncError> {
        self.ensure_open()?;
        let (seq, next) = {
            let mut state = self.shared.state.lock();
            let current = state
                .build_requests
                .get(id)
                .ok_or_else(|| SyncError::not_found(COLLECTION, id))?;
            if current.lane == lane {
                return Ok(current.clone());
            }
            let next = BuildRequest {
                lane,
                ..current.clone()
            };
            (state.build_requests.upsert_local(next.clone()), next)
        };

        let mut patch = Row::new();
        patch.insert("lane".into(), json!(lane.as_str()));
        patch.insert("updated_at".into(), json!(self.shared.now().to_rfc3339()));

        self.commit(COLLECTION, seq, async {
            match self.shared.adapter.update(COLLECTION, id, patch).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(SyncError::not_found(COLLECTION, id)),
                Err(e) => Err(SyncError::from_write(COLLECTION, e)),
            }
        })
        .await?;

        tracing::debug!(id, lane = %lane, "moved build request");
        self.record_activity("build_request.moved", id);
        Ok(next)
    }

    /// # Errors
    ///
    /// Returns `SyncError::NotFound` for an unknown id, or the remote write
    /// error after restoring the request.
    pub async fn delete_build_request(&self, id: &str) -> Result<(), SyncError> {
        self.ensure_open()?;
        let seq = self
            .shared
            .state
            .lock()
            .build_requests
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

        self.record_activity("build_request.deleted", id);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SyncError::NotFound` if no build request has this id.
    pub fn get_build_request(&self, id: &str) -> Result<BuildRequest, SyncError> {
        self.shared
            .state
            .lock()
            .build_requests
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::not_found(COLLECTION, id))
    }

    /// Build requests in `lane`, newest first.
    #[must_use]
    pub fn list_by_lane(&self, lane: Lane) -> Vec<BuildRequest> {
        let mut requests: Vec<BuildRequest> = self
            .shared
            .state
            .lock()
            .build_requests
            .rows()
            .iter()
            .filter(|r| r.lane == lane)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        requests
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use waypoint_core::entities::NewBuildRequest;
    use waypoint_core::enums::{Collection, Lane};

    use crate::test_support::helpers::test_store;

    fn request(name: &str) -> NewBuildRequest {
        NewBuildRequest {
            name: name.into(),
            module: "ingest".into(),
            created_by: "ops".into(),
            ..NewBuildRequest::default()
        }
    }

    #[tokio::test]
    async fn new_requests_land_in_backlog_newest_first() {
        let (store, _, clock) = test_store();
        let first = store.create_build_request(request("First")).await.unwrap();
        clock.advance(chrono::TimeDelta::minutes(1));
        let second = store.create_build_request(request("Second")).await.unwrap();

        let ids: Vec<String> = store
            .list_by_lane(Lane::Backlog)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
        assert!(store.list_by_lane(Lane::Done).is_empty());
    }

    #[tokio::test]
    async fn move_changes_lane_locally_and_remotely() {
        let (store, remote, _) = test_store();
        let id = store.create_build_request(request("Ship")).await.unwrap();

        let moved = store.move_build_request(&id, Lane::Testing).await.unwrap();
        assert_eq!(moved.lane, Lane::Testing);
        assert_eq!(store.list_by_lane(Lane::Testing).len(), 1);
        assert!(store.list_by_lane(Lane::Backlog).is_empty());

        let row = remote.get(Collection::BuildRequests, &id).unwrap();
        assert_eq!(row["lane"], serde_json::json!("TESTING"));
    }

    #[tokio::test]
    async fn rejected_move_is_rolled_back() {
        let (store, remote, _) = test_store();
        let id = store.create_build_request(request("Ship")).await.unwrap();
        remote.set_reject_writes(true);

        assert!(store.move_build_request(&id, Lane::Done).await.is_err());
        assert_eq!(store.get_build_request(&id).unwrap().lane, Lane::Backlog);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (store, _, _) = test_store();
        assert!(store.create_build_request(request(" ")).await.is_err());
        assert!(store.delete_build_request("brq-missing").await.is_err());
    }
}
