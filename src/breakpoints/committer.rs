//! Whole-set breakpoint replacement.
//!
//! Every commit for script `S`:
//!
//! 1. removes each breakpoint committed for `S`, one at a time
//! 2. adds every requested breakpoint concurrently
//! 3. records the ids of the successful adds as `S`'s new set
//!
//! The committed set tracks each remote call as it completes, so a commit
//! that runs out of time leaves no breakpoint untracked.
//!
//! Commits from the whole session go through one FIFO queue, so remote
//! calls of two commits never interleave. Each commit has its own time
//! budget; running out fails that commit and frees the queue.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{BreakpointId, ScriptId};
use crate::paths;
use crate::protocol::{Breakpoint, BreakpointLocation};

use super::RemoteDebuggerClient;

// ============================================================================
// Constants
// ============================================================================

/// Default time budget of one commit.
pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// A commit waiting for its script to be observed.
struct PendingCommit {
    url: String,
    responder: oneshot::Sender<Result<ScriptId>>,
}

#[derive(Default)]
struct CommitterState {
    /// Canonical URL → script.
    scripts_by_url: FxHashMap<String, ScriptId>,
    /// Script → URL as announced.
    urls_by_script: FxHashMap<ScriptId, String>,
    /// Script → ids currently committed.
    committed: FxHashMap<ScriptId, Vec<BreakpointId>>,
    /// Canonical URL → waiting commit.
    pending: FxHashMap<String, PendingCommit>,
}

// ============================================================================
// BreakpointCommitter
// ============================================================================

/// Replaces a script's breakpoints with a new set.
pub struct BreakpointCommitter {
    remote: Arc<dyn RemoteDebuggerClient>,
    commit_timeout: Duration,
    queue: tokio::sync::Mutex<()>,
    state: Mutex<CommitterState>,
}

impl BreakpointCommitter {
    /// Creates a committer with the default time budget.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteDebuggerClient>) -> Self {
        Self::with_timeout(remote, DEFAULT_COMMIT_TIMEOUT)
    }

    /// Creates a committer whose commits fail after `commit_timeout`.
    #[must_use]
    pub fn with_timeout(remote: Arc<dyn RemoteDebuggerClient>, commit_timeout: Duration) -> Self {
        Self {
            remote,
            commit_timeout,
            queue: tokio::sync::Mutex::new(()),
            state: Mutex::new(CommitterState::default()),
        }
    }

    /// Returns the remote runtime client.
    #[inline]
    #[must_use]
    pub fn remote(&self) -> &Arc<dyn RemoteDebuggerClient> {
        &self.remote
    }

    /// Registers a script and releases a commit waiting for its URL.
    pub fn script_observed(&self, script_id: &ScriptId, url: &str) {
        let key = paths::canonical_key(url);
        let mut state = self.state.lock();

        if let Some(previous) = state.urls_by_script.insert(script_id.clone(), url.to_string()) {
            state.scripts_by_url.remove(&paths::canonical_key(&previous));
        }
        state.scripts_by_url.insert(key.clone(), script_id.clone());

        if let Some(pending) = state.pending.remove(&key) {
            debug!(script = %script_id, url = %pending.url, "Releasing pending commit");
            let _ = pending.responder.send(Ok(script_id.clone()));
        }
    }

    /// Returns the script loaded from `url`.
    #[must_use]
    pub fn script_for_url(&self, url: &str) -> Option<ScriptId> {
        self.state
            .lock()
            .scripts_by_url
            .get(&paths::canonical_key(url))
            .cloned()
    }

    /// Returns the URL a script was loaded from.
    #[must_use]
    pub fn url_for_script(&self, script_id: &ScriptId) -> Option<String> {
        self.state.lock().urls_by_script.get(script_id).cloned()
    }

    /// Returns the breakpoint ids currently committed for a script.
    #[must_use]
    pub fn committed(&self, script_id: &ScriptId) -> Vec<BreakpointId> {
        self.state
            .lock()
            .committed
            .get(script_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of commits waiting for their script.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Forgets scripts and committed sets after a runtime reload.
    ///
    /// Commits waiting for a script stay queued.
    pub fn target_context_cleared(&self) {
        let mut state = self.state.lock();
        state.scripts_by_url.clear();
        state.urls_by_script.clear();
        state.committed.clear();
    }

    /// Replaces the breakpoints of the script loaded from `url`.
    ///
    /// Waits (without limit) for the script if it is not loaded yet. The
    /// result has one entry per location, in order; failed adds come back
    /// unverified at the requested position.
    ///
    /// # Errors
    ///
    /// - [`Error::Superseded`] if a newer commit for the same URL arrived while waiting
    /// - [`Error::CommitTimeout`] if the commit exceeded its time budget
    pub async fn set_breakpoints(
        &self,
        url: &str,
        locations: &[BreakpointLocation],
    ) -> Result<Vec<Breakpoint>> {
        let script_id = self.wait_for_script(url).await?;
        self.commit(&script_id, locations).await
    }

    /// Replaces the breakpoints of a known script.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommitTimeout`] if the commit exceeded its time budget.
    pub async fn commit(
        &self,
        script_id: &ScriptId,
        locations: &[BreakpointLocation],
    ) -> Result<Vec<Breakpoint>> {
        let _turn = self.queue.lock().await;

        match timeout(self.commit_timeout, self.run_commit(script_id, locations)).await {
            Ok(breakpoints) => Ok(breakpoints),
            Err(_) => {
                let timeout_ms = self.commit_timeout.as_millis() as u64;
                warn!(script = %script_id, timeout_ms, "Breakpoint commit timed out");
                Err(Error::commit_timeout(script_id.clone(), timeout_ms))
            }
        }
    }

    async fn wait_for_script(&self, url: &str) -> Result<ScriptId> {
        let key = paths::canonical_key(url);

        let waiting = {
            let mut state = self.state.lock();
            if let Some(script_id) = state.scripts_by_url.get(&key) {
                return Ok(script_id.clone());
            }

            let (responder, waiting) = oneshot::channel();
            let pending = PendingCommit {
                url: url.to_string(),
                responder,
            };
            if let Some(previous) = state.pending.insert(key, pending) {
                debug!(url, "Pending commit superseded");
                let _ = previous.responder.send(Err(Error::superseded(previous.url)));
            }
            waiting
        };

        debug!(url, "Waiting for script");
        waiting.await?
    }

    async fn run_commit(&self, script_id: &ScriptId, locations: &[BreakpointLocation]) -> Vec<Breakpoint> {
        // Ids leave the set only once their remove completed, and join it as
        // soon as their add lands, so a commit cut short by its time budget
        // leaves the set equal to what is live in the runtime.
        let previous = self.committed(script_id);
        for breakpoint_id in &previous {
            if let Err(e) = self.remote.remove_breakpoint(breakpoint_id).await {
                debug!(script = %script_id, breakpoint = %breakpoint_id, error = %e, "Ignoring failed remove");
            }
            self.forget(script_id, breakpoint_id);
        }

        let adds = locations.iter().map(|location| async move {
            let result = self
                .remote
                .set_breakpoint(
                    script_id,
                    location.line,
                    location.column.unwrap_or(0),
                    location.condition.as_deref(),
                )
                .await;
            if let Ok(remote) = &result {
                self.state
                    .lock()
                    .committed
                    .entry(script_id.clone())
                    .or_default()
                    .push(remote.breakpoint_id.clone());
            }
            result
        });
        let results = join_all(adds).await;

        let mut added = 0;
        let breakpoints = results
            .into_iter()
            .zip(locations)
            .map(|(result, location)| match result {
                Ok(remote) => {
                    added += 1;
                    Breakpoint {
                        verified: true,
                        line: Some(remote.actual_line),
                        column: Some(remote.actual_column),
                        ..Breakpoint::default()
                    }
                }
                Err(e) => {
                    debug!(script = %script_id, line = location.line, error = %e, "Breakpoint not set");
                    Breakpoint {
                        verified: false,
                        message: Some(e.to_string()),
                        line: Some(location.line),
                        column: location.column,
                        ..Breakpoint::default()
                    }
                }
            })
            .collect();

        debug!(
            script = %script_id,
            removed = previous.len(),
            added,
            requested = locations.len(),
            "Breakpoints committed"
        );

        breakpoints
    }

    fn forget(&self, script_id: &ScriptId, breakpoint_id: &BreakpointId) {
        let mut state = self.state.lock();
        if let Some(ids) = state.committed.get_mut(script_id) {
            ids.retain(|id| id != breakpoint_id);
            if ids.is_empty() {
                state.committed.remove(script_id);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::breakpoints::testing::{Call, FakeRemote};

    fn at(line: u32) -> BreakpointLocation {
        BreakpointLocation {
            line,
            column: None,
            condition: None,
        }
    }

    fn script() -> ScriptId {
        ScriptId::new("s1")
    }

    #[tokio::test]
    async fn test_commit_clears_then_rebuilds() {
        let remote = FakeRemote::new();
        let committer = BreakpointCommitter::new(remote.clone());

        // a, b, c
        committer
            .commit(&script(), &[at(1), at(2), at(3)])
            .await
            .expect("commit");
        let first_ids: Vec<String> = committer
            .committed(&script())
            .iter()
            .map(ToString::to_string)
            .collect();
        remote.calls.lock().clear();

        // b, d
        committer.commit(&script(), &[at(2), at(4)]).await.expect("commit");

        let calls = remote.calls();
        let removes: Vec<Call> = first_ids.into_iter().map(Call::Remove).collect();
        assert_eq!(calls[..3], removes[..]);

        let mut adds = calls[3..].to_vec();
        adds.sort_by_key(|call| match call {
            Call::Set { line, .. } => *line,
            Call::Remove(_) => u32::MAX,
        });
        assert_eq!(
            adds,
            [
                Call::Set { script: "s1".into(), line: 2 },
                Call::Set { script: "s1".into(), line: 4 },
            ]
        );
        assert_eq!(committer.committed(&script()).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_add_is_unverified_in_place() {
        let remote = FakeRemote::with_column_shift(2);
        remote.failing_lines.lock().insert(5);
        let committer = BreakpointCommitter::new(remote.clone());

        let breakpoints = committer
            .commit(&script(), &[at(4), at(5), at(6)])
            .await
            .expect("commit");

        assert_eq!(breakpoints.len(), 3);
        assert!(breakpoints[0].verified);
        assert_eq!(breakpoints[0].column, Some(2));
        assert!(!breakpoints[1].verified);
        assert_eq!(breakpoints[1].line, Some(5));
        assert!(breakpoints[1].message.as_deref().is_some_and(|m| m.contains("line 5")));
        assert!(breakpoints[2].verified);
        assert_eq!(breakpoints[2].line, Some(6));
        assert_eq!(committer.committed(&script()).len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_url_waits_for_script() {
        let remote = FakeRemote::new();
        let committer = Arc::new(BreakpointCommitter::new(remote.clone()));

        let task = tokio::spawn({
            let committer = Arc::clone(&committer);
            async move { committer.set_breakpoints("http://host/app.js", &[at(1)]).await }
        });

        while committer.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(remote.calls().is_empty());

        committer.script_observed(&ScriptId::new("9"), "http://host/app.js");

        let breakpoints = task.await.expect("join").expect("commit");
        assert!(breakpoints[0].verified);
        assert_eq!(committer.url_for_script(&ScriptId::new("9")).as_deref(), Some("http://host/app.js"));
    }

    #[tokio::test]
    async fn test_newer_commit_supersedes_waiting_one() {
        let committer = Arc::new(BreakpointCommitter::new(FakeRemote::new()));

        let first = tokio::spawn({
            let committer = Arc::clone(&committer);
            async move { committer.set_breakpoints("http://host/a.js", &[at(1)]).await }
        });
        while committer.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let committer = Arc::clone(&committer);
            async move { committer.set_breakpoints("http://host/a.js", &[at(2)]).await }
        });

        let err = first.await.expect("join").expect_err("superseded");
        assert!(matches!(err, Error::Superseded { .. }));

        committer.script_observed(&ScriptId::new("1"), "http://host/a.js");
        assert_eq!(second.await.expect("join").expect("commit").len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_commit() {
        let remote = FakeRemote::new();
        remote.hanging_scripts.lock().insert("slow".into());
        let committer = Arc::new(BreakpointCommitter::with_timeout(
            remote.clone(),
            Duration::from_millis(50),
        ));

        let slow = tokio::spawn({
            let committer = Arc::clone(&committer);
            async move { committer.commit(&ScriptId::new("slow"), &[at(1)]).await }
        });
        let fast = tokio::spawn({
            let committer = Arc::clone(&committer);
            async move { committer.commit(&ScriptId::new("fast"), &[at(1)]).await }
        });

        let err = slow.await.expect("join").expect_err("timeout");
        assert!(matches!(err, Error::CommitTimeout { .. }));
        assert!(err.is_timeout());

        let breakpoints = fast.await.expect("join").expect("commit");
        assert!(breakpoints[0].verified);
    }

    #[tokio::test]
    async fn test_timeout_during_removes_keeps_unremoved_ids() {
        let remote = FakeRemote::new();
        let committer = BreakpointCommitter::with_timeout(remote.clone(), Duration::from_millis(50));
        committer.commit(&script(), &[at(1), at(2)]).await.expect("commit");
        let first = committer.committed(&script());
        remote.hanging_removes.lock().insert(first[0].to_string());

        let err = committer.commit(&script(), &[at(3)]).await.expect_err("timeout");
        assert!(err.is_timeout());
        assert_eq!(committer.committed(&script()), first);

        remote.hanging_removes.lock().clear();
        committer.commit(&script(), &[at(5)]).await.expect("commit");

        let live = remote.live();
        assert_eq!(live.len(), 1);
        assert!(live[0].starts_with("s1:5:"));
        assert_eq!(committer.committed(&script()).len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_during_adds_tracks_landed_ids() {
        let remote = FakeRemote::new();
        remote.hanging_lines.lock().insert(2);
        let committer = BreakpointCommitter::with_timeout(remote.clone(), Duration::from_millis(50));

        let err = committer
            .commit(&script(), &[at(1), at(2)])
            .await
            .expect_err("timeout");
        assert!(err.is_timeout());
        let tracked: Vec<String> = committer
            .committed(&script())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(tracked, remote.live());

        remote.hanging_lines.lock().clear();
        committer.commit(&script(), &[at(7)]).await.expect("commit");

        let live = remote.live();
        assert_eq!(live.len(), 1);
        assert!(live[0].starts_with("s1:7:"));
    }

    #[tokio::test]
    async fn test_target_context_cleared_forgets_scripts() {
        let committer = BreakpointCommitter::new(FakeRemote::new());
        committer.script_observed(&script(), "http://host/a.js");
        committer.commit(&script(), &[at(1)]).await.expect("commit");

        committer.target_context_cleared();

        assert!(committer.script_for_url("http://host/a.js").is_none());
        assert!(committer.committed(&script()).is_empty());
    }
}
