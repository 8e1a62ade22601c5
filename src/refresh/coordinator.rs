//! Refresh Coordinator
//!
//! Serializes token refreshes across concurrent requests. The first request
//! to see a 401 leads a refresh cycle; every other 401 that arrives while the
//! cycle is running waits for its outcome instead of starting another one.
//! When the cycle settles, waiters receive their request re-decorated with
//! the new token (or the refresh failure) in the order they arrived.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::client::decorator::RequestDecorator;
use crate::core::sync::MutexExt;
use crate::core::HttpRequest;
use crate::error::{AuthClientError, RefreshError};
use crate::refresh::refresher::TokenRefresher;
use crate::token::SessionContext;
use crate::types::AccessToken;

/// Refresh counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Refresh cycles started.
    pub attempts: u64,
    /// Cycles that produced a new access token.
    pub successes: u64,
    /// Cycles that failed or were abandoned.
    pub failures: u64,
    /// Requests that waited on a cycle led by another request.
    pub queued: u64,
}

/// A request parked until the running refresh cycle settles.
struct PendingRequest {
    request: HttpRequest,
    completion: oneshot::Sender<Result<HttpRequest, AuthClientError>>,
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<PendingRequest>,
    stats: RefreshStats,
}

/// Settle every parked request and return to idle, in one lock acquisition.
fn settle(state: &Mutex<RefreshState>, outcome: &Result<AccessToken, RefreshError>) {
    let mut state = state.lock_or_recover();
    let waiting = state.queue.len();

    while let Some(pending) = state.queue.pop_front() {
        let result = match outcome {
            Ok(token) => Ok(RequestDecorator::decorate_with(pending.request, token)),
            Err(error) => Err(AuthClientError::RefreshFailed(error.clone())),
        };
        // A waiter that went away only loses its own result.
        let _ = pending.completion.send(result);
    }

    match outcome {
        Ok(_) => state.stats.successes += 1,
        Err(_) => state.stats.failures += 1,
    }
    state.refreshing = false;

    debug!(
        waiting = waiting,
        success = outcome.is_ok(),
        "Refresh cycle settled"
    );
}

/// Guard owned by the leading request for the duration of a cycle.
///
/// Dropped without [`RefreshCycle::complete`] (the leader was cancelled or
/// the refresher panicked), it rejects the waiters with
/// [`RefreshError::Abandoned`] and resets the state.
struct RefreshCycle<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl<'a> RefreshCycle<'a> {
    fn new(state: &'a Mutex<RefreshState>) -> Self {
        Self {
            state,
            settled: false,
        }
    }

    fn complete(mut self, outcome: &Result<AccessToken, RefreshError>) {
        settle(self.state, outcome);
        self.settled = true;
    }
}

impl Drop for RefreshCycle<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh cycle abandoned by its leading request");
            settle(self.state, &Err(RefreshError::Abandoned));
        }
    }
}

/// Coordinates token refreshes for one client.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    refresher: Arc<dyn TokenRefresher>,
    session: Arc<dyn SessionContext>,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn TokenRefresher>, session: Arc<dyn SessionContext>) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            refresher,
            session,
        }
    }

    /// Handle a 401 for `request`, which has not been retried yet.
    ///
    /// Resolves to the request decorated with a fresh token, ready to be
    /// replayed once, or to [`AuthClientError::RefreshFailed`].
    pub async fn on_unauthorized(&self, request: HttpRequest) -> Result<HttpRequest, AuthClientError> {
        let waiter = {
            let mut state = self.state.lock_or_recover();
            if state.refreshing {
                let (completion, receiver) = oneshot::channel();
                state.queue.push_back(PendingRequest {
                    request,
                    completion,
                });
                state.stats.queued += 1;
                debug!(
                    position = state.queue.len(),
                    "Refresh in flight, request queued"
                );
                Ok(receiver)
            } else {
                state.refreshing = true;
                state.stats.attempts += 1;
                Err(request)
            }
        };

        match waiter {
            Ok(receiver) => receiver
                .await
                .unwrap_or(Err(AuthClientError::RefreshFailed(RefreshError::Abandoned))),
            Err(request) => self.lead(request).await,
        }
    }

    async fn lead(&self, request: HttpRequest) -> Result<HttpRequest, AuthClientError> {
        let cycle = RefreshCycle::new(&self.state);
        info!(url = %request.url, "Access token rejected, refreshing");

        let outcome = self.refresh_access_token().await;
        match &outcome {
            Ok(_) => info!("Access token refreshed"),
            Err(error) => warn!(error = %error, "Access token refresh failed"),
        }
        cycle.complete(&outcome);

        outcome
            .map(|token| RequestDecorator::decorate_with(request, &token))
            .map_err(AuthClientError::RefreshFailed)
    }

    async fn refresh_access_token(&self) -> Result<AccessToken, RefreshError> {
        let refresh_token = self
            .session
            .refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;

        let token = self.refresher.refresh(&refresh_token).await?;

        if let Err(error) = self.session.store_access_token(&token) {
            warn!(
                error = %error,
                context = ?self.session.context(),
                "Refreshed token could not be persisted"
            );
        }

        Ok(token)
    }

    /// Whether a refresh cycle is running.
    pub fn is_refreshing(&self) -> bool {
        self.state.lock_or_recover().refreshing
    }

    /// Requests currently waiting on the running cycle.
    pub fn queued(&self) -> usize {
        self.state.lock_or_recover().queue.len()
    }

    pub fn get_stats(&self) -> RefreshStats {
        self.state.lock_or_recover().stats.clone()
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock_or_recover();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.refreshing)
            .field("queued", &state.queue.len())
            .field("stats", &state.stats)
            .finish()
    }
}
