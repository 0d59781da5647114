use crate::{
    filter::SearchMode, FetchError, FilterState, ListView, Operation, Reconcile, Resource,
};
use artsclub_client::{ApiClient, ClientError, CollectionPage, RequestOptions};
use futures::future::join_all;
use serde_json::Value;
use std::{
    fmt,
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio_util::sync::CancellationToken;
use tracing::info_span;
use tracing_futures::Instrument;

/// Which response wins when loads overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrdering {
    /// Only the most recently issued load may update state; slower earlier
    /// responses are discarded.
    #[default]
    LatestRequest,
    /// Whatever resolves last overwrites the page, regardless of when it was
    /// issued.
    ArrivalOrder,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetcherOptions {
    pub ordering: ResponseOrdering,
    pub search_mode: SearchMode,
}

impl FetcherOptions {
    /// The whole collection is fetched once and searched locally.
    #[must_use]
    pub fn client_side() -> Self {
        Self {
            search_mode: SearchMode::ClientOnly,
            ..Self::default()
        }
    }
}

/// A dismissible, non-fatal error shown above the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetcherState<R> {
    pub page: CollectionPage<R>,
    /// Filter of the page currently held.
    pub filter: FilterState,
    pub loading: bool,
    pub error: Option<Notice>,
    /// Whether any load has ever succeeded.
    pub loaded: bool,
}

impl<R> FetcherState<R> {
    /// The view shows only the error when the very first load failed.
    /// Later failures keep the previous rows on screen.
    #[must_use]
    pub fn is_blank_error(&self) -> bool {
        self.error.is_some() && !self.loaded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load (or a cancellation) made this response irrelevant.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    pub reconcile: Reconcile,
    /// Result of the follow-up load, when one was needed. `None` if the
    /// reload itself failed; the failure is recorded as a notice.
    pub reload: Option<LoadOutcome>,
}

#[derive(Debug)]
pub struct BulkOutcome<Id> {
    pub succeeded: Vec<Id>,
    pub failed: Vec<(Id, ClientError)>,
}

impl<Id> BulkOutcome<Id> {
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }
}

struct Inner<R> {
    state: FetcherState<R>,
    /// Filter of the last load issued and not cancelled. Follow-up reloads
    /// use it so they never undo a newer navigation.
    requested: FilterState,
    /// Sequence number of the last load issued.
    issued: u64,
    /// Loads with a sequence number up to this one were cancelled.
    cancelled_through: u64,
    in_flight: usize,
}

/// Loads a filtered, paginated collection of `R` and keeps it consistent
/// with the writes made through it. Each list page owns one.
pub struct Fetcher<R: Resource> {
    client: Arc<ApiClient>,
    options: FetcherOptions,
    inner: Mutex<Inner<R>>,
}

impl<R: Resource> Fetcher<R> {
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self::with_options(client, FetcherOptions::default())
    }

    #[must_use]
    pub fn with_options(client: Arc<ApiClient>, options: FetcherOptions) -> Self {
        Self {
            client,
            options,
            inner: Mutex::new(Inner {
                state: FetcherState {
                    page: CollectionPage::default(),
                    filter: FilterState::default(),
                    loading: false,
                    error: None,
                    loaded: false,
                },
                requested: FilterState::default(),
                issued: 0,
                cancelled_through: 0,
                in_flight: 0,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn options(&self) -> FetcherOptions {
        self.options
    }

    /// A list view whose search and paging agree with how this fetcher
    /// queries the server.
    #[must_use]
    pub fn list_view(&self, page_size: usize) -> ListView {
        ListView::for_options(page_size, &self.options)
    }

    /// A copy of everything the view needs to render.
    #[must_use]
    pub fn snapshot(&self) -> FetcherState<R> {
        self.inner().state.clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<R> {
        self.inner().state.page.items.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner().state.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<Notice> {
        self.inner().state.error.clone()
    }

    pub fn dismiss_error(&self) {
        self.inner().state.error = None;
    }

    /// Discard every load currently in flight, e.g. when the page goes away.
    pub fn cancel_pending(&self) {
        let mut inner = self.inner();
        inner.cancelled_through = inner.issued;
        inner.state.loading = false;
        inner.requested = inner.state.filter.clone();
    }

    fn record_error(inner: &mut Inner<R>, error: &ClientError, default: &str) {
        // 401 is handled by the client: the session is gone and the host is
        // navigating to login.
        if error.is_unauthenticated() {
            return;
        }
        inner.state.error = Some(Notice {
            message: error.user_message(default),
        });
    }

    /// Fetch the page described by `filter` and replace the held page with
    /// it. On failure the previous page stays and a notice is recorded.
    pub async fn load(&self, filter: &FilterState) -> Result<LoadOutcome, FetchError> {
        self.load_with_cancel(filter, &CancellationToken::new())
            .await
    }

    /// Like [`Self::load`], abandoning the request once `cancel` fires.
    pub async fn load_with_cancel(
        &self,
        filter: &FilterState,
        cancel: &CancellationToken,
    ) -> Result<LoadOutcome, FetchError> {
        let seq = {
            let mut inner = self.inner();
            inner.issued += 1;
            inner.in_flight += 1;
            inner.state.loading = true;
            inner.requested = filter.clone();
            inner.issued
        };

        let span = info_span!("artsclub.load", resource = R::NAME, seq, page = filter.page);
        let query = filter.to_query::<R>(self.options.search_mode);
        let request = self.fetch_page(query).instrument(span.clone());

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = request => Some(result),
        };

        let mut inner = self.inner();
        inner.in_flight -= 1;

        let Some(result) = result else {
            match self.options.ordering {
                ResponseOrdering::LatestRequest if seq == inner.issued => {
                    inner.state.loading = false;
                    inner.requested = inner.state.filter.clone();
                }
                ResponseOrdering::ArrivalOrder => inner.state.loading = inner.in_flight > 0,
                ResponseOrdering::LatestRequest => {}
            }
            span.in_scope(|| tracing::debug!("load cancelled"));
            return Err(FetchError::Cancelled);
        };

        let current = seq > inner.cancelled_through
            && match self.options.ordering {
                ResponseOrdering::LatestRequest => seq == inner.issued,
                ResponseOrdering::ArrivalOrder => true,
            };

        match self.options.ordering {
            ResponseOrdering::LatestRequest if seq == inner.issued => inner.state.loading = false,
            ResponseOrdering::ArrivalOrder => inner.state.loading = inner.in_flight > 0,
            ResponseOrdering::LatestRequest => {}
        }

        if !current {
            span.in_scope(|| tracing::debug!(latest = inner.issued, "discarding stale response"));
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(page) => {
                inner.state.page = page;
                inner.state.filter = filter.clone();
                inner.state.error = None;
                inner.state.loaded = true;
                Ok(LoadOutcome::Applied)
            }
            Err(error) => {
                if seq == inner.issued {
                    inner.requested = inner.state.filter.clone();
                }
                span.in_scope(|| tracing::warn!("failed to load {}: {error}", R::NAME));
                Self::record_error(&mut inner, &error, &format!("Failed to load {}", R::NAME));
                Err(error.into())
            }
        }
    }

    async fn fetch_page(
        &self,
        query: Vec<(String, String)>,
    ) -> Result<CollectionPage<R>, ClientError> {
        let mut page: CollectionPage<R> = self
            .client
            .list(R::PATH, RequestOptions {
                query,
                ..RequestOptions::default()
            })
            .await?;

        if let Some(path) = R::JOINED_PATH {
            match self
                .client
                .get::<Vec<R::Id>>(path, RequestOptions::default())
                .await
            {
                Ok(joined) => {
                    let joined: BTreeSet<R::Id> = joined.into_iter().collect();
                    for item in &mut page.items {
                        let id = item.id();
                        item.mark_joined(joined.contains(&id));
                    }
                }
                Err(e) => tracing::debug!("could not fetch joined {}: {e}", R::NAME),
            }
        }
        Ok(page)
    }

    /// Load again with the filter most recently asked for, which is the
    /// held page's filter unless a newer load is still in flight.
    pub async fn reload(&self) -> Result<LoadOutcome, FetchError> {
        let filter = self.inner().requested.clone();
        self.load(&filter).await
    }

    async fn send(&self, id: &R::Id, operation: &Operation) -> Result<Value, ClientError> {
        let body = operation.body()?;
        self.client
            .request(
                operation.method(),
                &operation.path::<R>(id),
                body,
                RequestOptions::default(),
            )
            .await
    }

    /// Bring the held row in line with a successful write. A response body
    /// that decodes as a full item wins over the local patch.
    fn patch_local(inner: &mut Inner<R>, id: &R::Id, operation: &Operation, response: Value) {
        let items = &mut inner.state.page.items;
        let Some(index) = items.iter().position(|item| &item.id() == id) else {
            return;
        };
        if matches!(operation, Operation::Delete) {
            items.remove(index);
            inner.state.page.count = inner.state.page.count.saturating_sub(1);
            return;
        }
        match serde_json::from_value::<R>(response) {
            Ok(updated) if &updated.id() == id => items[index] = updated,
            _ => items[index].apply(operation),
        }
    }

    fn check_supported(operation: &Operation) -> Result<(), FetchError> {
        if R::supports(operation) {
            Ok(())
        } else {
            Err(FetchError::Unsupported {
                operation: operation.name(),
                resource: R::NAME,
            })
        }
    }

    async fn reconcile(&self, reconcile: Reconcile) -> Option<LoadOutcome> {
        match reconcile {
            Reconcile::PatchInPlace => None,
            Reconcile::FullReload => self.reload().await.ok(),
        }
    }

    /// Perform one write, then patch the row or reload the page depending
    /// on whether the write can change what the active filter matches.
    pub async fn mutate(
        &self,
        id: &R::Id,
        operation: Operation,
    ) -> Result<MutationOutcome, FetchError> {
        Self::check_supported(&operation)?;

        let span = info_span!("artsclub.mutate", resource = R::NAME, op = operation.name(), %id);
        let response = match self.send(id, &operation).instrument(span.clone()).await {
            Ok(response) => response,
            Err(error) => {
                span.in_scope(|| tracing::warn!("{} failed: {error}", operation.name()));
                if !matches!(error, ClientError::Validation(_)) {
                    let mut inner = self.inner();
                    Self::record_error(
                        &mut inner,
                        &error,
                        &format!("Failed to {} item", operation.name()),
                    );
                }
                return Err(error.into());
            }
        };

        let reconcile = {
            let mut inner = self.inner();
            let reconcile = operation.reconcile(&inner.requested);
            Self::patch_local(&mut inner, id, &operation, response);
            reconcile
        };

        let reload = self.reconcile(reconcile).await;
        Ok(MutationOutcome { reconcile, reload })
    }

    /// Apply `operation` to every id independently. Failures are collected,
    /// never abort the others; a single reload follows if any write needs
    /// one.
    pub async fn mutate_bulk<I>(
        &self,
        ids: I,
        operation: Operation,
    ) -> Result<BulkOutcome<R::Id>, FetchError>
    where
        I: IntoIterator<Item = R::Id>,
    {
        Self::check_supported(&operation)?;
        // invalid input fails every item the same way; report it once
        operation.body()?;

        let ids: Vec<R::Id> = ids.into_iter().collect();
        let span = info_span!(
            "artsclub.mutate_bulk",
            resource = R::NAME,
            op = operation.name(),
            count = ids.len()
        );
        let results = join_all(ids.into_iter().map(|id| {
            let operation = &operation;
            async move {
                let result = self.send(&id, operation).await;
                (id, result)
            }
        }))
        .instrument(span.clone())
        .await;

        let mut outcome = BulkOutcome {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        let reconcile = {
            let mut inner = self.inner();
            for (id, result) in results {
                match result {
                    Ok(response) => {
                        Self::patch_local(&mut inner, &id, &operation, response);
                        outcome.succeeded.push(id);
                    }
                    Err(error) => outcome.failed.push((id, error)),
                }
            }
            operation.reconcile(&inner.requested)
        };

        if !outcome.succeeded.is_empty() {
            self.reconcile(reconcile).await;
        }

        let unauthenticated = outcome
            .failed
            .iter()
            .any(|(_, error)| error.is_unauthenticated());
        if !outcome.failed.is_empty() {
            span.in_scope(|| {
                tracing::warn!(
                    failed = outcome.failure_count(),
                    succeeded = outcome.success_count(),
                    "bulk operation partially failed"
                );
            });
        }
        // 401s belong to the client's handler; set after the reload, which
        // clears notices on success
        if !outcome.failed.is_empty() && !unauthenticated {
            self.inner().state.error = Some(Notice {
                message: format!(
                    "{} of {} {} operations failed",
                    outcome.failure_count(),
                    outcome.failure_count() + outcome.success_count(),
                    operation.name()
                ),
            });
        }
        Ok(outcome)
    }
}
