mod common;

use artsclub_client::{
    client_test::{MockReply, MockTransport},
    ApprovalStatus, Artwork, ClientError, Event, Role, User,
};
use artsclub_resources::{
    list_view::APPROVALS_PAGE_SIZE, FetchError, Fetcher, FetcherOptions, FilterState, ListView,
    LoadOutcome, Operation, Paging, Reconcile, ResponseOrdering, SearchMode,
};
use common::{artwork, envelope, user_json, ArtworkServer};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tokio_util::sync::CancellationToken;

fn ids<R: artsclub_resources::Resource>(items: &[R]) -> Vec<R::Id> {
    items.iter().map(artsclub_resources::Resource::id).collect()
}

fn pending() -> FilterState {
    FilterState::default().with_status("pending")
}

fn artwork_page(items: &[Artwork]) -> serde_json::Value {
    envelope(
        items
            .iter()
            .map(|a| serde_json::to_value(a).unwrap())
            .collect(),
        items.len(),
        None,
    )
}

#[tokio::test]
async fn stale_response_is_discarded_when_latest_request_wins() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));

    let gate =
        transport.enqueue_gated(artwork_page(&[artwork(1, ApprovalStatus::Pending)]));
    transport.enqueue(artwork_page(&[artwork(2, ApprovalStatus::Approved)]));

    let approved = FilterState::default().with_status("approved");
    let filter = pending();
    let (first, second) = tokio::join!(fetcher.load(&filter), async {
        let outcome = fetcher.load(&approved).await;
        gate.open();
        outcome
    });

    assert_eq!(first.unwrap(), LoadOutcome::Superseded);
    assert_eq!(second.unwrap(), LoadOutcome::Applied);

    let state = fetcher.snapshot();
    assert_eq!(ids(&state.page.items), vec![2]);
    assert_eq!(state.filter, approved);
    assert!(!state.loading);
}

#[tokio::test]
async fn arrival_order_lets_the_slower_response_win() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::with_options(
        common::client(&transport),
        FetcherOptions {
            ordering: ResponseOrdering::ArrivalOrder,
            ..FetcherOptions::default()
        },
    );

    let gate =
        transport.enqueue_gated(artwork_page(&[artwork(1, ApprovalStatus::Pending)]));
    transport.enqueue(artwork_page(&[artwork(2, ApprovalStatus::Approved)]));

    let approved = FilterState::default().with_status("approved");
    let filter = pending();
    let (first, second) = tokio::join!(fetcher.load(&filter), async {
        let outcome = fetcher.load(&approved).await;
        assert!(fetcher.is_loading(), "first load is still in flight");
        gate.open();
        outcome
    });

    assert_eq!(first.unwrap(), LoadOutcome::Applied);
    assert_eq!(second.unwrap(), LoadOutcome::Applied);
    // never a mix of both filters
    assert_eq!(ids(&fetcher.items()), vec![1]);
    assert_eq!(fetcher.snapshot().filter, pending());
    assert!(!fetcher.is_loading());
}

#[tokio::test]
async fn failed_reload_keeps_previous_page_with_notice() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));

    transport.enqueue(artwork_page(&[
        artwork(1, ApprovalStatus::Pending),
        artwork(2, ApprovalStatus::Pending),
    ]));
    transport.enqueue(MockReply::json(500, &json!({ "error": "Database unavailable" })));

    fetcher.load(&pending()).await.unwrap();
    let err = fetcher.load(&pending().with_page(2)).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Client(ClientError::Http { status: 500, .. })
    ));

    let state = fetcher.snapshot();
    assert_eq!(ids(&state.page.items), vec![1, 2]);
    assert_eq!(state.filter.page, 1);
    assert_eq!(state.error.unwrap().message, "Database unavailable");
    assert!(!fetcher.snapshot().is_blank_error());
    assert!(!state.loading);

    fetcher.dismiss_error();
    assert!(fetcher.error().is_none());
}

#[tokio::test]
async fn first_load_failure_shows_only_the_error() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    transport.enqueue(MockReply::network_error("connection refused"));

    let err = fetcher.load(&FilterState::default()).await.unwrap_err();
    assert!(matches!(err, FetchError::Client(ClientError::Network(_))));

    let state = fetcher.snapshot();
    assert!(state.is_blank_error());
    assert_eq!(
        state.error.unwrap().message,
        "Failed to load artworks: the server could not be reached"
    );
}

#[tokio::test]
async fn unauthenticated_load_defers_to_global_handler() {
    let transport = Arc::new(MockTransport::new());
    let fired = Arc::new(AtomicUsize::new(0));
    let client = {
        let fired = fired.clone();
        let client = Arc::try_unwrap(common::client(&transport))
            .ok()
            .expect("sole owner")
            .on_unauthenticated(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        Arc::new(client)
    };
    let fetcher = Fetcher::<Artwork>::new(client.clone());
    transport.enqueue(MockReply::status(401));

    let err = fetcher.load(&FilterState::default()).await.unwrap_err();
    assert!(err.is_unauthenticated());
    assert!(fetcher.error().is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(client.session().is_none());
}

#[tokio::test]
async fn approving_reloads_and_removes_item_from_pending_view() {
    let transport = Arc::new(MockTransport::new());
    let server = ArtworkServer::with_pending(3);
    server.install(&transport);
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));

    fetcher.load(&pending()).await.unwrap();
    assert_eq!(ids(&fetcher.items()), vec![1, 2, 3]);

    let outcome = fetcher.mutate(&2, Operation::Approve).await.unwrap();
    assert_eq!(outcome.reconcile, Reconcile::FullReload);
    assert_eq!(outcome.reload, Some(LoadOutcome::Applied));

    let state = fetcher.snapshot();
    assert_eq!(ids(&state.page.items), vec![1, 3]);
    assert_eq!(state.page.count, 2);

    let requests = transport.tracked_requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].method.as_str(), "PATCH");
    assert!(requests[1].url.ends_with("/artwork/2/approve/"));
    assert_eq!(
        requests[2].query_param("approval_status").as_deref(),
        Some("pending")
    );
    assert_eq!(
        server.get(2).unwrap().approval_status,
        ApprovalStatus::Approved
    );
}

#[tokio::test]
async fn approving_twice_leaves_the_same_state() {
    let transport = Arc::new(MockTransport::new());
    let server = ArtworkServer::with_pending(2);
    server.install(&transport);
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    fetcher.load(&pending()).await.unwrap();

    fetcher.mutate(&1, Operation::Approve).await.unwrap();
    let once = fetcher.snapshot();
    fetcher.mutate(&1, Operation::Approve).await.unwrap();
    let twice = fetcher.snapshot();

    assert_eq!(once, twice);
    assert_eq!(ids(&twice.page.items), vec![2]);
}

#[tokio::test]
async fn like_patches_in_place_from_response() {
    let transport = Arc::new(MockTransport::new());
    let server = ArtworkServer::with_pending(2);
    server.install(&transport);
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    fetcher.load(&FilterState::default()).await.unwrap();

    let outcome = fetcher.mutate(&2, Operation::Like).await.unwrap();
    assert_eq!(outcome.reconcile, Reconcile::PatchInPlace);
    assert_eq!(outcome.reload, None);
    assert_eq!(transport.request_count(), 2);

    let items = fetcher.items();
    assert_eq!(items[1].likes, 1);
    assert_eq!(items[0].likes, 0);
}

#[tokio::test]
async fn failed_write_records_notice_and_keeps_rows() {
    let transport = Arc::new(MockTransport::new());
    let server = ArtworkServer::with_pending(2);
    server.fail_writes_for(1);
    server.install(&transport);
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    fetcher.load(&pending()).await.unwrap();

    let err = fetcher.mutate(&1, Operation::Approve).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Client(ClientError::Http { status: 500, .. })
    ));
    assert_eq!(fetcher.error().unwrap().message, "Could not update artwork");
    assert_eq!(ids(&fetcher.items()), vec![1, 2]);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn role_update_patches_member_in_place() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<User>::new(common::client(&transport));

    transport.enqueue(envelope(
        vec![user_json(1, "member", true), user_json(2, "member", true)],
        2,
        None,
    ));
    transport.enqueue(user_json(1, "manager", true));

    fetcher.load(&FilterState::default()).await.unwrap();
    let outcome = fetcher
        .mutate(&1, Operation::UpdateRole(Role::Manager))
        .await
        .unwrap();

    assert_eq!(outcome.reconcile, Reconcile::PatchInPlace);
    assert_eq!(transport.request_count(), 2);
    let request = &transport.tracked_requests()[1];
    assert!(request.url.ends_with("/users/1/update-role/"));
    assert_eq!(
        request.body,
        artsclub_client::transport::RequestBody::Json(json!({ "role": "manager" }))
    );

    let users = fetcher.items();
    assert_eq!(users[0].role, Role::Manager);
    assert_eq!(users[1].role, Role::Member);
}

#[tokio::test]
async fn deactivating_under_status_filter_reloads() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<User>::new(common::client(&transport));
    let active = FilterState::default().with_status("true");

    transport.enqueue(envelope(
        vec![user_json(1, "member", true), user_json(2, "admin", true)],
        2,
        None,
    ));
    transport.enqueue(json!({ "detail": "User deactivated" }));
    transport.enqueue(envelope(vec![user_json(2, "admin", true)], 1, None));

    fetcher.load(&active).await.unwrap();
    let outcome = fetcher.mutate(&1, Operation::Deactivate).await.unwrap();

    assert_eq!(outcome.reconcile, Reconcile::FullReload);
    assert_eq!(ids(&fetcher.items()), vec![2]);
    let requests = transport.tracked_requests();
    assert_eq!(requests[2].query_param("is_active").as_deref(), Some("true"));
}

#[tokio::test]
async fn deactivating_without_filter_patches_locally() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<User>::new(common::client(&transport));

    transport.enqueue(envelope(vec![user_json(1, "member", true)], 1, None));
    transport.enqueue(json!({ "detail": "User deactivated" }));

    fetcher.load(&FilterState::default()).await.unwrap();
    let outcome = fetcher.mutate(&1, Operation::Deactivate).await.unwrap();

    assert_eq!(outcome.reconcile, Reconcile::PatchInPlace);
    assert!(!fetcher.items()[0].is_active);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn bulk_reject_reports_partial_failure() {
    let transport = Arc::new(MockTransport::new());
    let server = ArtworkServer::with_pending(3);
    server.fail_writes_for(2);
    server.install(&transport);
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    fetcher.load(&pending()).await.unwrap();

    let outcome = fetcher
        .mutate_bulk(
            vec![1, 2, 3],
            Operation::Reject {
                feedback: "Low resolution".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, vec![1, 3]);
    assert_eq!(outcome.failure_count(), 1);
    assert_eq!(outcome.failed[0].0, 2);

    // one reload after the batch; only the failed item is still pending
    assert_eq!(transport.request_count(), 5);
    assert_eq!(ids(&fetcher.items()), vec![2]);
    assert_eq!(
        fetcher.error().unwrap().message,
        "1 of 3 reject operations failed"
    );
    assert_eq!(
        server.get(1).unwrap().feedback.as_deref(),
        Some("Low resolution")
    );
}

#[tokio::test]
async fn bulk_with_blank_feedback_sends_nothing() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));

    let err = fetcher
        .mutate_bulk(
            vec![1, 2],
            Operation::Reject {
                feedback: "   ".to_string(),
            },
        )
        .await
        .unwrap_err();

    match err {
        FetchError::Client(ClientError::Validation(validation)) => {
            assert!(validation.for_field("feedback").is_some());
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn unsupported_operation_is_refused_locally() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<User>::new(common::client(&transport));

    let err = fetcher.mutate(&1, Operation::Approve).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Unsupported {
            operation: "approve",
            resource: "members"
        }
    ));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn twenty_five_pending_artworks_page_by_ten() {
    let transport = Arc::new(MockTransport::new());
    ArtworkServer::with_pending(25).install(&transport);
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    let view = fetcher.list_view(APPROVALS_PAGE_SIZE);
    assert_eq!(view, ListView::new(APPROVALS_PAGE_SIZE));

    let filter = pending();
    fetcher.load(&filter).await.unwrap();
    let first = view.render(&fetcher.snapshot().page, &filter);
    assert_eq!(first.visible_ids(), (1..=10).collect::<Vec<_>>());
    assert!(first.has_next);
    assert!(!first.has_previous);
    assert_eq!(first.total_items, 25);
    assert_eq!(first.window, vec![1, 2, 3]);

    let filter = filter.with_page(3);
    fetcher.load(&filter).await.unwrap();
    let third = view.render(&fetcher.snapshot().page, &filter);
    assert_eq!(third.visible_ids(), (21..=25).collect::<Vec<_>>());
    assert!(!third.has_next);
    assert!(third.has_previous);
    assert_eq!(third.page, 3);
}

#[tokio::test]
async fn cancelled_load_leaves_state_untouched() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    let _gate = transport.enqueue_gated(artwork_page(&[artwork(1, ApprovalStatus::Pending)]));
    let cancel = CancellationToken::new();

    let filter = pending();
    let (result, ()) = tokio::join!(fetcher.load_with_cancel(&filter, &cancel), async {
        cancel.cancel();
    });

    assert!(matches!(result, Err(FetchError::Cancelled)));
    let state = fetcher.snapshot();
    assert!(state.page.items.is_empty());
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn cancel_pending_discards_in_flight_response() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    let gate = transport.enqueue_gated(artwork_page(&[artwork(1, ApprovalStatus::Pending)]));

    let filter = pending();
    let (result, ()) = tokio::join!(fetcher.load(&filter), async {
        fetcher.cancel_pending();
        gate.open();
    });

    assert_eq!(result.unwrap(), LoadOutcome::Superseded);
    assert!(fetcher.items().is_empty());
    assert!(!fetcher.is_loading());
}

#[tokio::test]
async fn reload_after_write_follows_newer_navigation() {
    let transport = Arc::new(MockTransport::new());
    let server = ArtworkServer::with_pending(3);
    server.install(&transport);
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    fetcher.load(&pending()).await.unwrap();

    // the approved page answers late, with what the server held before the approval
    let gate = transport.enqueue_gated(artwork_page(&[]));
    let approved = FilterState::default().with_status("approved");
    let (navigation, mutation) = tokio::join!(fetcher.load(&approved), async {
        let outcome = fetcher.mutate(&1, Operation::Approve).await;
        gate.open();
        outcome
    });

    assert_eq!(navigation.unwrap(), LoadOutcome::Superseded);
    assert_eq!(mutation.unwrap().reload, Some(LoadOutcome::Applied));

    let state = fetcher.snapshot();
    assert_eq!(state.filter, approved);
    assert_eq!(ids(&state.page.items), vec![1]);
    assert!(!state.loading);

    let requests = transport.tracked_requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(
        requests[3].query_param("approval_status").as_deref(),
        Some("approved")
    );
}

#[tokio::test]
async fn failed_navigation_does_not_redirect_later_reloads() {
    let transport = Arc::new(MockTransport::new());
    let server = ArtworkServer::with_pending(3);
    server.install(&transport);
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    fetcher.load(&pending()).await.unwrap();

    transport.enqueue(MockReply::network_error("connection reset"));
    let approved = FilterState::default().with_status("approved");
    assert!(fetcher.load(&approved).await.is_err());

    fetcher.mutate(&2, Operation::Approve).await.unwrap();
    let state = fetcher.snapshot();
    assert_eq!(state.filter, pending());
    assert_eq!(ids(&state.page.items), vec![1, 3]);
}

#[tokio::test]
async fn bulk_unauthorized_leaves_notice_to_session_handler() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::new(common::client(&transport));
    transport.enqueue(artwork_page(&[
        artwork(1, ApprovalStatus::Pending),
        artwork(2, ApprovalStatus::Pending),
    ]));
    fetcher.load(&pending()).await.unwrap();

    transport
        .enqueue(MockReply::status(401))
        .enqueue(MockReply::status(401));
    let outcome = fetcher
        .mutate_bulk(vec![1, 2], Operation::Approve)
        .await
        .unwrap();

    assert_eq!(outcome.failure_count(), 2);
    assert!(outcome
        .failed
        .iter()
        .all(|(_, error)| error.is_unauthenticated()));
    assert!(fetcher.error().is_none());
    assert_eq!(ids(&fetcher.items()), vec![1, 2]);
    // nothing succeeded, so no reload
    assert_eq!(transport.request_count(), 3);
}

fn event_json(id: i64) -> serde_json::Value {
    json!({ "id": id, "title": format!("Open Studio {id}"), "location": "Hall B" })
}

#[tokio::test]
async fn registration_survives_reload() {
    let transport = Arc::new(MockTransport::new());
    let registrations = Arc::new(Mutex::new(vec![1_i64]));
    let joined = registrations.clone();
    transport.set_handler(move |request| {
        let path = request
            .path()
            .strip_prefix(common::BASE_URL)
            .unwrap_or(request.path());
        match (request.method.as_str(), path) {
            ("GET", "/events/") => MockReply::ok(&envelope(
                vec![event_json(1), event_json(2), event_json(3)],
                3,
                None,
            )),
            ("GET", "/events/my_registrations/") => {
                MockReply::ok(&json!(joined.lock().unwrap().clone()))
            }
            ("POST", "/events/2/register/") => {
                joined.lock().unwrap().push(2);
                MockReply::ok(&json!({ "message": "Registered successfully" }))
            }
            _ => MockReply::status(404),
        }
    });
    let fetcher = Fetcher::<Event>::new(common::client(&transport));

    fetcher.load(&FilterState::default()).await.unwrap();
    let registered = |events: Vec<Event>| -> Vec<bool> {
        events.iter().map(|event| event.is_registered).collect()
    };
    assert_eq!(registered(fetcher.items()), vec![true, false, false]);

    let outcome = fetcher.mutate(&2, Operation::Register).await.unwrap();
    assert_eq!(outcome.reconcile, Reconcile::PatchInPlace);
    assert_eq!(registered(fetcher.items()), vec![true, true, false]);

    fetcher.reload().await.unwrap();
    assert_eq!(registered(fetcher.items()), vec![true, true, false]);
    assert_eq!(registrations.lock().unwrap().clone(), vec![1, 2]);
}

#[tokio::test]
async fn events_load_without_registrations_when_lookup_fails() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Event>::new(common::client(&transport));
    transport
        .enqueue(envelope(vec![event_json(1)], 1, None))
        .enqueue(MockReply::json(500, &json!({ "error": "Could not fetch registrations" })));

    assert_eq!(
        fetcher.load(&FilterState::default()).await.unwrap(),
        LoadOutcome::Applied
    );
    assert!(!fetcher.items()[0].is_registered);
    assert!(fetcher.error().is_none());
}

#[tokio::test]
async fn client_side_fetcher_yields_matching_view() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::with_options(
        common::client(&transport),
        FetcherOptions::client_side(),
    );
    let view = fetcher.list_view(APPROVALS_PAGE_SIZE);
    assert_eq!(view.paging, Paging::Client);
    assert_eq!(view.search_mode(), SearchMode::ClientOnly);

    let mut sunset = artwork(2, ApprovalStatus::Pending);
    sunset.title = "Sunset over Entoto".to_string();
    transport.enqueue(artwork_page(&[artwork(1, ApprovalStatus::Pending), sunset]));

    let filter = FilterState::default().with_search("sunset");
    fetcher.load(&filter).await.unwrap();
    assert_eq!(transport.tracked_requests()[0].query_param("search"), None);

    let rendered = view.render(&fetcher.snapshot().page, &filter);
    assert_eq!(rendered.visible_ids(), vec![2]);
    assert_eq!(rendered.total_items, 1);
}

#[tokio::test]
async fn cancelling_one_arrival_order_load_keeps_the_other_loading() {
    let transport = Arc::new(MockTransport::new());
    let fetcher = Fetcher::<Artwork>::with_options(
        common::client(&transport),
        FetcherOptions {
            ordering: ResponseOrdering::ArrivalOrder,
            ..FetcherOptions::default()
        },
    );
    let gate = transport.enqueue_gated(artwork_page(&[artwork(1, ApprovalStatus::Pending)]));
    let _held = transport.enqueue_gated(artwork_page(&[artwork(2, ApprovalStatus::Approved)]));
    let cancel = CancellationToken::new();

    let filter = pending();
    let approved = FilterState::default().with_status("approved");
    let (first, (second, loading_after_cancel)) = tokio::join!(fetcher.load(&filter), async {
        let (second, ()) = tokio::join!(fetcher.load_with_cancel(&approved, &cancel), async {
            cancel.cancel();
        });
        let loading = fetcher.is_loading();
        gate.open();
        (second, loading)
    });

    assert!(matches!(second, Err(FetchError::Cancelled)));
    assert!(loading_after_cancel, "first load is still in flight");
    assert_eq!(first.unwrap(), LoadOutcome::Applied);
    assert_eq!(ids(&fetcher.items()), vec![1]);
    assert!(!fetcher.is_loading());
}
