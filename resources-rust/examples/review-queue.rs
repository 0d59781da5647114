use artsclub_client::{
    ApiClient, ApiClientOptions, Artwork, MemorySessionStore, Role, Session,
};
use artsclub_resources::{
    list_view::APPROVALS_PAGE_SIZE, Fetcher, FilterState, Operation, Selection,
};
use dotenvy::dotenv;
use std::{env, sync::Arc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let sessions = Arc::new(MemorySessionStore::with_session(Session {
        token: env::var("ARTSCLUB_TOKEN").expect("ARTSCLUB_TOKEN must be set"),
        role: Role::Admin,
        username: "admin".to_string(),
    }));
    let client = Arc::new(
        ApiClient::with_reqwest(ApiClientOptions::from_env(), sessions)
            .unwrap()
            .on_unauthenticated(|| eprintln!("session expired, sign in again")),
    );

    let fetcher = Fetcher::<Artwork>::new(client);
    let view = fetcher.list_view(APPROVALS_PAGE_SIZE);
    let mut filter = FilterState::default().with_status("pending");
    filter.toggle_sort("submission_date");

    fetcher.load(&filter).await.unwrap();
    let page = view.render(&fetcher.snapshot().page, &filter);
    println!(
        "page {} of {} ({} pending), pages {:?}",
        page.page, page.total_pages, page.total_items, page.window
    );
    for artwork in &page.rows {
        println!("  #{} {} by {}", artwork.id, artwork.title, artwork.artist_name);
    }

    let mut selection = Selection::new();
    selection.select_all(&page.visible_ids());
    if selection.is_empty() {
        return;
    }

    let outcome = fetcher
        .mutate_bulk(selection.ids(), Operation::Approve)
        .await
        .unwrap();
    println!(
        "approved {}, failed {}",
        outcome.success_count(),
        outcome.failure_count()
    );
    if let Some(notice) = fetcher.error() {
        println!("{notice}");
    }
    println!("{} still pending", fetcher.snapshot().page.count);
}
