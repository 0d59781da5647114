use artsclub_client::{
    payloads::LoginRequest, require_role, ApiClient, ApiClientOptions, Artwork, AuthGuard,
    FileSessionStore, RequestOptions, Role,
};
use dotenvy::dotenv;
use futures::TryStreamExt;
use std::{env, sync::Arc};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let sessions = Arc::new(FileSessionStore::open(".artsclub-session.json").unwrap());
    let client = ApiClient::with_reqwest(ApiClientOptions::from_env(), sessions.clone())
        .unwrap()
        .on_unauthenticated(|| eprintln!("session expired, sign in again"));

    if let AuthGuard::RedirectToLogin = require_role(sessions.as_ref(), &[Role::Member, Role::Admin])
    {
        let credentials = LoginRequest {
            email: env::var("ARTSCLUB_EMAIL").expect("ARTSCLUB_EMAIL must be set"),
            password: env::var("ARTSCLUB_PASSWORD").expect("ARTSCLUB_PASSWORD must be set"),
        };
        let session = client.sign_in(&credentials).await.unwrap();
        println!("signed in as {} ({})", session.username, session.role);
    }

    let mut pages = client.paginate::<Artwork>(
        "/artwork/",
        RequestOptions::default().query("approval_status", "approved"),
    );
    while let Some(page) = pages.try_next().await.unwrap() {
        for artwork in &page.items {
            println!("#{} {} by {}", artwork.id, artwork.title, artwork.artist_name);
        }
    }
}
