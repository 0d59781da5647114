use artsclub_client::{
    payloads::{EventPayload, Payload},
    ApiClient, ApiClientOptions, ClientError, Event, MemorySessionStore, Method, Role, Session,
};
use chrono::{Duration, Utc};
use dotenvy::dotenv;
use std::{env, sync::Arc};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let sessions = Arc::new(MemorySessionStore::with_session(Session {
        token: env::var("ARTSCLUB_TOKEN").expect("ARTSCLUB_TOKEN must be set"),
        role: Role::Admin,
        username: "admin".to_string(),
    }));
    let client = ApiClient::with_reqwest(ApiClientOptions::from_env(), sessions).unwrap();

    let date = Utc::now() + Duration::days(14);
    let mut payload = EventPayload {
        title: "Open Studio Night".to_string(),
        description: "Members show work in progress.".to_string(),
        location: "Hall B".to_string(),
        date,
        capacity: Some(0),
        registration_deadline: Some(date + Duration::days(1)),
    };

    // rejected locally, nothing is sent
    if let Err(ClientError::Validation(error)) = payload.check() {
        for field in &error.fields {
            println!("{}: {}", field.field, field.message);
        }
    }

    payload.capacity = Some(40);
    payload.registration_deadline = Some(date - Duration::days(2));
    match client
        .submit::<_, Event>(Method::POST, "/events/", &payload)
        .await
    {
        Ok(event) => println!("created event #{}: {}", event.id, event.title),
        Err(error) => println!("{}", error.user_message("Failed to create event")),
    }
}
