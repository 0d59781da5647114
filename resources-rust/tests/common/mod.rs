#![allow(dead_code)]

use artsclub_client::{
    client_test::{MockReply, MockTransport},
    transport::{HttpRequest, RequestBody},
    ApiClient, ApiClientOptions, ApprovalStatus, Artwork, MemorySessionStore, Role, Session,
};
use serde_json::{json, Value};
use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

pub const BASE_URL: &str = "http://api.test/api";
pub const SERVER_PAGE_SIZE: usize = 10;

pub fn admin_session() -> Session {
    Session {
        token: "admin-token".to_string(),
        role: Role::Admin,
        username: "sara".to_string(),
    }
}

pub fn client(transport: &Arc<MockTransport>) -> Arc<ApiClient> {
    Arc::new(
        ApiClient::new(
            ApiClientOptions {
                base_url: BASE_URL.to_string(),
                ..ApiClientOptions::default()
            },
            transport.clone(),
            Arc::new(MemorySessionStore::with_session(admin_session())),
        )
        .expect("client should build"),
    )
}

pub fn artwork(id: i64, status: ApprovalStatus) -> Artwork {
    Artwork {
        id,
        title: format!("Artwork {id:02}"),
        description: String::new(),
        category: "painting".to_string(),
        image: None,
        artist_name: "Liya Tesfaye".to_string(),
        approval_status: status,
        feedback: None,
        likes: 0,
        submission_date: None,
    }
}

pub fn user_json(pk: i64, role: &str, is_active: bool) -> Value {
    json!({
        "pk": pk,
        "first_name": format!("User{pk}"),
        "last_name": "Bekele",
        "email": format!("user{pk}@artsclub.test"),
        "role": role,
        "is_active": is_active,
    })
}

/// Wrap items in the paginated envelope.
pub fn envelope(results: Vec<Value>, count: usize, next: Option<&str>) -> Value {
    json!({
        "count": count,
        "next": next,
        "previous": null,
        "results": results,
    })
}

/// A small in-memory stand-in for the artwork endpoints: paginated,
/// filterable list plus the review actions. Ids in `failing` answer every
/// write with a 500.
#[derive(Default)]
pub struct ArtworkServer {
    artworks: Mutex<Vec<Artwork>>,
    failing: Mutex<BTreeSet<i64>>,
}

impl ArtworkServer {
    pub fn with_pending(count: i64) -> Arc<Self> {
        let server = Self::default();
        *server.artworks.lock().unwrap() = (1..=count)
            .map(|id| artwork(id, ApprovalStatus::Pending))
            .collect();
        Arc::new(server)
    }

    pub fn fail_writes_for(&self, id: i64) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn get(&self, id: i64) -> Option<Artwork> {
        self.artworks
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn install(self: &Arc<Self>, transport: &MockTransport) {
        let server = self.clone();
        transport.set_handler(move |request| server.handle(request));
    }

    fn handle(&self, request: &HttpRequest) -> MockReply {
        let path = request
            .path()
            .strip_prefix(BASE_URL)
            .unwrap_or(request.path());
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["artwork"]) => self.list(request),
            ("PATCH", ["artwork", id, action]) => {
                let Ok(id) = id.parse::<i64>() else {
                    return not_found();
                };
                self.review(id, action, &request.body)
            }
            ("POST", ["artwork", id, "like"]) => {
                let Ok(id) = id.parse::<i64>() else {
                    return not_found();
                };
                self.write(id, |artwork| artwork.likes += 1)
            }
            ("DELETE", ["artwork", id]) => {
                let Ok(id) = id.parse::<i64>() else {
                    return not_found();
                };
                let mut artworks = self.artworks.lock().unwrap();
                let before = artworks.len();
                artworks.retain(|a| a.id != id);
                if artworks.len() == before {
                    not_found()
                } else {
                    MockReply::status(204)
                }
            }
            _ => not_found(),
        }
    }

    fn list(&self, request: &HttpRequest) -> MockReply {
        let status = request.query_param("approval_status");
        let search = request.query_param("search").map(|s| s.to_lowercase());
        let page: usize = request
            .query_param("page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1);

        let matching: Vec<Artwork> = self
            .artworks
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                status
                    .as_deref()
                    .map_or(true, |status| a.approval_status.as_str() == status)
            })
            .filter(|a| {
                search
                    .as_deref()
                    .map_or(true, |term| a.title.to_lowercase().contains(term))
            })
            .cloned()
            .collect();

        if page == 0 || (page > 1 && (page - 1) * SERVER_PAGE_SIZE >= matching.len()) {
            return MockReply::json(404, &json!({ "detail": "Invalid page." }));
        }
        let start = (page - 1) * SERVER_PAGE_SIZE;
        let end = (start + SERVER_PAGE_SIZE).min(matching.len());
        let results: Vec<Value> = matching[start..end]
            .iter()
            .map(|a| serde_json::to_value(a).unwrap())
            .collect();

        MockReply::ok(&json!({
            "count": matching.len(),
            "next": (end < matching.len())
                .then(|| format!("{BASE_URL}/artwork/?page={}", page + 1)),
            "previous": (page > 1)
                .then(|| format!("{BASE_URL}/artwork/?page={}", page - 1)),
            "results": results,
        }))
    }

    fn review(&self, id: i64, action: &str, body: &RequestBody) -> MockReply {
        match action {
            "approve" => self.write(id, |artwork| {
                artwork.approval_status = ApprovalStatus::Approved;
                artwork.feedback = None;
            }),
            "reject" => {
                let feedback = match body {
                    RequestBody::Json(value) => value
                        .get("feedback")
                        .and_then(Value::as_str)
                        .map(ToString::to_string),
                    _ => None,
                };
                let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) else {
                    return MockReply::json(400, &json!({ "error": "Feedback is required" }));
                };
                self.write(id, |artwork| {
                    artwork.approval_status = ApprovalStatus::Rejected;
                    artwork.feedback = Some(feedback.clone());
                })
            }
            _ => not_found(),
        }
    }

    fn write(&self, id: i64, change: impl FnOnce(&mut Artwork)) -> MockReply {
        if self.failing.lock().unwrap().contains(&id) {
            return MockReply::json(500, &json!({ "error": "Could not update artwork" }));
        }
        let mut artworks = self.artworks.lock().unwrap();
        let Some(artwork) = artworks.iter_mut().find(|a| a.id == id) else {
            return not_found();
        };
        change(artwork);
        MockReply::ok(&serde_json::to_value(&*artwork).unwrap())
    }
}

fn not_found() -> MockReply {
    MockReply::json(404, &json!({ "detail": "Not found." }))
}
