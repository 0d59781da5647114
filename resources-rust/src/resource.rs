use crate::FilterState;
use artsclub_client::{
    payloads::{Payload, RejectPayload, RoleUpdate},
    transport::RequestBody,
    ApprovalStatus, Artwork, ClientError, ClientResult, Event, Method, Notification, Project,
    Role, User, MY_REGISTRATIONS_PATH,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{cmp::Ordering, fmt::Display, hash::Hash};

/// A typed value of one display field, used for search and sort.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

impl FieldValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Number(_) => 1,
            Self::Date(_) => 2,
            Self::Text(_) => 3,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Total order used by the table. Text compares case-insensitively with
    /// the raw string as tie-breaker.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn text(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(value.to_string()))
}

/// How local state catches up after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Update the matching row in the held page.
    PatchInPlace,
    /// The write may have moved the item in or out of the active filter;
    /// fetch the page again.
    FullReload,
}

/// A write on a single item. Each maps to an action-suffixed endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Approve,
    Reject { feedback: String },
    Like,
    Register,
    Unregister,
    UpdateRole(Role),
    Activate,
    Deactivate,
    /// Partial update with an already validated payload.
    Update(Value),
    Delete,
}

impl Operation {
    /// Build an [`Operation::Update`] from a typed form payload, validating
    /// it first.
    pub fn update<P: Payload + Serialize>(payload: &P) -> ClientResult<Self> {
        payload.check()?;
        serde_json::to_value(payload)
            .map(Self::Update)
            .map_err(|e| ClientError::Invariant(format!("Failed to encode payload: {e}")))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
            Self::Like => "like",
            Self::Register => "register",
            Self::Unregister => "unregister",
            Self::UpdateRole(_) => "update-role",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Update(_) => "update",
            Self::Delete => "delete",
        }
    }

    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::Like | Self::Register | Self::Unregister => Method::POST,
            Self::Delete => Method::DELETE,
            Self::Approve
            | Self::Reject { .. }
            | Self::UpdateRole(_)
            | Self::Activate
            | Self::Deactivate
            | Self::Update(_) => Method::PATCH,
        }
    }

    #[must_use]
    pub fn path<R: Resource>(&self, id: &R::Id) -> String {
        let base = R::PATH.trim_end_matches('/');
        match self {
            Self::Update(_) | Self::Delete => format!("{base}/{id}/"),
            _ => format!("{base}/{id}/{}/", self.name()),
        }
    }

    pub fn body(&self) -> ClientResult<RequestBody> {
        let body = match self {
            Self::Reject { feedback } => {
                let payload = RejectPayload {
                    feedback: feedback.clone(),
                };
                payload.check()?;
                serde_json::to_value(payload)
            }
            Self::UpdateRole(role) => serde_json::to_value(RoleUpdate { role: *role }),
            Self::Update(value) => return Ok(RequestBody::Json(value.clone())),
            Self::Register | Self::Unregister | Self::Like => {
                return Ok(RequestBody::Json(Value::Object(serde_json::Map::new())))
            }
            Self::Approve | Self::Activate | Self::Deactivate | Self::Delete => {
                return Ok(RequestBody::Empty)
            }
        };
        body.map(RequestBody::Json)
            .map_err(|e| ClientError::Invariant(format!("Failed to encode body: {e}")))
    }

    /// Patch in place unless the write can change membership of the page
    /// under `filter`.
    #[must_use]
    pub fn reconcile(&self, filter: &FilterState) -> Reconcile {
        match self {
            Self::Approve | Self::Reject { .. } | Self::Delete => Reconcile::FullReload,
            Self::Activate | Self::Deactivate if filter.status.is_some() => Reconcile::FullReload,
            Self::UpdateRole(_) if filter.category.is_some() => Reconcile::FullReload,
            _ => Reconcile::PatchInPlace,
        }
    }
}

/// A server-owned entity exposed as a REST collection.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Ord + Hash + Display + DeserializeOwned + Send + Sync + 'static;

    /// Collection path relative to the API base, e.g. `/artwork/`.
    const PATH: &'static str;
    /// Human name used in messages.
    const NAME: &'static str;
    /// Query key the status filter maps to, if the server supports one.
    const STATUS_PARAM: Option<&'static str> = None;
    const CATEGORY_PARAM: Option<&'static str> = None;
    /// Fields matched by the search box.
    const SEARCH_FIELDS: &'static [&'static str];
    /// Endpoint returning the ids of the items the signed-in user has
    /// joined. When set, every loaded page is marked from it.
    const JOINED_PATH: Option<&'static str> = None;

    fn id(&self) -> Self::Id;

    fn field(&self, key: &str) -> Option<FieldValue>;

    fn supports(operation: &Operation) -> bool;

    /// Mirror a successful write locally.
    fn apply(&mut self, operation: &Operation);

    fn mark_joined(&mut self, _joined: bool) {}
}

/// Merge a JSON object onto an item through its serialized form. Unknown
/// keys and values of the wrong type leave the item untouched.
pub fn merge_update<R: Resource>(item: &mut R, patch: &Value) {
    let (Ok(Value::Object(mut current)), Value::Object(patch)) = (serde_json::to_value(&*item), patch)
    else {
        return;
    };
    for (key, value) in patch {
        current.insert(key.clone(), value.clone());
    }
    match serde_json::from_value::<R>(Value::Object(current)) {
        Ok(updated) => *item = updated,
        Err(e) => tracing::debug!("ignoring update that does not fit {}: {e}", R::NAME),
    }
}

impl Resource for Artwork {
    type Id = i64;

    const PATH: &'static str = "/artwork/";
    const NAME: &'static str = "artworks";
    const STATUS_PARAM: Option<&'static str> = Some("approval_status");
    const CATEGORY_PARAM: Option<&'static str> = Some("category");
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "artist_name", "category"];

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "title" => text(&self.title),
            "description" => text(&self.description),
            "category" => text(&self.category),
            "artist_name" => text(&self.artist_name),
            "approval_status" => text(self.approval_status.as_str()),
            "likes" => Some(FieldValue::Number(f64::from(self.likes))),
            "submission_date" => self.submission_date.map(FieldValue::Date),
            _ => None,
        }
    }

    fn supports(operation: &Operation) -> bool {
        matches!(
            operation,
            Operation::Approve
                | Operation::Reject { .. }
                | Operation::Like
                | Operation::Update(_)
                | Operation::Delete
        )
    }

    fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::Approve => {
                self.approval_status = ApprovalStatus::Approved;
                self.feedback = None;
            }
            Operation::Reject { feedback } => {
                self.approval_status = ApprovalStatus::Rejected;
                self.feedback = Some(feedback.clone());
            }
            Operation::Like => self.likes = self.likes.saturating_add(1),
            Operation::Update(patch) => merge_update(self, patch),
            _ => {}
        }
    }
}

impl Resource for Event {
    type Id = i64;

    const PATH: &'static str = "/events/";
    const NAME: &'static str = "events";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "location", "description"];
    const JOINED_PATH: Option<&'static str> = Some(MY_REGISTRATIONS_PATH);

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "title" => text(&self.title),
            "description" => text(&self.description),
            "location" => text(&self.location),
            "date" => self.date.map(FieldValue::Date),
            "attendees" => Some(FieldValue::Number(self.attendees.len() as f64)),
            "is_completed" => Some(FieldValue::Bool(self.is_completed)),
            _ => None,
        }
    }

    fn supports(operation: &Operation) -> bool {
        matches!(
            operation,
            Operation::Register | Operation::Unregister | Operation::Update(_) | Operation::Delete
        )
    }

    fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::Register => self.is_registered = true,
            Operation::Unregister => self.is_registered = false,
            Operation::Update(patch) => merge_update(self, patch),
            _ => {}
        }
    }

    fn mark_joined(&mut self, joined: bool) {
        self.is_registered = joined;
    }
}

impl Resource for Project {
    type Id = i64;

    const PATH: &'static str = "/projects/";
    const NAME: &'static str = "projects";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "description"];

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "title" => text(&self.title),
            "description" => text(&self.description),
            "progress" => Some(FieldValue::Number(f64::from(self.progress))),
            "members" => Some(FieldValue::Number(self.members.len() as f64)),
            _ => None,
        }
    }

    fn supports(operation: &Operation) -> bool {
        matches!(
            operation,
            Operation::Register | Operation::Unregister | Operation::Update(_) | Operation::Delete
        )
    }

    fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::Register => self.is_member = true,
            Operation::Unregister => self.is_member = false,
            Operation::Update(patch) => merge_update(self, patch),
            _ => {}
        }
    }
}

impl Resource for User {
    type Id = i64;

    const PATH: &'static str = "/users/";
    const NAME: &'static str = "members";
    const STATUS_PARAM: Option<&'static str> = Some("is_active");
    const CATEGORY_PARAM: Option<&'static str> = Some("role");
    const SEARCH_FIELDS: &'static [&'static str] = &["email", "first_name", "last_name"];

    fn id(&self) -> i64 {
        self.pk
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "first_name" => text(&self.first_name),
            "last_name" => text(&self.last_name),
            "name" => Some(FieldValue::Text(self.full_name())),
            "email" => text(&self.email),
            "role" => text(self.role.as_str()),
            "is_active" => Some(FieldValue::Bool(self.is_active)),
            _ => None,
        }
    }

    fn supports(operation: &Operation) -> bool {
        matches!(
            operation,
            Operation::UpdateRole(_) | Operation::Activate | Operation::Deactivate
        )
    }

    fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::UpdateRole(role) => self.role = *role,
            Operation::Activate => self.is_active = true,
            Operation::Deactivate => self.is_active = false,
            _ => {}
        }
    }
}

impl Resource for Notification {
    type Id = i64;

    const PATH: &'static str = "/notifications/";
    const NAME: &'static str = "notifications";
    const SEARCH_FIELDS: &'static [&'static str] = &["message"];

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "message" => text(&self.message),
            "date" => self.date.map(FieldValue::Date),
            "read" => Some(FieldValue::Bool(self.read)),
            _ => None,
        }
    }

    fn supports(operation: &Operation) -> bool {
        matches!(operation, Operation::Update(_) | Operation::Delete)
    }

    fn apply(&mut self, operation: &Operation) {
        if let Operation::Update(patch) = operation {
            merge_update(self, patch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artsclub_client::payloads::ProjectPayload;

    #[test]
    fn endpoints_keep_action_suffix_convention() {
        assert_eq!(Operation::Approve.path::<Artwork>(&7), "/artwork/7/approve/");
        assert_eq!(Operation::Approve.method(), Method::PATCH);
        assert_eq!(
            Operation::Reject {
                feedback: "blurry".into()
            }
            .path::<Artwork>(&7),
            "/artwork/7/reject/"
        );
        assert_eq!(Operation::Register.path::<Event>(&3), "/events/3/register/");
        assert_eq!(Operation::Register.method(), Method::POST);
        assert_eq!(
            Operation::UpdateRole(Role::Manager).path::<User>(&5),
            "/users/5/update-role/"
        );
        assert_eq!(Operation::Deactivate.path::<User>(&5), "/users/5/deactivate/");
        assert_eq!(Operation::Delete.path::<Project>(&101), "/projects/101/");
        assert_eq!(Operation::Delete.method(), Method::DELETE);
    }

    #[test]
    fn reject_body_requires_feedback() {
        let err = Operation::Reject {
            feedback: String::new(),
        }
        .body()
        .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let body = Operation::Reject {
            feedback: "Low resolution".into(),
        }
        .body()
        .unwrap();
        assert_eq!(
            body,
            RequestBody::Json(serde_json::json!({ "feedback": "Low resolution" }))
        );
    }

    #[test]
    fn reconcile_table() {
        let unfiltered = FilterState::default();
        let pending = FilterState::default().with_status("pending");
        let admins = FilterState::default().with_category("admin");

        assert_eq!(Operation::Approve.reconcile(&unfiltered), Reconcile::FullReload);
        assert_eq!(Operation::Delete.reconcile(&unfiltered), Reconcile::FullReload);
        assert_eq!(Operation::Like.reconcile(&pending), Reconcile::PatchInPlace);
        assert_eq!(Operation::Register.reconcile(&pending), Reconcile::PatchInPlace);
        assert_eq!(Operation::Activate.reconcile(&unfiltered), Reconcile::PatchInPlace);
        assert_eq!(Operation::Activate.reconcile(&pending), Reconcile::FullReload);
        assert_eq!(
            Operation::UpdateRole(Role::Member).reconcile(&unfiltered),
            Reconcile::PatchInPlace
        );
        assert_eq!(
            Operation::UpdateRole(Role::Member).reconcile(&admins),
            Reconcile::FullReload
        );
    }

    #[test]
    fn update_validates_payload_and_merges_locally() {
        let invalid = Operation::update(&ProjectPayload {
            title: String::new(),
            description: String::new(),
            progress: 10,
        });
        assert!(invalid.is_err());

        let op = Operation::update(&ProjectPayload {
            title: "Summer Exhibition".into(),
            description: "Curation".into(),
            progress: 55,
        })
        .unwrap();
        let mut project = Project {
            id: 101,
            title: "Old".into(),
            description: String::new(),
            progress: 30,
            members: vec![1, 3],
            is_member: false,
        };
        project.apply(&op);
        assert_eq!(project.title, "Summer Exhibition");
        assert_eq!(project.progress, 55);
        assert_eq!(project.members, vec![1, 3]);
    }

    #[test]
    fn text_compares_case_insensitively() {
        let a = FieldValue::Text("apple".into());
        let b = FieldValue::Text("Banana".into());
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(
            FieldValue::Text("a".into()).compare(&FieldValue::Text("A".into())),
            Ordering::Greater
        );
    }
}
