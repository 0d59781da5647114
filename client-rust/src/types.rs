use crate::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review state of a submitted artwork.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artwork {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    /// Reviewer feedback, set when the artwork was rejected.
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub likes: u32,
    pub submission_date: Option<DateTime<Utc>>,
}

/// Admin listings embed attendee records; member listings only carry ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Attendee {
    Id(i64),
    User(AttendeeSummary),
}

impl Attendee {
    #[must_use]
    pub fn id(&self) -> i64 {
        match self {
            Self::Id(id) => *id,
            Self::User(user) => user.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendeeSummary {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// Lists the ids of the events the signed-in member registered for.
pub const MY_REGISTRATIONS_PATH: &str = "/events/my_registrations/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_cover: Option<String>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub creator: Option<i64>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub registration_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
    /// Whether the signed-in member is registered. Never sent by the list
    /// endpoint; filled in from [`MY_REGISTRATIONS_PATH`] after each load.
    #[serde(default)]
    pub is_registered: bool,
}

impl Event {
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.attendees.len() >= capacity as usize)
    }

    /// A member may register while the event is not completed, not full and
    /// the deadline (if any) has not passed.
    #[must_use]
    pub fn is_open_for_registration(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed
            && !self.is_full()
            && self
                .registration_deadline
                .is_none_or(|deadline| now <= deadline)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Completion percentage, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub members: Vec<i64>,
    #[serde(default)]
    pub is_member: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub pk: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

fn default_true() -> bool {
    true
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub message: String,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
}

/// Badge count for the notification bell.
#[must_use]
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.read).count()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityUser {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Activity ids are numeric for model events and strings for synthetic ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ActivityId {
    Number(i64),
    Text(String),
}

/// An entry of the admin dashboard's recent activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityItem {
    pub id: ActivityId,
    #[serde(rename = "activity_type")]
    pub kind: String,
    #[serde(rename = "description")]
    pub title: String,
    #[serde(default)]
    pub user: Option<ActivityUser>,
    #[serde(rename = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ActivityItem {
    #[must_use]
    pub fn user_name(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|user| format!("{} {}", user.first_name, user.last_name))
    }
}

/// List endpoints answer either with a paginated envelope or with a bare
/// array, depending on the view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Page {
        results: Vec<T>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
    },
    Bare(Vec<T>),
}

/// One fetched slice of a resource list. Rebuilt wholesale on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPage<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl<T> Default for CollectionPage<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next: None,
            previous: None,
        }
    }
}

impl<T> CollectionPage<T> {
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

impl<T> From<ListResponse<T>> for CollectionPage<T> {
    fn from(response: ListResponse<T>) -> Self {
        match response {
            ListResponse::Page {
                results,
                count,
                next,
                previous,
            } => Self {
                count: count.unwrap_or(results.len() as u64),
                items: results,
                next,
                previous,
            },
            ListResponse::Bare(items) => Self {
                count: items.len() as u64,
                items,
                next: None,
                previous: None,
            },
        }
    }
}
