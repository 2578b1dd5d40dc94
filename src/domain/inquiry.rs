//! Property inquiry types and the dashboard statistics snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InquiryId, PropertyId, UserRef};

/// Workflow status of an inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    /// Not yet looked at.
    New,
    /// Being handled by an assignee.
    InProgress,
    /// A reply was sent, awaiting the inquirer.
    Responded,
    /// Answered to the inquirer's satisfaction.
    Resolved,
    /// Closed without further action.
    Closed,
}

impl InquiryStatus {
    /// All statuses in dashboard display order.
    pub const ALL: [InquiryStatus; 5] = [
        InquiryStatus::New,
        InquiryStatus::InProgress,
        InquiryStatus::Responded,
        InquiryStatus::Resolved,
        InquiryStatus::Closed,
    ];

    /// Returns the display label.
    pub fn label(&self) -> &'static str {
        match self {
            InquiryStatus::New => "New",
            InquiryStatus::InProgress => "In progress",
            InquiryStatus::Responded => "Responded",
            InquiryStatus::Resolved => "Resolved",
            InquiryStatus::Closed => "Closed",
        }
    }

    /// Returns the badge color for this status.
    pub fn color(&self) -> &'static str {
        match self {
            InquiryStatus::New => "blue",
            InquiryStatus::InProgress => "amber",
            InquiryStatus::Responded => "purple",
            InquiryStatus::Resolved => "green",
            InquiryStatus::Closed => "gray",
        }
    }

    /// Returns true while the inquiry still needs work.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            InquiryStatus::New | InquiryStatus::InProgress | InquiryStatus::Responded
        )
    }
}

/// Urgency of an inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl InquiryPriority {
    /// All priorities in dashboard display order.
    pub const ALL: [InquiryPriority; 4] = [
        InquiryPriority::Low,
        InquiryPriority::Normal,
        InquiryPriority::High,
        InquiryPriority::Urgent,
    ];

    /// Returns the display label.
    pub fn label(&self) -> &'static str {
        match self {
            InquiryPriority::Low => "Low",
            InquiryPriority::Normal => "Normal",
            InquiryPriority::High => "High",
            InquiryPriority::Urgent => "Urgent",
        }
    }

    /// Returns the badge color for this priority.
    pub fn color(&self) -> &'static str {
        match self {
            InquiryPriority::Low => "gray",
            InquiryPriority::Normal => "blue",
            InquiryPriority::High => "orange",
            InquiryPriority::Urgent => "red",
        }
    }
}

/// Listing an inquiry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRef {
    /// Listing id.
    pub id: PropertyId,
    /// Listing title.
    pub title: String,
}

/// A property-scoped conversation with workflow metadata.
///
/// Its messages use the regular [`super::Message`] model with `subject` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InquiryThread {
    /// Inquiry id.
    pub id: InquiryId,
    /// Listing the inquiry is about.
    pub property: PropertyRef,
    /// Workflow status.
    pub status: InquiryStatus,
    /// Urgency.
    pub priority: InquiryPriority,
    /// Staff member handling the inquiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserRef>,
    /// Subject line.
    pub subject: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl InquiryThread {
    /// Returns true while the inquiry still needs work.
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Returns true for open, high-or-urgent inquiries nobody has picked up.
    pub fn needs_attention(&self) -> bool {
        self.is_open() && self.assignee.is_none() && self.priority >= InquiryPriority::High
    }
}

/// Headline counts on the inquiry dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryOverview {
    pub total: u32,
    pub new_today: u32,
    pub new_this_week: u32,
    pub unassigned: u32,
    pub urgent: u32,
}

/// Team performance figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InquiryPerformance {
    /// Mean time to first response, in hours.
    pub avg_response_time_hours: f64,
    /// Share of inquiries that received a response, 0-100.
    pub response_rate: f64,
    /// Share of inquiries that converted, 0-100.
    pub conversion_rate: f64,
}

/// Kind of dashboard activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    StatusChanged,
    Assigned,
    Replied,
    Resolved,
}

/// One entry in the dashboard's recent activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Inquiry the activity concerns.
    pub inquiry_id: InquiryId,
    /// What happened.
    pub kind: ActivityKind,
    /// Human-readable description.
    pub description: String,
    /// When it happened.
    pub occurred_at: DateTime<Utc>,
}

/// Raw dashboard statistics as returned by the server.
///
/// Each fetch yields a new snapshot that supersedes the previous one whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InquiryDashboardSnapshot {
    pub overview: InquiryOverview,
    #[serde(default)]
    pub status_distribution: BTreeMap<InquiryStatus, u32>,
    #[serde(default)]
    pub priority_distribution: BTreeMap<InquiryPriority, u32>,
    pub performance: InquiryPerformance,
    #[serde(default)]
    pub recent_activities: Vec<ActivityEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UserId, UserType};

    fn inquiry(status: InquiryStatus, priority: InquiryPriority) -> InquiryThread {
        InquiryThread {
            id: InquiryId::from("inq-1"),
            property: PropertyRef {
                id: PropertyId::from("p-1"),
                title: "Two-bed flat".to_string(),
            },
            status,
            priority,
            assignee: None,
            subject: "Viewing request".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn open_statuses() {
        assert!(InquiryStatus::New.is_open());
        assert!(InquiryStatus::Responded.is_open());
        assert!(!InquiryStatus::Resolved.is_open());
        assert!(!InquiryStatus::Closed.is_open());
    }

    #[test]
    fn needs_attention_when_urgent_and_unassigned() {
        let mut thread = inquiry(InquiryStatus::New, InquiryPriority::Urgent);
        assert!(thread.needs_attention());

        thread.assignee = Some(UserRef {
            id: UserId::from("agent-1"),
            first_name: "Sam".to_string(),
            last_name: "Reed".to_string(),
            email: "sam@example.com".to_string(),
            profile_picture: None,
            user_type: UserType::Agent,
        });
        assert!(!thread.needs_attention());
    }

    #[test]
    fn closed_or_low_priority_does_not_need_attention() {
        assert!(!inquiry(InquiryStatus::Closed, InquiryPriority::Urgent).needs_attention());
        assert!(!inquiry(InquiryStatus::New, InquiryPriority::Normal).needs_attention());
    }

    #[test]
    fn snapshot_deserializes_with_missing_collections() {
        let json = r#"{
            "overview": {"total": 4, "new_today": 1, "new_this_week": 2, "unassigned": 1, "urgent": 0},
            "status_distribution": {"new": 3, "in_progress": 1},
            "performance": {"avg_response_time_hours": 1.5, "response_rate": 95.0, "conversion_rate": 12.0}
        }"#;
        let snapshot: InquiryDashboardSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.overview.total, 4);
        assert_eq!(
            snapshot.status_distribution.get(&InquiryStatus::New),
            Some(&3)
        );
        assert!(snapshot.priority_distribution.is_empty());
        assert!(snapshot.recent_activities.is_empty());
    }
}
