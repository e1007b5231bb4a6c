//! Portal documents and their request payloads.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::Document;

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

fn require_optional_text(field: &str, value: Option<&str>) -> Result<(), String> {
    value.map_or(Ok(()), |v| require_text(field, v))
}

// ---- Items ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Lost,
    Found,
    Claimed,
    Returned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub location: String,
    pub status: ItemStatus,
    /// User who reported the item, if known
    pub reported_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub location: String,
    #[serde(default = "default_item_status")]
    pub status: ItemStatus,
    #[serde(default)]
    pub reported_by: Option<Uuid>,
}

fn default_item_status() -> ItemStatus {
    ItemStatus::Lost
}

impl NewItem {
    pub fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        require_text("category", &self.category)?;
        require_text("location", &self.location)
    }

    pub fn into_item(self) -> Item {
        let ts = now();
        Item {
            id: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            category: self.category,
            location: self.location,
            status: self.status,
            reported_by: self.reported_by,
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub status: Option<ItemStatus>,
}

impl ItemPatch {
    pub fn validate(&self) -> Result<(), String> {
        require_optional_text("title", self.title.as_deref())?;
        require_optional_text("category", self.category.as_deref())?;
        require_optional_text("location", self.location.as_deref())
    }

    /// Whether the patch touches nothing but the status.
    pub fn is_status_only(&self) -> bool {
        self.status.is_some()
            && self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.location.is_none()
    }

    pub fn apply(self, item: &mut Item) {
        if let Some(title) = self.title {
            item.title = title;
        }
        if let Some(description) = self.description {
            item.description = Some(description);
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(location) = self.location {
            item.location = location;
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        item.updated_at = now();
    }
}

// ---- Claims ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    pub item_id: Uuid,
    pub claimant_id: Uuid,
    pub message: String,
    pub status: ClaimStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClaim {
    pub item_id: Uuid,
    pub claimant_id: Uuid,
    pub message: String,
}

impl NewClaim {
    pub fn validate(&self) -> Result<(), String> {
        require_text("message", &self.message)
    }

    pub fn into_claim(self) -> Claim {
        let ts = now();
        Claim {
            id: Uuid::new_v4(),
            item_id: self.item_id,
            claimant_id: self.claimant_id,
            message: self.message,
            status: ClaimStatus::Pending,
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimStatusUpdate {
    pub status: ClaimStatus,
}

// ---- Reports ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Reviewed,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub item_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    #[serde(default)]
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub reporter_id: Option<Uuid>,
    pub reason: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl NewReport {
    pub fn validate(&self) -> Result<(), String> {
        require_text("reason", &self.reason)
    }

    pub fn into_report(self) -> Report {
        let ts = now();
        Report {
            id: Uuid::new_v4(),
            item_id: self.item_id,
            reporter_id: self.reporter_id,
            reason: self.reason,
            details: self.details,
            status: ReportStatus::Open,
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportPatch {
    pub reason: Option<String>,
    pub details: Option<String>,
    pub status: Option<ReportStatus>,
}

impl ReportPatch {
    pub fn validate(&self) -> Result<(), String> {
        require_optional_text("reason", self.reason.as_deref())
    }

    pub fn apply(self, report: &mut Report) {
        if let Some(reason) = self.reason {
            report.reason = reason;
        }
        if let Some(details) = self.details {
            report.details = Some(details);
        }
        if let Some(status) = self.status {
            report.status = status;
        }
        report.updated_at = now();
    }
}

// ---- Feedback ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub rating: u8,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewFeedback {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=5).contains(&self.rating) {
            return Err("rating must be between 1 and 5".into());
        }
        Ok(())
    }

    pub fn into_feedback(self) -> Feedback {
        Feedback {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            rating: self.rating,
            comment: self.comment,
            created_at: now(),
        }
    }
}

// ---- Users ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Staff,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn validate_email(email: &str) -> Result<(), String> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err("email must contain '@'".into()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default = "default_user_role")]
    pub role: UserRole,
}

fn default_user_role() -> UserRole {
    UserRole::Student
}

impl NewUser {
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name)?;
        validate_email(&self.email)
    }

    pub fn into_user(self) -> User {
        let ts = now();
        User {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email.to_ascii_lowercase(),
            role: self.role,
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
}

impl UserPatch {
    pub fn validate(&self) -> Result<(), String> {
        require_optional_text("name", self.name.as_deref())?;
        self.email.as_deref().map_or(Ok(()), validate_email)
    }

    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email.to_ascii_lowercase();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        user.updated_at = now();
    }
}

macro_rules! impl_as_str {
    ($ty:ty { $($variant:ident => $name:literal),* $(,)? }) => {
        impl $ty {
            /// Wire name, as used in query filters and cache keys.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),*
                }
            }
        }
    };
}

impl_as_str!(ItemStatus { Lost => "lost", Found => "found", Claimed => "claimed", Returned => "returned" });
impl_as_str!(ClaimStatus { Pending => "pending", Approved => "approved", Rejected => "rejected" });
impl_as_str!(ReportStatus { Open => "open", Reviewed => "reviewed", Dismissed => "dismissed" });
impl_as_str!(UserRole { Student => "student", Staff => "staff", Admin => "admin" });

macro_rules! impl_document {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Document for $ty {
                fn id(&self) -> Uuid {
                    self.id
                }
            }
        )*
    };
}

impl_document!(Item, Claim, Report, Feedback, User);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_json_uses_camel_case_and_rfc3339() {
        let item = NewItem {
            title: "Black wallet".into(),
            description: None,
            category: "wallets".into(),
            location: "Library".into(),
            status: ItemStatus::Found,
            reported_by: None,
        }
        .into_item();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "found");
        assert!(json["createdAt"].as_str().unwrap().contains('T'));
        assert!(json.get("reportedBy").is_some());
    }

    #[test]
    fn validation_rules() {
        let feedback = NewFeedback {
            user_id: None,
            rating: 6,
            comment: None,
        };
        assert!(feedback.validate().is_err());

        let user = NewUser {
            name: "Ada".into(),
            email: "ada.example.edu".into(),
            role: UserRole::Student,
        };
        assert!(user.validate().is_err());

        let patch = ItemPatch {
            title: Some("  ".into()),
            ..ItemPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn status_only_patch_is_detected() {
        let patch = ItemPatch {
            status: Some(ItemStatus::Returned),
            ..ItemPatch::default()
        };
        assert!(patch.is_status_only());
        let patch = ItemPatch {
            status: Some(ItemStatus::Returned),
            location: Some("Front desk".into()),
            ..ItemPatch::default()
        };
        assert!(!patch.is_status_only());
    }
}
