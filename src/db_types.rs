use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_STATUS: &str = "pending-input";

/// Which branch of the IVR flow a call is currently in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    #[default]
    Ivr,
    Forward,
    Voicemail,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::Ivr => "ivr",
            WorkflowType::Forward => "forward",
            WorkflowType::Voicemail => "voicemail",
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ivr" => Ok(WorkflowType::Ivr),
            "forward" => Ok(WorkflowType::Forward),
            "voicemail" => Ok(WorkflowType::Voicemail),
            other => Err(format!("unknown workflow type '{other}'")),
        }
    }
}

/// The single persisted activity entry for one phone call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: Uuid,
    pub call_id: String,
    pub from_number: String,
    pub to_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_digit: Option<String>,
    pub workflow_type: WorkflowType,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Sparse update for a call record.  `None` means "not provided" and never touches the stored
/// value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallUpdate {
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub direction: Option<String>,
    pub selected_digit: Option<String>,
    pub workflow_type: Option<WorkflowType>,
    pub status: Option<String>,
    pub duration_seconds: Option<i64>,
    pub recording_url: Option<String>,
    pub recording_duration_seconds: Option<i64>,
    pub notes: Option<String>,
}

impl CallUpdate {
    pub fn new(workflow_type: WorkflowType, status: impl Into<String>) -> Self {
        Self {
            workflow_type: Some(workflow_type),
            status: Some(status.into()),
            ..Default::default()
        }
    }

    /// Seed a fresh record from this update, filling in the store defaults.
    pub fn into_record(self, call_id: &str, now: OffsetDateTime) -> CallRecord {
        CallRecord {
            id: Uuid::new_v4(),
            call_id: call_id.to_string(),
            from_number: self.from_number.unwrap_or_default(),
            to_number: self.to_number.unwrap_or_default(),
            direction: self.direction,
            selected_digit: self.selected_digit,
            workflow_type: self.workflow_type.unwrap_or_default(),
            status: self.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            duration_seconds: self.duration_seconds,
            recording_url: self.recording_url,
            recording_duration_seconds: self.recording_duration_seconds,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the provided fields into an existing record.  Identity and `created_at` are left
    /// alone; `updated_at` is always refreshed.
    pub fn apply_to(self, record: &mut CallRecord, now: OffsetDateTime) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut record.from_number, self.from_number);
        set(&mut record.to_number, self.to_number);
        set_opt(&mut record.direction, self.direction);
        set_opt(&mut record.selected_digit, self.selected_digit);
        set(&mut record.workflow_type, self.workflow_type);
        set(&mut record.status, self.status);
        set_opt(&mut record.duration_seconds, self.duration_seconds);
        set_opt(&mut record.recording_url, self.recording_url);
        set_opt(
            &mut record.recording_duration_seconds,
            self.recording_duration_seconds,
        );
        set_opt(&mut record.notes, self.notes);
        record.updated_at = now;
    }
}
