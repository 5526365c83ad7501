//! Persisted workflow instances

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Account;
use crate::error::CoreError;

/// Step an instance is at, or was at when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStep {
    SubmitProvisioning,
    ResumeAfterProvisioning,
    ProvisionInfrastructure,
    BuildRelease,
    TriggerReleasePipeline,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Running,
    /// Waiting for a provisioning outcome; holds a resume token
    Suspended,
    Succeeded,
    Failed,
}

macro_rules! str_enum {
    ($ty:ty { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    other => Err(CoreError::SerializationError(format!(
                        "unknown {} '{other}'",
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

str_enum!(WorkflowStep {
    SubmitProvisioning => "SUBMIT_PROVISIONING",
    ResumeAfterProvisioning => "RESUME_AFTER_PROVISIONING",
    ProvisionInfrastructure => "PROVISION_INFRASTRUCTURE",
    BuildRelease => "BUILD_RELEASE",
    TriggerReleasePipeline => "TRIGGER_RELEASE_PIPELINE",
    Completed => "COMPLETED",
});

str_enum!(WorkflowStatus {
    Running => "RUNNING",
    Suspended => "SUSPENDED",
    Succeeded => "SUCCEEDED",
    Failed => "FAILED",
});

/// One run of the provisioning workflow for a single ingestion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub instance_id: String,
    pub account_id: String,
    pub step: WorkflowStep,
    pub status: WorkflowStatus,
    /// Account as this instance last saw it
    pub snapshot: Account,
    /// Present only while `Suspended`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Release pipeline execution started on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::utils::datetime")]
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    pub fn new(snapshot: Account) -> Self {
        let now = Utc::now();
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            account_id: snapshot.account_id.clone(),
            step: WorkflowStep::SubmitProvisioning,
            status: WorkflowStatus::Running,
            snapshot,
            resume_token: None,
            failure: None,
            execution_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, step: WorkflowStep) {
        self.step = step;
        self.updated_at = Utc::now();
    }

    /// Park the instance until `resume_token` is presented.
    pub fn suspend(&mut self, resume_token: String) {
        self.status = WorkflowStatus::Suspended;
        self.resume_token = Some(resume_token);
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, failure: String) {
        self.status = WorkflowStatus::Failed;
        self.resume_token = None;
        self.failure = Some(failure);
        self.updated_at = Utc::now();
    }

    pub fn succeed(&mut self, execution_id: String) {
        self.step = WorkflowStep::Completed;
        self.status = WorkflowStatus::Succeeded;
        self.execution_id = Some(execution_id);
        self.updated_at = Utc::now();
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            WorkflowStatus::Succeeded | WorkflowStatus::Failed
        )
    }
}

/// Signal delivered to a suspended instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeSignal {
    /// Provisioning succeeded; carries the updated account
    Success(Account),
    /// Provisioning failed
    Failure(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn instance() -> WorkflowInstance {
        WorkflowInstance::new(Account::new(
            "acme".to_string(),
            Vec::new(),
            BTreeSet::new(),
            Utc::now(),
        ))
    }

    #[test]
    fn suspend_then_fail_clears_token() {
        let mut inst = instance();
        inst.suspend("tok".to_string());
        assert_eq!(inst.status, WorkflowStatus::Suspended);
        inst.fail("boom".to_string());
        assert!(inst.resume_token.is_none());
        assert!(inst.is_finished());
    }

    #[test]
    fn step_strings_round_trip() {
        let step: WorkflowStep = "TRIGGER_RELEASE_PIPELINE".parse().unwrap();
        assert_eq!(step, WorkflowStep::TriggerReleasePipeline);
        assert_eq!(WorkflowStatus::Suspended.to_string(), "SUSPENDED");
        assert!("LATER".parse::<WorkflowStatus>().is_err());
    }
}
