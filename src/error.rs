use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrewError {
    #[error(
        "invalid name: {0:?} (only ASCII alphanumerics, hyphens and underscores are allowed)"
    )]
    InvalidName(String),

    #[error("team {0} not found")]
    TeamNotFound(String),

    #[error("no team given: pass --team or set CREW_TEAM")]
    NoTeam,

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("member {0} not found")]
    MemberNotFound(String),

    #[error("task subject must not be empty")]
    EmptySubject,

    #[error("plan must not be empty")]
    EmptyPlan,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("task {0} has no submitted plan")]
    NoPlanSubmitted(String),

    #[error("feedback is required when rejecting a plan")]
    FeedbackRequired,

    #[error("could not acquire lock on {0}")]
    LockAcquisitionFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrewError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "invalid_name",
            Self::TeamNotFound(_) => "team_not_found",
            Self::NoTeam => "no_team",
            Self::TaskNotFound(_) => "task_not_found",
            Self::MemberNotFound(_) => "member_not_found",
            Self::EmptySubject => "empty_subject",
            Self::EmptyPlan => "empty_plan",
            Self::InvalidState(_) => "invalid_state",
            Self::NoPlanSubmitted(_) => "no_plan_submitted",
            Self::FeedbackRequired => "feedback_required",
            Self::LockAcquisitionFailed(_) => "lock_acquisition_failed",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, CrewError>;
