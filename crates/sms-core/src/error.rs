use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("config not found: run 'sms config init'")]
    ConfigNotFound,

    #[error("jira api token not set: export {0}")]
    TokenNotSet(String),

    #[error("unexpected status {status} from {context}")]
    UnexpectedStatus { status: u16, context: String },

    #[error("issue not found: {0}")]
    IssueNotFound(String),

    #[error("custom field not found: {0}")]
    FieldNotFound(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("transition '{transition}' not available on {issue}")]
    TransitionNotAvailable { issue: String, transition: String },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("handler not found: {0}")]
    HandlerNotFound(String),

    #[error("unknown webhook event: {0}")]
    UnknownWebhookEvent(String),

    #[error("confluence not configured")]
    ConfluenceNotConfigured,

    #[error("confluence page not found: {0}")]
    PageNotFound(String),

    #[error("invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("invalid measurement configuration: {0}")]
    InvalidMeasurement(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SmsError>;
