use chrono::Utc;
use sms_core::config::SmsConfig;
use sms_core::handlers::HandlerContext;
use sms_core::jira::fields::FieldResolver;
use sms_core::Result;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SmsConfig>,
}

impl AppState {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Run a piece of blocking automation work with a fully wired-up context.
/// Clients and the field resolver are built per invocation; webhook volume
/// is a handful of events per minute, not a hot path.
pub fn with_context<T>(
    config: &SmsConfig,
    work: impl FnOnce(&HandlerContext) -> Result<T>,
) -> Result<T> {
    let jira = config.jira_client()?;
    let confluence = config.confluence_client().ok();
    let fields = FieldResolver::fetch(&jira)?;
    let ctx = HandlerContext {
        jira: &jira,
        confluence: confluence.as_ref(),
        fields: &fields,
        config,
        now: Utc::now(),
    };
    work(&ctx)
}
