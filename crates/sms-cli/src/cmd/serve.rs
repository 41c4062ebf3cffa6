use sms_core::config::SmsConfig;
use std::path::Path;

pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = SmsConfig::load(config_path)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(sms_server::serve(config))
}
