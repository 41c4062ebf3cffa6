use crate::output::print_json;
use serde_json::json;
use sms_core::config::SmsConfig;
use sms_core::jira::fields::FieldResolver;
use std::path::Path;

pub fn run(config_path: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let config = SmsConfig::load(config_path)?;
    let jira = config.jira_client()?;
    let resolver = FieldResolver::fetch(&jira)?;
    let id = resolver.require(name)?;
    if json {
        print_json(&json!({ "name": name, "id": id }))?;
    } else {
        println!("{id}");
    }
    Ok(())
}
