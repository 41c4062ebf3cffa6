use crate::output::{print_json, print_table};
use anyhow::bail;
use clap::Subcommand;
use sms_core::config::{SmsConfig, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a starter configuration file
    Init,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(config_path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init => {
            if config_path.exists() {
                bail!("{} already exists", config_path.display());
            }
            SmsConfig::example().save(config_path)?;
            println!("wrote {}", config_path.display());
            Ok(())
        }
        ConfigSubcommand::Validate => {
            let config = SmsConfig::load(config_path)?;
            let warnings = config.validate();
            if json {
                print_json(&warnings)?;
            } else if warnings.is_empty() {
                println!("configuration ok");
            } else {
                let rows = warnings
                    .iter()
                    .map(|w| {
                        let level = match w.level {
                            WarnLevel::Warning => "warning",
                            WarnLevel::Error => "error",
                        };
                        vec![level.to_string(), w.message.clone()]
                    })
                    .collect();
                print_table(&["LEVEL", "MESSAGE"], rows);
            }
            if warnings.iter().any(|w| w.level == WarnLevel::Error) {
                bail!("configuration has errors");
            }
            Ok(())
        }
    }
}
