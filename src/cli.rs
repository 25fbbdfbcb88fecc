// src/cli.rs
use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::{RunSettings, DEFAULT_DB_PATH};

/// Keyword-scored defence & sovereignty news digest for Teams / Slack.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "newsbot", version)]
#[command(about = "Collect, score, deduplicate and deliver a daily news digest", long_about = None)]
pub struct Cli {
    /// Collect and preview without delivering or marking anything as seen
    #[arg(long)]
    pub dry_run: bool,

    /// Run now, then daily at HH:MM local time
    #[arg(long, value_name = "HH:MM", num_args = 0..=1, default_missing_value = "07:00")]
    pub schedule: Option<String>,

    /// Print dedup store statistics and exit
    #[arg(long, conflicts_with_all = ["dry_run", "schedule"])]
    pub stats: bool,

    /// Drop articles older than this many hours
    #[arg(long = "max-age", env = "NEWSBOT_MAX_AGE_HOURS", default_value_t = 48)]
    pub max_age_hours: u32,

    /// Digest size cap
    #[arg(long, env = "NEWSBOT_MAX_ITEMS", default_value_t = 30)]
    pub max_items: usize,

    /// SQLite file holding delivered URL keys
    #[arg(long, env = "NEWSBOT_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Forget delivered articles after this many days (0 keeps them forever)
    #[arg(long, env = "NEWSBOT_RETENTION_DAYS", default_value_t = 30)]
    pub retention_days: u32,

    #[arg(long, env = "TEAMS_WEBHOOK_URL", hide_env_values = true)]
    pub teams_webhook: Option<String>,

    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            max_age_hours: self.max_age_hours,
            max_items: self.max_items,
            db_path: self.db.clone(),
            retention_days: self.retention_days,
            teams_webhook: self.teams_webhook.clone(),
            slack_webhook: self.slack_webhook.clone(),
        }
    }
}
