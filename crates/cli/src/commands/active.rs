//! Active URL Commands

use anyhow::Result;
use clap::Subcommand;
use framedeck_common::{ActiveUrlPreference, UserKey};
use framedeck_workspace::DeckClient;
use serde::Serialize;

use crate::output::{or_dash, print_item, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum ActiveCommands {
    /// Show a user's stored active url
    Get {
        /// User ID
        #[arg(short, long)]
        user: String,
    },

    /// Store an active url for a user
    Set {
        /// User ID
        #[arg(short, long)]
        user: String,

        /// Url ID
        url_id: String,
    },

    /// Forget a user's active url
    Clear {
        /// User ID
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Debug, Serialize)]
pub struct ActiveDisplay {
    pub user: String,
    #[serde(flatten)]
    pub pref: ActiveUrlPreference,
}

impl TableDisplay for ActiveDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["User", "Active URL", "Last Active"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.user.clone(),
            or_dash(self.pref.active_url_id.as_deref()),
            self.pref
                .last_active_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| or_dash(None)),
        ]
    }
}

pub async fn execute(cmd: ActiveCommands, client: DeckClient, format: OutputFormat) -> Result<()> {
    match cmd {
        ActiveCommands::Get { user } => {
            let pref = client.get_active_url(&UserKey::new(&user)).await?;
            print_item(&ActiveDisplay { user, pref }, format);
        }

        ActiveCommands::Set { user, url_id } => {
            let catalog = client.fetch_catalog().await?;
            if !catalog.contains(&url_id) {
                print_warning(&format!("{} is not in the server catalog", url_id));
            }
            let pref = client
                .set_active_url(&UserKey::new(&user), &ActiveUrlPreference::active_now(&url_id))
                .await?;
            print_item(&ActiveDisplay { user, pref }, format);
        }

        ActiveCommands::Clear { user } => {
            if client.clear_active_url(&UserKey::new(&user)).await? {
                print_success(&format!("Cleared active url for {}", user));
            } else {
                print_warning(&format!("No active url stored for {}", user));
            }
        }
    }

    Ok(())
}
