//! Catalog Commands

use anyhow::Result;
use clap::Subcommand;
use framedeck_common::Catalog;
use framedeck_workspace::DeckClient;
use serde::Serialize;

use crate::output::{or_dash, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List every url with its group
    List,

    /// Re-read the catalog file on the server
    Reload,
}

/// Flattened catalog row
#[derive(Debug, Serialize)]
pub struct UrlDisplay {
    pub group: String,
    pub id: String,
    pub url: String,
    pub url_mobile: Option<String>,
    pub idle_timeout_minutes: Option<u32>,
}

impl UrlDisplay {
    pub fn rows(catalog: &Catalog) -> Vec<Self> {
        catalog
            .groups()
            .iter()
            .flat_map(|group| {
                group.urls.iter().map(move |url| Self {
                    group: group.name.clone(),
                    id: url.id.clone(),
                    url: url.url.clone(),
                    url_mobile: url.url_mobile.clone(),
                    idle_timeout_minutes: url.idle_timeout_minutes,
                })
            })
            .collect()
    }
}

impl TableDisplay for UrlDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Group", "ID", "URL", "Mobile URL", "Idle Timeout"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.group.clone(),
            self.id.clone(),
            self.url.clone(),
            or_dash(self.url_mobile.as_deref()),
            self.idle_timeout_minutes
                .map(|m| format!("{}m", m))
                .unwrap_or_else(|| or_dash(None)),
        ]
    }
}

pub async fn execute(cmd: CatalogCommands, client: DeckClient, format: OutputFormat) -> Result<()> {
    match cmd {
        CatalogCommands::List => {
            let catalog = client.fetch_catalog().await?;
            print_list(&UrlDisplay::rows(&catalog), format);
        }

        CatalogCommands::Reload => {
            let catalog = client.reload_catalog().await?;
            print_success(&format!(
                "Catalog reloaded: {} url(s) in {} group(s)",
                catalog.len(),
                catalog.groups().len()
            ));
        }
    }

    Ok(())
}
