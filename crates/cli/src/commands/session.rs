//! Session Command
//!
//! Drives a headless dashboard through a list of steps and prints the
//! resulting frame state.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use framedeck_common::{Catalog, UserKey};
use framedeck_workspace::{
    Dashboard, DashboardOptions, DeckClient, FrameEvent, FrameListener, FrameLoadState,
    HeadlessHost, MemoryHistory, MemoryPreferenceStore, PreferenceStore, SharedViewport,
    WorkspaceConfig,
};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::output::{or_dash, print_item, print_list, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct SessionArgs {
    /// User ID
    #[arg(short, long)]
    pub user: String,

    /// Persist the active url through the server
    #[arg(long)]
    pub remote: bool,

    /// Read the catalog from a local file instead of the server
    #[arg(long, conflicts_with = "remote")]
    pub catalog: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Steps: open:<id>, unload:<id>, reset:<id>, reload:<id>, back, forward, hold:<id>:<ms>
    #[arg(required = true)]
    pub steps: Vec<Step>,
}

/// One user action in a scripted session
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Open(String),
    Unload(String),
    Reset(String),
    Reload(String),
    Back,
    Forward,
    Hold { url_id: String, millis: u64 },
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let verb = parts.next().unwrap_or_default();
        let id = parts.next().filter(|id| !id.is_empty());
        let extra = parts.next();

        match (verb, id, extra) {
            ("back", None, None) => Ok(Step::Back),
            ("forward", None, None) => Ok(Step::Forward),
            ("open", Some(id), None) => Ok(Step::Open(id.to_string())),
            ("unload", Some(id), None) => Ok(Step::Unload(id.to_string())),
            ("reset", Some(id), None) => Ok(Step::Reset(id.to_string())),
            ("reload", Some(id), None) => Ok(Step::Reload(id.to_string())),
            ("hold", Some(id), Some(ms)) => {
                let millis = ms
                    .parse()
                    .map_err(|_| format!("invalid hold duration: {}", ms))?;
                Ok(Step::Hold {
                    url_id: id.to_string(),
                    millis,
                })
            }
            _ => Err(format!("invalid step: {}", s)),
        }
    }
}

/// Logs load results of headless frames
struct LoadLogger;

impl FrameListener for LoadLogger {
    fn on_load(&self, url_id: &str) {
        debug!("Frame {} loaded", url_id);
    }

    fn on_error(&self, url_id: &str, message: &str) {
        print_warning(&format!("Frame {} failed to load: {}", url_id, message));
    }
}

#[derive(Debug, Serialize)]
pub struct StateDisplay {
    pub user: String,
    pub active_url_id: Option<String>,
    pub loaded_url_ids: Vec<String>,
    pub history: Vec<String>,
}

impl TableDisplay for StateDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["User", "Active", "Loaded", "History"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.user.clone(),
            or_dash(self.active_url_id.as_deref()),
            self.loaded_url_ids.join(", "),
            self.history.len().to_string(),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct FrameDisplay {
    pub url_id: String,
    pub address: String,
    pub visible: bool,
    pub reloads: u32,
    pub load_state: String,
}

impl TableDisplay for FrameDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["URL ID", "Address", "Visible", "Reloads", "State"]
    }

    fn row(&self) -> Vec<String> {
        let visible = if self.visible {
            "yes".green().to_string()
        } else {
            "no".dimmed().to_string()
        };
        vec![
            self.url_id.clone(),
            self.address.clone(),
            visible,
            self.reloads.to_string(),
            self.load_state.clone(),
        ]
    }
}

pub async fn execute(args: SessionArgs, client: DeckClient, format: OutputFormat) -> Result<()> {
    let (catalog, config) = match &args.catalog {
        Some(path) => {
            let catalog = Catalog::load(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?;
            (catalog, WorkspaceConfig::default())
        }
        None => (
            client.fetch_catalog().await?,
            client.fetch_workspace_config().await?,
        ),
    };
    if catalog.is_empty() {
        bail!("catalog has no urls");
    }

    let preferences: Arc<dyn PreferenceStore> = if args.remote {
        Arc::new(client)
    } else {
        Arc::new(MemoryPreferenceStore::new())
    };
    let history = Arc::new(MemoryHistory::new());
    let host = HeadlessHost::new();

    let dashboard = Dashboard::mount(
        DashboardOptions::new(catalog, UserKey::new(&args.user), host.clone())
            .config(config)
            .viewport(Arc::new(SharedViewport::new(args.width)))
            .history(history.clone())
            .preferences(preferences)
            .listener(Arc::new(LoadLogger)),
    )
    .await;
    settle_frames(&dashboard);

    for step in &args.steps {
        run_step(&dashboard, &history, step).await;
        settle_frames(&dashboard);
    }
    dashboard.flush().await;

    let state = dashboard.store().snapshot();
    print_item(
        &StateDisplay {
            user: args.user.clone(),
            active_url_id: state.active_url_id.clone(),
            loaded_url_ids: state.loaded_url_ids.iter().cloned().collect(),
            history: history.entries(),
        },
        format,
    );

    let frames: Vec<FrameDisplay> = host
        .frames()
        .into_iter()
        .map(|frame| {
            let load_state = dashboard
                .frames()
                .frame(&frame.url_id)
                .map(|record| format!("{:?}", record.load_state))
                .unwrap_or_default();
            FrameDisplay {
                url_id: frame.url_id,
                address: frame.address,
                visible: frame.visible,
                reloads: frame.reloads,
                load_state,
            }
        })
        .collect();
    print_list(&frames, format);

    dashboard.unmount().await;
    Ok(())
}

async fn run_step(dashboard: &Dashboard<HeadlessHost>, history: &MemoryHistory, step: &Step) {
    debug!("Step {:?}", step);
    let store = dashboard.store();
    match step {
        Step::Open(id) => {
            if !dashboard.open(id) {
                print_warning(&format!("{} is not in the catalog", id));
            }
        }
        Step::Unload(id) => store.unload_iframe(id),
        Step::Reset(id) => store.reset_iframe(id),
        Step::Reload(id) => store.reload_iframe(id),
        Step::Back => match history.back() {
            Some(location) => {
                dashboard.handle_popstate(&location);
            }
            None => print_warning("Nothing to go back to"),
        },
        Step::Forward => match history.forward() {
            Some(location) => {
                dashboard.handle_popstate(&location);
            }
            None => print_warning("Nothing to go forward to"),
        },
        Step::Hold { url_id, millis } => {
            dashboard.long_press().press(url_id);
            tokio::time::sleep(Duration::from_millis(*millis)).await;
            if dashboard.long_press().release() {
                debug!("Hold on {} unloaded it", url_id);
            }
        }
    }
}

/// Headless frames finish loading as soon as they are created or reset
fn settle_frames(dashboard: &Dashboard<HeadlessHost>) {
    let frames = dashboard.frames();
    for url_id in frames.frame_ids() {
        if frames
            .frame(&url_id)
            .is_some_and(|record| record.load_state == FrameLoadState::Loading)
        {
            dashboard.handle_frame_event(&url_id, FrameEvent::Loaded);
        }
    }
}
