use std::collections::HashMap;
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use courtgrid_engine::config::GridConfig;
use courtgrid_engine::model::{EntryId, GridSnapshot, RentalItem};
use courtgrid_engine::pricing::{self, PricingCatalog};
use courtgrid_engine::resolver::{self, ResolutionPlan};
use courtgrid_engine::selection::{Selection, SelectionPhase, SelectionRequest};
use courtgrid_engine::session::{self, Command, EntryAction, GridSession, Intent};
use courtgrid_engine::time_grid::TimeGrid;
use courtgrid_engine::{validator, GridError};

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
enum Request {
    /// Plan what creating `action` on `selection` would change.
    Resolve {
        grid: Option<GridConfig>,
        snapshot: GridSnapshot,
        selection: SelectionRequest,
        action: EntryAction,
        #[serde(default)]
        catalog: PricingCatalog,
    },
    /// Apply a plan previously returned by `resolve`.
    #[serde(rename_all = "camelCase")]
    Apply {
        snapshot: GridSnapshot,
        plan: ResolutionPlan,
        #[serde(default)]
        confirmed: bool,
        #[serde(default)]
        assigned_ids: HashMap<EntryId, EntryId>,
    },
    #[serde(rename_all = "camelCase")]
    Quote {
        catalog: PricingCatalog,
        resource_ids: Vec<String>,
        duration_mins: u32,
        #[serde(default)]
        rental_items: Vec<RentalItem>,
    },
    Validate {
        grid: Option<GridConfig>,
        snapshot: GridSnapshot,
    },
    /// Feed a command sequence through a session and report every step.
    Replay {
        grid: Option<GridConfig>,
        snapshot: GridSnapshot,
        #[serde(default)]
        catalog: PricingCatalog,
        commands: Vec<Command>,
    },
}

#[derive(Debug, Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrResponse {
    ok: bool,
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Resolved {
    selection: Selection,
    requires_confirmation: bool,
    plan: ResolutionPlan,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ReplayStep {
    Intents { intents: Vec<Intent> },
    Error { error: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Replayed {
    steps: Vec<ReplayStep>,
    phase: SelectionPhase,
    selection: Option<Selection>,
    snapshot: GridSnapshot,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The request's inline grid wins over the `COURTGRID_CONFIG` file.
fn grid_for(inline: Option<GridConfig>) -> Result<TimeGrid, GridError> {
    let config = match inline {
        Some(config) => config,
        None => GridConfig::from_env()?,
    };
    TimeGrid::from_config(&config)
}

fn replay(
    grid: TimeGrid,
    snapshot: GridSnapshot,
    catalog: PricingCatalog,
    commands: Vec<Command>,
) -> Replayed {
    let mut session = GridSession::new(grid, snapshot).with_catalog(catalog);
    let steps = commands
        .into_iter()
        .map(|command| match session.handle(command) {
            Ok(intents) => ReplayStep::Intents { intents },
            Err(e) => ReplayStep::Error {
                error: e.to_string(),
            },
        })
        .collect();
    Replayed {
        steps,
        phase: session.phase(),
        selection: session.selection().cloned(),
        snapshot: session.snapshot().clone(),
    }
}

fn write_ok<T: Serialize>(data: T) {
    let resp = OkResponse { ok: true, data };
    let json = serde_json::to_string(&resp).unwrap_or_else(|e| {
        format!("{{\"ok\":false,\"error\":\"serialization error: {}\"}}", e)
    });
    println!("{}", json);
    let _ = io::stdout().flush();
}

fn write_err(msg: impl std::fmt::Display) -> ! {
    log::error!("{}", msg);
    let resp = ErrResponse {
        ok: false,
        error: msg.to_string(),
    };
    let json = serde_json::to_string(&resp).unwrap_or_else(|_| {
        "{\"ok\":false,\"error\":\"double serialization error\"}".to_string()
    });
    println!("{}", json);
    let _ = io::stdout().flush();
    std::process::exit(1);
}

fn run(request: Request) -> Result<(), GridError> {
    match request {
        Request::Resolve {
            grid,
            snapshot,
            selection,
            action,
            catalog,
        } => {
            let grid = grid_for(grid)?;
            let selection = Selection::from_request(&grid, &snapshot.resources, &selection)?;
            let plan = session::plan_action(&snapshot, &catalog, &selection, &action)?;
            write_ok(Resolved {
                requires_confirmation: plan.requires_confirmation(),
                selection,
                plan,
            });
        }
        Request::Apply {
            snapshot,
            plan,
            confirmed,
            assigned_ids,
        } => {
            let mut next = resolver::apply_plan(&snapshot, &plan, confirmed)?;
            resolver::remap_ids(&mut next, &assigned_ids);
            write_ok(next);
        }
        Request::Quote {
            catalog,
            resource_ids,
            duration_mins,
            rental_items,
        } => {
            write_ok(pricing::quote(
                &catalog,
                &resource_ids,
                duration_mins,
                &rental_items,
            ));
        }
        Request::Validate { grid, snapshot } => {
            let grid = grid_for(grid)?;
            write_ok(validator::validate(&snapshot, Some(&grid)));
        }
        Request::Replay {
            grid,
            snapshot,
            catalog,
            commands,
        } => {
            let grid = grid_for(grid)?;
            write_ok(replay(grid, snapshot, catalog, commands));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    // stdout carries the JSON response; logs go to stderr
    env_logger::init();

    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        write_err(format!("Failed to read stdin: {}", e));
    }

    let request: Request = match serde_json::from_str(&input) {
        Ok(r) => r,
        Err(e) => write_err(format!("Invalid JSON input: {}", e)),
    };

    if let Err(e) = run(request) {
        write_err(e);
    }
}
