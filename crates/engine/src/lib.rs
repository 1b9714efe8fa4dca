pub mod config;
pub mod error;
pub mod model;
pub mod pricing;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod time_grid;
pub mod validator;

pub use config::GridConfig;
pub use error::GridError;
pub use model::{ClockTime, EntryId, GridEntry, GridSnapshot, TimeSpan};
pub use resolver::{apply_plan, resolve, ResolutionPlan};
pub use selection::{PointerTarget, Selection, SelectionMachine, SelectionPhase};
pub use session::{Command, GridSession, Intent};
pub use time_grid::TimeGrid;
