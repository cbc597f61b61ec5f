mod app;
mod broadcast;
mod config;
mod controller;
mod diff;
mod dispatch;
mod errors;
mod network;
mod reconcile;
mod server;
mod store;
mod version_config;

pub mod constants;
pub mod metrics;
pub mod proto;

mod utils;

pub use app::*;
pub use broadcast::*;
pub use config::*;
pub use controller::*;
pub use diff::*;
pub use dispatch::*;
pub use errors::*;
pub use network::*;
pub use reconcile::*;
pub use server::*;
pub use store::*;
pub use version_config::*;

//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;
const API_SLO: Objective = Objective::new("api")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms100, ObjectivePercentile::P99);
