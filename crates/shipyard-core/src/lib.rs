//! Domain model, configuration and persistence for the shipyard deployment
//! orchestrator. HTTP concerns live in `shipyard-server`; the CI wire protocol
//! lives in `jenkins-client`.

pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod params;
pub mod quota;
pub mod store;

pub use error::{Result, ShipyardError};
