//! Theme-indexed dataset store and filter / aggregate pipeline behind the
//! PEER data portal.

pub mod chart;
pub mod config;
pub mod data;
pub mod error;
pub mod session;

pub use config::PortalConfig;
pub use error::{PortalError, Result};
pub use session::{Grouping, Selection, Session};
