pub mod config;
pub mod coords;
pub mod engine;
pub mod error;
pub mod pose;
pub mod rig;
pub mod tracker;

pub use engine::{Retargeter, TickReport};
pub use error::BindError;
