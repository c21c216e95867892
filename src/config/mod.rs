//! Configuration management for portsweep.
//!
//! Provides XDG-compliant lookup of the settings file that seeds the
//! scan and logging configuration.

mod settings;

pub use settings::{AppSettings, LogSettings, Paths};
