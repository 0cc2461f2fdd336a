//! Structured ad reporting events handed to the client.

mod report;

pub use report::{
    ConfirmationEvent, LoadEvent, NotifyEvent, ReportEvent, SettingsEvent, StateEvent, TabEvent,
};
