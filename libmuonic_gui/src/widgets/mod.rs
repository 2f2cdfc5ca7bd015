//! Display panels and their state.
//!
//! The widgets here hold everything a panel shows, and are updated by the controller. How
//! a widget is drawn is up to the front-end, which recovers the concrete type through
//! [`Widget`]'s downcasting.
use downcast_rs::{impl_downcast, Downcast};

use super::error::WidgetError;

pub mod daq;
pub mod gps;
pub mod histogram;
pub mod pulse;
pub mod rate;
pub mod status;

pub use daq::DaqWidget;
pub use gps::GpsWidget;
pub use histogram::{DecayWidget, Histogram, VelocityWidget};
pub use pulse::PulseWidget;
pub use rate::RateWidget;
pub use status::StatusWidget;

/// What a widget can do. A widget must support all of it to be registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub render: bool,
    pub activate: bool,
    pub update: bool,
    pub finish: bool,
}

impl Capabilities {
    pub const FULL: Self = Self {
        render: true,
        activate: true,
        update: true,
        finish: true,
    };

    /// Names of the capabilities which are not provided
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.render, "render"),
            (self.activate, "activate"),
            (self.update, "update"),
            (self.finish, "finish"),
        ]
        .into_iter()
        .filter_map(|(present, name)| (!present).then_some(name))
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// A self-contained display panel
pub trait Widget: Downcast {
    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn is_active(&self) -> bool;

    fn set_active(&mut self, active: bool);

    /// Called every time window on active widgets
    fn refresh(&mut self) {}

    /// Called once at shutdown, e.g. to close output files
    fn finish(&mut self) -> Result<(), WidgetError> {
        Ok(())
    }
}
impl_downcast!(Widget);
