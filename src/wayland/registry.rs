//! Tracking of advertised compositor globals.

/// One advertised global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Global {
    /// Registry name.
    pub name: u32,
    /// Advertised version.
    pub version: u32,
}

/// The globals a clipboard watcher needs, updated from registry events.
///
/// Seats are kept in advertisement order so the first one wins; a removed
/// seat is forgotten.
#[derive(Debug, Clone, Default)]
pub struct GlobalRegistry {
    seats: Vec<Global>,
    manager: Option<Global>,
}

impl GlobalRegistry {
    /// `wl_seat` interface name.
    pub const SEAT: &'static str = "wl_seat";
    /// `zwlr_data_control_manager_v1` interface name.
    pub const MANAGER: &'static str = "zwlr_data_control_manager_v1";

    /// Handles a `global` event.
    pub fn add(&mut self, name: u32, interface: &str, version: u32) {
        let global = Global { name, version };
        match interface {
            Self::SEAT => self.seats.push(global),
            Self::MANAGER if self.manager.is_none() => self.manager = Some(global),
            _ => return,
        }
        tracing::debug!(name, interface, version, "global advertised");
    }

    /// Handles a `global_remove` event.
    pub fn remove(&mut self, name: u32) {
        self.seats.retain(|seat| seat.name != name);
        if self.manager.is_some_and(|m| m.name == name) {
            self.manager = None;
        }
    }

    /// The first seat still advertised.
    #[must_use]
    pub fn seat(&self) -> Option<Global> {
        self.seats.first().copied()
    }

    /// The data-control manager, if advertised.
    #[must_use]
    pub const fn manager(&self) -> Option<Global> {
        self.manager
    }
}
