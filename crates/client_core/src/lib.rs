use std::sync::Arc;

pub mod chat;
pub mod error;
pub mod fleet;
pub mod remote;
pub mod render;

pub use chat::{ChatEvent, ChatIdentity, DispatchOutcome, Message, SendState, SessionController};
pub use error::{ClientError, FetchFailure, ValidationFailure};
pub use fleet::{EditSlot, FleetEvent, ListView, VehicleForm, VehicleListController};
pub use remote::{HttpRemote, RemoteAccess};

/// Both controllers wired to one collaborator. They share nothing else.
pub struct FleetDesk {
    pub vehicles: Arc<VehicleListController>,
    pub chat: Arc<SessionController>,
}

impl FleetDesk {
    pub fn new(remote: Arc<dyn RemoteAccess>, identity: ChatIdentity) -> Self {
        Self {
            vehicles: VehicleListController::new(Arc::clone(&remote)),
            chat: SessionController::new(remote, identity),
        }
    }

    pub fn over_http(base_url: impl Into<String>, identity: ChatIdentity) -> Self {
        Self::new(Arc::new(HttpRemote::new(base_url)), identity)
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
