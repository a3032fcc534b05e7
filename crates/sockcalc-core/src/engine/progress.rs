use super::socket::RequestHandle;
use super::state::{ClientState, TeardownReason};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StateChanged { from: ClientState, to: ClientState },

    SessionStarted { pid: u32, n_atoms: usize },
    RequestQueued { handle: RequestHandle },
    RequestCompleted { handle: RequestHandle, polls: u32 },

    TeardownStarted { reason: TeardownReason },
    SessionClosed { exit_code: Option<i32> },
}

pub type EventCallback = Box<dyn Fn(ClientEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventReporter {
    callback: Option<EventCallback>,
}

impl EventReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: EventCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: ClientEvent) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
