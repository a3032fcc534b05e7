//! Scriptable in-memory socket backend for unit tests.

use super::config::SocketConfig;
use super::socket::{RequestHandle, RequestStatus, SocketBackend, SocketError, SocketInterface};
use crate::core::geometry::EngineStructure;
use crate::core::models::result::RawResult;
use nalgebra::Matrix3;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// How a mock interface behaves.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockScript {
    pub fail_open: bool,
    pub fail_stop: bool,
    /// Number of `status` calls answered with `Running` before `Done`.
    /// `None` never completes.
    pub done_after: Option<u32>,
    /// Fixed result; synthesized from the payload's atom count when `None`.
    pub result: Option<RawResult>,
}

/// Everything the mock observed, shared between the backend and all
/// interfaces it opened.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ledger {
    pub opens: u32,
    pub stops: u32,
    pub queued: Vec<RequestHandle>,
    pub released: Vec<RequestHandle>,
    pub status_calls: u32,
    pub last_config: Option<SocketConfig>,
    pub last_payload: Option<EngineStructure>,
}

impl Ledger {
    pub fn outstanding(&self) -> usize {
        self.queued.len() - self.released.len()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MockBackend {
    script: MockScript,
    ledger: Arc<Mutex<Ledger>>,
}

impl MockBackend {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    pub fn completing() -> Self {
        Self::new(MockScript {
            done_after: Some(1),
            ..MockScript::default()
        })
    }

    pub fn ledger(&self) -> Ledger {
        self.ledger.lock().unwrap().clone()
    }
}

impl SocketBackend for MockBackend {
    type Interface = MockInterface;

    fn open(&self, config: &SocketConfig) -> Result<MockInterface, SocketError> {
        if self.script.fail_open {
            return Err(SocketError::Open {
                address: config.address.clone(),
                reason: "address in use".to_string(),
            });
        }
        let mut ledger = self.ledger.lock().unwrap();
        ledger.opens += 1;
        ledger.last_config = Some(config.clone());
        Ok(MockInterface {
            script: self.script.clone(),
            ledger: Arc::clone(&self.ledger),
            next_handle: 0,
            requests: HashMap::new(),
        })
    }
}

#[derive(Debug)]
struct MockRequest {
    n_atoms: usize,
    polls: std::cell::Cell<u32>,
}

#[derive(Debug)]
pub(crate) struct MockInterface {
    script: MockScript,
    ledger: Arc<Mutex<Ledger>>,
    next_handle: u64,
    requests: HashMap<RequestHandle, MockRequest>,
}

impl SocketInterface for MockInterface {
    fn queue(&mut self, structure: EngineStructure) -> Result<RequestHandle, SocketError> {
        let handle = RequestHandle(self.next_handle);
        self.next_handle += 1;
        self.requests.insert(
            handle,
            MockRequest {
                n_atoms: structure.n_atoms(),
                polls: std::cell::Cell::new(0),
            },
        );
        let mut ledger = self.ledger.lock().unwrap();
        ledger.queued.push(handle);
        ledger.last_payload = Some(structure);
        Ok(handle)
    }

    fn status(&self, handle: RequestHandle) -> Result<RequestStatus, SocketError> {
        let request = self
            .requests
            .get(&handle)
            .ok_or(SocketError::UnknownRequest(handle))?;
        self.ledger.lock().unwrap().status_calls += 1;
        let polls = request.polls.get();
        request.polls.set(polls + 1);
        Ok(match self.script.done_after {
            Some(after) if polls >= after => RequestStatus::Done,
            Some(_) => RequestStatus::Running,
            None => RequestStatus::Queued,
        })
    }

    fn result(&self, handle: RequestHandle) -> Result<RawResult, SocketError> {
        let request = self
            .requests
            .get(&handle)
            .ok_or(SocketError::UnknownRequest(handle))?;
        Ok(self.script.result.clone().unwrap_or_else(|| RawResult {
            potential: -1.0,
            forces: vec![0.1; request.n_atoms * 3],
            virial: Matrix3::from_diagonal_element(0.5),
            extra: String::new(),
        }))
    }

    fn release(&mut self, handle: RequestHandle) {
        self.requests.remove(&handle);
        self.ledger.lock().unwrap().released.push(handle);
    }

    fn stop(&mut self) -> Result<(), SocketError> {
        self.ledger.lock().unwrap().stops += 1;
        if self.script.fail_stop {
            return Err(SocketError::Stop("interface refused to stop".to_string()));
        }
        Ok(())
    }
}
