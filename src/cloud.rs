//! Mirror of users and tasks on a remote spreadsheet-backed endpoint.
//!
//! The endpoint speaks plain JSON: GET returns everything that was last
//! posted (or an empty array when nothing was), POST replaces everything.

use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TrackerError};
use crate::model::Snapshot;

/// A remote copy of the shared state.
pub trait CloudSync {
    /// Fetch the remote document. `Ok(None)` means there is no remote.
    fn load(&self) -> Result<Option<serde_json::Value>>;

    /// Replace the remote document with `snapshot`.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// No remote at all.
pub struct Offline;

impl CloudSync for Offline {
    fn load(&self) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    fn save(&self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }
}

/// HTTP client for the sheet endpoint.
pub struct SheetClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl SheetClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        SheetClient {
            endpoint: endpoint.into(),
            agent,
        }
    }
}

impl CloudSync for SheetClient {
    fn load(&self) -> Result<Option<serde_json::Value>> {
        debug!(endpoint = %self.endpoint, "fetching cloud data");
        let resp = self
            .agent
            .get(&self.endpoint)
            .call()
            .map_err(|e| TrackerError::Network(format!("load failed: {}", e)))?;
        let value = resp
            .into_json::<serde_json::Value>()
            .map_err(|e| TrackerError::Network(format!("unreadable cloud response: {}", e)))?;
        Ok(Some(value))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        debug!(
            endpoint = %self.endpoint,
            users = snapshot.users.len(),
            tasks = snapshot.tasks.len(),
            "pushing cloud data"
        );
        self.agent
            .post(&self.endpoint)
            .send_json(serde_json::to_value(snapshot)?)
            .map_err(|e| TrackerError::Network(format!("save failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// A fake remote that serves a fixed document and records pushes.
    #[derive(Clone, Default)]
    pub struct Recorder {
        pub remote: Rc<RefCell<Option<serde_json::Value>>>,
        pub pushes: Rc<RefCell<Vec<Snapshot>>>,
        pub fail: bool,
    }

    impl Recorder {
        pub fn serving(value: serde_json::Value) -> Self {
            Recorder {
                remote: Rc::new(RefCell::new(Some(value))),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Recorder {
                fail: true,
                ..Default::default()
            }
        }

        pub fn push_count(&self) -> usize {
            self.pushes.borrow().len()
        }
    }

    impl CloudSync for Recorder {
        fn load(&self) -> Result<Option<serde_json::Value>> {
            if self.fail {
                return Err(TrackerError::Network("unreachable".into()));
            }
            Ok(self.remote.borrow().clone())
        }

        fn save(&self, snapshot: &Snapshot) -> Result<()> {
            if self.fail {
                return Err(TrackerError::Network("unreachable".into()));
            }
            self.pushes.borrow_mut().push(snapshot.clone());
            Ok(())
        }
    }
}
