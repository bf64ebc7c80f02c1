// ── Ingestion boundary ──
//
// The narrow contract an event source (mail poller, webhook, file replay)
// uses to feed the engine. Sources own parsing and validation; the engine
// takes whatever well-formed events it is given.

use crate::engine::AlertEngine;
use crate::model::BuildEvent;

/// Consumer of new build events.
pub trait BuildEventProcessor: Send + Sync {
    fn process(&self, events: &[BuildEvent]);
}

impl BuildEventProcessor for AlertEngine {
    fn process(&self, events: &[BuildEvent]) {
        AlertEngine::process(self, events);
    }
}
