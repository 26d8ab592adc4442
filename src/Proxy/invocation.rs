use std::fmt;

use super::argument::{ArgumentHolder, MethodId};
use crate::Core::sequence::INITIAL_CURSOR_VALUE;

/// The ring-buffer event carrying one captured call.
#[derive(Default)]
pub struct ProxyMethodInvocation {
    /// Sequence the call was published under.
    pub sequence: i64,
    pub method: MethodId,
    pub arguments: ArgumentHolder,
}

impl ProxyMethodInvocation {
    /// Event factory for proxy disruptors.
    pub fn new() -> Self {
        Self {
            sequence: INITIAL_CURSOR_VALUE,
            method: MethodId::default(),
            arguments: ArgumentHolder::default(),
        }
    }

    pub fn reset(&mut self) {
        self.arguments.clear();
    }
}

impl fmt::Debug for ProxyMethodInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyMethodInvocation")
            .field("sequence", &self.sequence)
            .field("method", &self.method.0)
            .field("arguments", &self.arguments)
            .finish()
    }
}
