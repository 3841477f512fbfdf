//! Options that control linking and execution.

/// The configuration threaded through allocate, verify, step and reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Upper bound on the number of primitive steps in a single cycle.
    /// `None` means that the host does not bound the cycle.
    pub max_steps_per_cycle: Option<u64>,

    /// Upper bound on the depth of the cursor call stack.
    pub max_call_depth: usize,

    /// Emits a trace record for every primitive step.
    pub trace_steps: bool,

    /// Treats warnings from linking as errors.
    pub warnings_as_errors: bool,
}

impl RuntimeConfig {
    pub fn with_max_steps_per_cycle(mut self, steps: u64) -> Self {
        self.max_steps_per_cycle = Some(steps);
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_trace_steps(mut self, trace: bool) -> Self {
        self.trace_steps = trace;
        self
    }

    pub fn with_warnings_as_errors(mut self, warnings_as_errors: bool) -> Self {
        self.warnings_as_errors = warnings_as_errors;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps_per_cycle: None,
            max_call_depth: 1024,
            trace_steps: false,
            warnings_as_errors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeConfig;

    #[test]
    fn default_when_created_then_cycle_is_unbounded() {
        let config = RuntimeConfig::default();
        assert_eq!(None, config.max_steps_per_cycle);
        assert_eq!(1024, config.max_call_depth);
    }

    #[test]
    fn with_max_steps_per_cycle_when_set_then_bounded() {
        let config = RuntimeConfig::default()
            .with_max_steps_per_cycle(50)
            .with_warnings_as_errors(true);
        assert_eq!(Some(50), config.max_steps_per_cycle);
        assert!(config.warnings_as_errors);
    }
}
