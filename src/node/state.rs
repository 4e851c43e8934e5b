//! Node lifecycle state machine

/// Node lifecycle phase
///
/// `Idle` while topics are being declared, `Running` once handed to the
/// discovery layer, `Stopped` after shutdown. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    /// Declared but not yet registered
    Idle,
    /// Registered and serving discovery callbacks
    Running,
    /// Shut down; publications released
    Stopped,
}

impl NodePhase {
    /// Phase after starting, if the transition is allowed
    pub fn start(self) -> Option<NodePhase> {
        match self {
            NodePhase::Idle => Some(NodePhase::Running),
            NodePhase::Running | NodePhase::Stopped => None,
        }
    }

    /// Phase after stopping, if the transition is allowed
    pub fn stop(self) -> Option<NodePhase> {
        match self {
            NodePhase::Idle | NodePhase::Running => Some(NodePhase::Stopped),
            NodePhase::Stopped => None,
        }
    }

    /// Check if the node has shut down
    pub fn is_stopped(self) -> bool {
        self == NodePhase::Stopped
    }
}

impl std::fmt::Display for NodePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodePhase::Idle => "idle",
            NodePhase::Running => "running",
            NodePhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_lifecycle() {
        let phase = NodePhase::Idle;

        let phase = phase.start().unwrap();
        assert_eq!(phase, NodePhase::Running);
        assert!(phase.start().is_none());

        let phase = phase.stop().unwrap();
        assert!(phase.is_stopped());
        assert!(phase.stop().is_none());
        assert!(phase.start().is_none());
    }

    #[test]
    fn test_stop_from_idle() {
        assert_eq!(NodePhase::Idle.stop(), Some(NodePhase::Stopped));
    }
}
