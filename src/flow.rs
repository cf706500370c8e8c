// src/flow.rs
//
// Flow-control points. The flow-control tree itself (loops, switches,
// break/continue targets) is an external collaborator; this core only
// mints point handles for label targets and tracks the current point so
// statement analysis can attach labels to it.

/// Opaque handle to a position in the external flow-control tree.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FlowControlPoint(pub u64);

/// Per-function flow-control state owned by the local context.
#[derive(Debug, Default)]
pub struct FlowControl {
    next: u64,
    current: Option<FlowControlPoint>,
}

impl FlowControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh point handle.
    pub fn new_point(&mut self) -> FlowControlPoint {
        let point = FlowControlPoint(self.next);
        self.next += 1;
        point
    }

    pub fn current(&self) -> Option<FlowControlPoint> {
        self.current
    }

    pub fn set_current(&mut self, point: Option<FlowControlPoint>) {
        self.current = point;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_are_distinct() {
        let mut flow = FlowControl::new();
        let a = flow.new_point();
        let b = flow.new_point();
        assert_ne!(a, b);
    }

    #[test]
    fn current_point_tracking() {
        let mut flow = FlowControl::new();
        assert_eq!(flow.current(), None);
        let p = flow.new_point();
        flow.set_current(Some(p));
        assert_eq!(flow.current(), Some(p));
        flow.set_current(None);
        assert_eq!(flow.current(), None);
    }
}
