/// What a cascading delete does when deleting a related entity fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CascadeFailurePolicy {
    /// Keep going, remove the owner, and report every failure in the
    /// [`DeleteReport`](super::DeleteReport).
    #[default]
    Collect,
    /// Stop before the owner's own document is removed.
    Abort,
}

/// Mapper configuration
#[derive(Debug, Clone, Default)]
pub struct MapperConfig {
    pub cascade_failure_policy: CascadeFailurePolicy,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cascade failure policy
    pub fn cascade_failure_policy(mut self, policy: CascadeFailurePolicy) -> Self {
        self.cascade_failure_policy = policy;
        self
    }
}
