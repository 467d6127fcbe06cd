//! Power management abstraction

/// Low-power states a driver can forbid while it is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerConstraint {
    /// Keep the device out of standby (LPM3 and below)
    DisallowStandby,
    /// Keep the device out of deep sleep (LPM4 and below)
    DisallowDeepSleep,
}

/// Power manager trait
///
/// Constraints are reference counted by the implementation; every
/// `acquire_constraint` must be paired with exactly one
/// `release_constraint` of the same kind.
pub trait PowerManager: Send {
    /// Forbid the low-power state named by `constraint`
    fn acquire_constraint(&mut self, constraint: PowerConstraint);

    /// Lift one previously acquired `constraint`
    fn release_constraint(&mut self, constraint: PowerConstraint);
}
