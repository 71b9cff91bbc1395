use std::fmt;

/// Lifecycle phase of a [`crate::Task`].
///
/// Phases only move forward: `Init -> Main -> Extra`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Phase {
    /// Constructed, no round handed out yet.
    #[default]
    Init,
    /// The main round's URLs were handed out; slots are being filled.
    Main,
    /// The extra round's URLs were handed out; slots are being augmented.
    Extra,
}

impl Phase {
    /// The phase that follows `self`, if any.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Init => Some(Phase::Main),
            Phase::Main => Some(Phase::Extra),
            Phase::Extra => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "init"),
            Phase::Main => write!(f, "main"),
            Phase::Extra => write!(f, "extra"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Phase;

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Init < Phase::Main);
        assert!(Phase::Main < Phase::Extra);
    }

    #[test]
    fn next_stops_after_extra() {
        assert_eq!(Phase::Init.next(), Some(Phase::Main));
        assert_eq!(Phase::Main.next(), Some(Phase::Extra));
        assert_eq!(Phase::Extra.next(), None);
    }
}
