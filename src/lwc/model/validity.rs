/// Why a cached artifact was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    Initial,
    Points,
    BaseIndex,
    Width,
    Height,
    BarSpacing,
    RightOffset,
    Options,
    Sources,
    Mode,
    Margins,
    Gesture,
}

/// A lazily recomputed value: either fresh or waiting for the next read.
#[derive(Debug, Clone, PartialEq)]
pub enum Validity<T> {
    Clean(T),
    Dirty(InvalidationReason),
}

impl<T> Default for Validity<T> {
    fn default() -> Self {
        Self::Dirty(InvalidationReason::Initial)
    }
}

impl<T> Validity<T> {
    /// Marks the value stale; the first reason wins while already dirty.
    pub fn invalidate(&mut self, reason: InvalidationReason) {
        if let Self::Clean(_) = self {
            *self = Self::Dirty(reason);
        }
    }

    pub fn set(&mut self, value: T) {
        *self = Self::Clean(value);
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        matches!(self, Self::Dirty(_))
    }

    #[must_use]
    pub fn clean(&self) -> Option<&T> {
        match self {
            Self::Clean(value) => Some(value),
            Self::Dirty(_) => None,
        }
    }

    #[must_use]
    pub fn dirty_reason(&self) -> Option<InvalidationReason> {
        match self {
            Self::Clean(_) => None,
            Self::Dirty(reason) => Some(*reason),
        }
    }
}
