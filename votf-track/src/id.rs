// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Id

/// IDs that should be unique across a [`Tracker`](crate::Tracker)
///
/// Each _log_/_trace_ event is given a unique ID to identify the entity
/// that emitted it. There are two reserved ID values:
/// [NO_ID](crate::NO_ID) and [ROOT](crate::ROOT)
#[derive(Copy, Clone, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Id(pub u64);

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Id {
    fn from(val: u64) -> Self {
        Id(val)
    }
}
