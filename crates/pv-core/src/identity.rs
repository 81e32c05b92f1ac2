//! # Class Identity
//!
//! Classes are registered explicitly with the metadata store and addressed
//! by a [`ClassId`] handle afterwards. The handle is an index into the
//! store's arena, so it is only meaningful for the store that issued it.

use serde::{Deserialize, Serialize};

/// Handle to a class registered in a metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Arena index of this class.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "class:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_prefixed() {
        assert_eq!(ClassId(7).to_string(), "class:7");
    }

    #[test]
    fn index_matches_inner() {
        assert_eq!(ClassId(3).index(), 3);
    }
}
