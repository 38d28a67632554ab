use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two fixed stimulus positions.
///
/// `A` is drawn on the left of the fixation cross and `B` on the right; the
/// exported `circle` column uses those historical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "left")]
    A,
    #[serde(rename = "right")]
    B,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::A, Side::B];

    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Label written to the `circle` column of the export.
    pub fn label(self) -> &'static str {
        match self {
            Side::A => "left",
            Side::B => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
