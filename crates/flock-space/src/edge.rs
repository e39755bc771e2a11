//! Boundary behavior for lattice backends.

/// How a lattice treats coordinates past its edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgeBehavior {
    /// Out-of-range coordinates are rejected; neighborhoods are clipped.
    #[default]
    Absorb,
    /// Coordinates wrap modulo the axis length (torus).
    Wrap,
}

impl EdgeBehavior {
    /// `Wrap` when `torus` is set, `Absorb` otherwise.
    pub fn from_torus(torus: bool) -> Self {
        if torus {
            Self::Wrap
        } else {
            Self::Absorb
        }
    }

    /// Whether coordinates wrap.
    pub fn is_torus(self) -> bool {
        self == Self::Wrap
    }
}

/// Resolve one axis value under the given edge behavior.
/// Returns `None` for an out-of-range value on an absorbing edge.
pub(crate) fn resolve_axis(val: i32, len: u32, edge: EdgeBehavior) -> Option<i32> {
    let n = len as i32;
    if (0..n).contains(&val) {
        return Some(val);
    }
    match edge {
        EdgeBehavior::Absorb => None,
        EdgeBehavior::Wrap => Some(val.rem_euclid(n)),
    }
}
