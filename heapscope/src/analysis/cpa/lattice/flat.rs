use crate::analysis::cpa::lattice::{JoinSemiLattice, MeetSemiLattice};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum FlatLattice<C> {
    Bottom,
    Value(C),
    Top,
}

impl<C> From<C> for FlatLattice<C> {
    fn from(value: C) -> Self {
        FlatLattice::Value(value)
    }
}

impl<C: Display> Display for FlatLattice<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FlatLattice::Value(a) => write!(f, "{a}"),
            FlatLattice::Top => write!(f, "Top"),
            FlatLattice::Bottom => write!(f, "Bottom"),
        }
    }
}

impl<C: PartialOrd + PartialEq + Clone> FlatLattice<C> {
    pub fn is_top(&self) -> bool {
        matches!(self, FlatLattice::Top)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, FlatLattice::Bottom)
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, FlatLattice::Value(_))
    }

    pub fn value(&self) -> Option<&C> {
        match self {
            FlatLattice::Value(c) => Some(c),
            _ => None,
        }
    }
}

impl<C: PartialOrd + PartialEq + Clone> PartialOrd for FlatLattice<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (&self, &other) {
            (Self::Top, Self::Top) | (Self::Bottom, Self::Bottom) => Some(Ordering::Equal),
            (Self::Top, _) | (_, Self::Bottom) => Some(Ordering::Greater),
            (_, Self::Top) | (Self::Bottom, _) => Some(Ordering::Less),
            (Self::Value(a), Self::Value(b)) => {
                if a == b {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
        }
    }
}

impl<C: PartialOrd + Eq + Clone> JoinSemiLattice for FlatLattice<C> {
    fn join(&mut self, other: &Self) {
        match (&self, other) {
            (Self::Top, _) => (),
            (_, Self::Top) => *self = Self::Top,
            (_, Self::Bottom) => (),
            (Self::Bottom, _) => *self = other.clone(),
            (Self::Value(a), Self::Value(b)) => {
                if a != b {
                    *self = Self::Top
                }
            }
        };
    }
}

impl<C: PartialOrd + Eq + Clone> MeetSemiLattice for FlatLattice<C> {
    fn meet(&mut self, other: &Self) {
        match (&self, other) {
            (Self::Bottom, _) => (),
            (_, Self::Bottom) => *self = Self::Bottom,
            (_, Self::Top) => (),
            (Self::Top, _) => *self = other.clone(),
            (Self::Value(a), Self::Value(b)) => {
                if a != b {
                    *self = Self::Bottom
                }
            }
        };
    }
}
