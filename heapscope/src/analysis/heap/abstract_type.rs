use crate::analysis::cpa::lattice::flat::FlatLattice;
use crate::analysis::cpa::lattice::{JoinSemiLattice, MeetSemiLattice};
use heapscope_il::TypeId;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// The label of an e-graph node: what is known about a value's type, and whether it is the
/// zero/null/default constant.
///
/// `is_zero` is kept apart from the type so that a zero compared against a reference slot
/// and one compared against an integer slot are the same fact.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct AbstractType {
    pub ty: FlatLattice<TypeId>,
    pub is_zero: bool,
}

impl AbstractType {
    pub const TOP: AbstractType = AbstractType {
        ty: FlatLattice::Top,
        is_zero: false,
    };

    pub const BOTTOM: AbstractType = AbstractType {
        ty: FlatLattice::Bottom,
        is_zero: true,
    };

    /// The label of the canonical null/zero constants.
    pub const ZERO: AbstractType = AbstractType {
        ty: FlatLattice::Top,
        is_zero: true,
    };

    pub fn of_type(ty: TypeId) -> Self {
        Self {
            ty: FlatLattice::Value(ty),
            is_zero: false,
        }
    }

    pub fn zero_of(ty: TypeId) -> Self {
        Self {
            ty: FlatLattice::Value(ty),
            is_zero: true,
        }
    }

    pub fn is_top(&self) -> bool {
        !self.is_zero && self.ty.is_top()
    }

    pub fn is_bottom(&self) -> bool {
        self.is_zero && self.ty.is_bottom()
    }

    pub fn is_normal(&self) -> bool {
        self.ty.is_normal()
    }

    pub fn declared_type(&self) -> Option<TypeId> {
        self.ty.value().copied()
    }

    /// Record a type for a value whose type was unknown. A known type is never replaced.
    pub fn refine_type(&mut self, ty: TypeId) {
        if self.ty.is_top() {
            self.ty = FlatLattice::Value(ty);
        }
    }

    pub fn less_equal(&self, other: &Self) -> bool {
        self <= other
    }
}

impl Default for AbstractType {
    fn default() -> Self {
        Self::TOP
    }
}

impl PartialOrd for AbstractType {
    /// Ordered by information: zero is below non-zero, bottom is below everything.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_bottom() {
            return Some(if other.is_bottom() {
                Ordering::Equal
            } else {
                Ordering::Less
            });
        }
        if other.is_bottom() {
            return Some(Ordering::Greater);
        }
        let zero = other.is_zero.cmp(&self.is_zero);
        match (zero, self.ty.partial_cmp(&other.ty)?) {
            (Ordering::Equal, o) => Some(o),
            (z, Ordering::Equal) => Some(z),
            (z, o) if z == o => Some(z),
            _ => None,
        }
    }
}

impl JoinSemiLattice for AbstractType {
    fn join(&mut self, other: &Self) {
        if other.is_bottom() {
            return;
        }
        if self.is_bottom() {
            *self = *other;
            return;
        }
        self.is_zero &= other.is_zero;
        self.ty.join(&other.ty);
    }
}

impl MeetSemiLattice for AbstractType {
    fn meet(&mut self, other: &Self) {
        if self.is_bottom() || other.is_top() {
            return;
        }
        if other.is_bottom() || self.is_top() {
            *self = *other;
            return;
        }
        self.is_zero |= other.is_zero;
        let mut ty = self.ty;
        ty.meet(&other.ty);
        if ty.is_bottom() && self.is_zero {
            // zero inhabits every type, so differently typed zeros do not conflict
            self.ty.join(&other.ty);
        } else {
            self.ty = ty;
        }
    }
}

impl Display for AbstractType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_bottom() {
            return write!(f, "Bottom");
        }
        match &self.ty {
            FlatLattice::Value(t) => write!(f, "{t}")?,
            other => write!(f, "{other}")?,
        }
        if self.is_zero {
            write!(f, " (zero)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_bottom_invariants() {
        assert!(AbstractType::TOP.is_top());
        assert!(!AbstractType::TOP.is_bottom());
        assert!(AbstractType::BOTTOM.is_bottom());
        assert!(!AbstractType::BOTTOM.is_top());
        assert!(!AbstractType::ZERO.is_top());
        assert!(!AbstractType::ZERO.is_bottom());
    }

    #[test]
    fn test_join_zero_with_bottom_keeps_type() {
        let mut a = AbstractType::BOTTOM;
        a.join(&AbstractType::zero_of(TypeId(4)));
        assert_eq!(a, AbstractType::zero_of(TypeId(4)));

        let mut b = AbstractType::zero_of(TypeId(4));
        b.join(&AbstractType::BOTTOM);
        assert_eq!(b, AbstractType::zero_of(TypeId(4)));
    }

    #[test]
    fn test_join_non_zero() {
        let mut a = AbstractType::of_type(TypeId(1));
        a.join(&AbstractType::of_type(TypeId(1)));
        assert_eq!(a, AbstractType::of_type(TypeId(1)));
        a.join(&AbstractType::of_type(TypeId(2)));
        assert!(a.is_top());

        let mut z = AbstractType::zero_of(TypeId(1));
        z.join(&AbstractType::of_type(TypeId(1)));
        assert_eq!(z, AbstractType::of_type(TypeId(1)));
    }

    #[test]
    fn test_meet() {
        let mut a = AbstractType::TOP;
        a.meet(&AbstractType::zero_of(TypeId(3)));
        assert_eq!(a, AbstractType::zero_of(TypeId(3)));

        let mut b = AbstractType::of_type(TypeId(3));
        b.meet(&AbstractType::ZERO);
        assert_eq!(b, AbstractType::zero_of(TypeId(3)));

        let mut c = AbstractType::of_type(TypeId(3));
        c.meet(&AbstractType::BOTTOM);
        assert!(c.is_bottom());
    }

    #[test]
    fn test_meet_of_differently_typed_zeros_is_zero() {
        let mut a = AbstractType::zero_of(TypeId(3));
        a.meet(&AbstractType::zero_of(TypeId(4)));
        assert_eq!(a, AbstractType::ZERO);
        assert!(!a.is_bottom());

        let mut b = AbstractType::of_type(TypeId(3));
        b.meet(&AbstractType::zero_of(TypeId(4)));
        assert!(b.is_zero);
        assert!(!b.is_bottom());
    }

    #[test]
    fn test_order() {
        let int = AbstractType::of_type(TypeId(3));
        let zero_int = AbstractType::zero_of(TypeId(3));
        assert!(zero_int.less_equal(&int));
        assert!(!int.less_equal(&zero_int));
        assert!(int.less_equal(&AbstractType::TOP));
        assert!(AbstractType::BOTTOM.less_equal(&zero_int));
        assert!(!AbstractType::of_type(TypeId(4)).less_equal(&int));
    }

    #[test]
    fn test_refine_only_unknown() {
        let mut a = AbstractType::ZERO;
        a.refine_type(TypeId(2));
        assert_eq!(a, AbstractType::zero_of(TypeId(2)));
        a.refine_type(TypeId(5));
        assert_eq!(a.declared_type(), Some(TypeId(2)));
    }
}
