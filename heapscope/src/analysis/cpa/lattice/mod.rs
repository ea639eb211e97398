pub mod flat;

pub trait JoinSemiLattice: Eq + PartialOrd {
    fn join(&mut self, other: &Self);

    /// An upper bound of `self` and `other` that guarantees stabilization when applied
    /// repeatedly. Lattices of finite height can simply join.
    fn widen(&mut self, other: &Self) {
        self.join(other)
    }
}

pub trait MeetSemiLattice: Eq + PartialOrd {
    fn meet(&mut self, other: &Self);
}

impl<S1, S2> JoinSemiLattice for (S1, S2)
where
    S1: JoinSemiLattice,
    S2: JoinSemiLattice,
{
    fn join(&mut self, other: &Self) {
        self.0.join(&other.0);
        self.1.join(&other.1);
    }

    fn widen(&mut self, other: &Self) {
        self.0.widen(&other.0);
        self.1.widen(&other.1);
    }
}
