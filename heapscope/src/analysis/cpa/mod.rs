pub mod lattice;
pub mod state;

use crate::analysis::cpa::state::MergeOutcome;
use crate::error::HeapError;
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::trace;

/**
A trait representing Configurable Program Analysis, a tunable unified framework for
dataflow and model checking algorithms. This implementation is based on the presentation of
CPA contained in Chapter 16 of
[The Handbook of Model Checking](https://link.springer.com/book/10.1007/978-3-319-10575-8)

Here the analysis keeps one abstract state per location (the state on entry to a basic block).
A location's state is pushed through the location to get its exit state, then through each
outgoing edge; whatever arrives at a location that was already reached is merged into the
state found there. The algorithm terminates when no merge changes any reached state.
Termination relies on the merge eventually widening; [`Self::max_iterations`] bounds the number
of processed locations regardless.
*/
pub trait ConfigurableProgramAnalysis {
    type State: Clone + Debug;
    type Location: Copy + Eq + Hash + Debug;
    type Edge: Copy + Debug;

    /// Outgoing edges of a location with their targets.
    fn successors(&self, location: Self::Location) -> Vec<(Self::Edge, Self::Location)>;

    /// The state on exit of `location` given the state on its entry.
    fn transfer(
        &mut self,
        location: Self::Location,
        state: &Self::State,
    ) -> Result<Self::State, HeapError>;

    /// The state arriving along `edge` given the exit state of its source.
    fn convert_edge(
        &mut self,
        edge: Self::Edge,
        state: &Self::State,
    ) -> Result<Self::State, HeapError>;

    /// Merge `incoming`, arriving along `edge`, into the state already reached at `location`.
    fn merge(
        &mut self,
        location: Self::Location,
        reached: &mut Self::State,
        incoming: &Self::State,
        edge: Self::Edge,
    ) -> Result<MergeOutcome, HeapError>;

    /// A hook for the first state arriving at a location.
    fn reached(&mut self, _location: Self::Location, _edge: Self::Edge, _state: &Self::State) {}

    fn max_iterations(&self) -> usize;

    /// The CPA algorithm. Implementors should not need to customize this function.
    ///
    /// Returns the fixpoint state on entry of every reached location.
    fn run_cpa(
        &mut self,
        entry: Self::Location,
        initial: Self::State,
    ) -> Result<HashMap<Self::Location, Self::State>, HeapError> {
        let mut reached: HashMap<Self::Location, Self::State> = HashMap::new();
        let mut waitlist: VecDeque<Self::Location> = VecDeque::new();
        reached.insert(entry, initial);
        waitlist.push_back(entry);
        let mut visits = 0;
        while let Some(location) = waitlist.pop_front() {
            visits += 1;
            if visits > self.max_iterations() {
                return Err(HeapError::IterationLimit(self.max_iterations()));
            }
            let Some(state) = reached.get(&location).cloned() else {
                continue;
            };
            trace!(?location, "visiting");
            let exit = self.transfer(location, &state)?;
            for (edge, target) in self.successors(location) {
                let incoming = self.convert_edge(edge, &exit)?;
                match reached.get_mut(&target) {
                    None => {
                        self.reached(target, edge, &incoming);
                        reached.insert(target, incoming);
                        waitlist.push_back(target);
                    }
                    Some(existing) => {
                        if self.merge(target, existing, &incoming, edge)?.merged()
                            && !waitlist.contains(&target)
                        {
                            waitlist.push_back(target);
                        }
                    }
                }
            }
        }
        Ok(reached)
    }
}
