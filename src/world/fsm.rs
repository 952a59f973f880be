//! Generic state-machine executor: a legal-transition table with
//! enter/leave/step hooks and duration tracking. The state set itself
//! is data supplied by the caller, not hard-coded here.

/// Hook table for one state. `flow` lists the states an unforced `set`
/// may move into; a state with an empty flow is terminal unless a
/// forced transition pulls it out.
pub struct StateDef<K: 'static, E: 'static, C: 'static> {
    pub flow: &'static [K],
    pub enter: Option<fn(&mut E, &mut C)>,
    pub leave: Option<fn(&mut E, &mut C)>,
    pub step: Option<fn(f32, &mut E, &mut StateMachine<K, E, C>, &mut C)>,
}

pub struct StateTable<K: 'static, E: 'static, C: 'static> {
    pub states: &'static [(K, StateDef<K, E, C>)],
}

impl<K: Copy + PartialEq, E, C> StateTable<K, E, C> {
    fn def(&self, state: K) -> Option<&'static StateDef<K, E, C>> {
        self.states
            .iter()
            .find(|(key, _)| *key == state)
            .map(|(_, def)| def)
    }
}

/// Executor for one entity. The table is static, so the machine is
/// `Copy`: owners lend it out for a step and write it back, which lets
/// step hooks receive both the entity and the machine mutably.
pub struct StateMachine<K: 'static, E: 'static, C: 'static> {
    table: &'static StateTable<K, E, C>,
    pub state: K,
    pub duration: f32,
}

impl<K: Copy + PartialEq, E, C> Clone for StateMachine<K, E, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: Copy + PartialEq, E, C> Copy for StateMachine<K, E, C> {}

impl<K: Copy + PartialEq, E, C> StateMachine<K, E, C> {
    pub fn new(table: &'static StateTable<K, E, C>, first: K) -> Self {
        Self {
            table,
            state: first,
            duration: 0.0,
        }
    }

    /// Requests a transition. A no-op when `next` is the current state
    /// or absent from the current state's flow; speculative calls from
    /// overlapping input paths are legal and silent.
    pub fn set(&mut self, next: K, entity: &mut E, ctx: &mut C) {
        if next == self.state {
            return;
        }
        let allowed = self
            .table
            .def(self.state)
            .is_some_and(|def| def.flow.contains(&next));
        if !allowed {
            return;
        }
        self.transition(next, entity, ctx);
    }

    /// Transition bypassing the flow check. Used for terminal-izing
    /// moves such as death.
    pub fn set_forced(&mut self, next: K, entity: &mut E, ctx: &mut C) {
        if next == self.state {
            return;
        }
        self.transition(next, entity, ctx);
    }

    fn transition(&mut self, next: K, entity: &mut E, ctx: &mut C) {
        if let Some(leave) = self.table.def(self.state).and_then(|d| d.leave) {
            leave(entity, ctx);
        }
        self.state = next;
        self.duration = 0.0;
        if let Some(enter) = self.table.def(next).and_then(|d| d.enter) {
            enter(entity, ctx);
        }
    }

    /// Advances the duration and runs the current state's step hook.
    /// The hook may itself call `set`; transitions run synchronously.
    pub fn step(&mut self, dt: f32, entity: &mut E, ctx: &mut C) {
        self.duration += dt;
        if let Some(step) = self.table.def(self.state).and_then(|d| d.step) {
            step(dt, entity, self, ctx);
        }
    }
}
