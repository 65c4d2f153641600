//! Per-tick system ordering with explicit run-after constraints.
//!
//! Systems form a DAG: an edge `a -> b` means "b runs after a". The order is
//! fixed once at build time by repeatedly taking the frontier, the systems
//! whose dependencies have all been placed. Within one frontier, insertion
//! order breaks ties so the result is deterministic.

use std::collections::HashSet;

use slotmap::{SlotMap, new_key_type};

use crate::error::ScheduleError;

new_key_type! {
    /// Handle for a system in a built schedule.
    pub struct SystemId;
}

struct PendingSystem<S> {
    name: String,
    after: Vec<String>,
    system: S,
}

pub struct ScheduleBuilder<S> {
    pending: Vec<PendingSystem<S>>,
}

impl<S> ScheduleBuilder<S> {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    /// Add a system that must run after every system named in `after`.
    pub fn add(&mut self, name: impl Into<String>, after: &[&str], system: S) -> &mut Self {
        self.pending.push(PendingSystem {
            name: name.into(),
            after: after.iter().map(|s| s.to_string()).collect(),
            system,
        });
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pending.iter().any(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.pending.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn build(self) -> Result<TickSchedule<S>, ScheduleError> {
        let mut seen = HashSet::new();
        for p in &self.pending {
            if !seen.insert(p.name.as_str()) {
                return Err(ScheduleError::DuplicateSystem(p.name.clone()));
            }
        }
        for p in &self.pending {
            if let Some(missing) = p.after.iter().find(|d| !seen.contains(d.as_str())) {
                return Err(ScheduleError::UnknownDependency {
                    system: p.name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut placed: HashSet<String> = HashSet::new();
        let mut order: Vec<usize> = Vec::with_capacity(self.pending.len());
        loop {
            let frontier: Vec<usize> = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, p)| {
                    !placed.contains(&p.name) && p.after.iter().all(|d| placed.contains(d))
                })
                .map(|(i, _)| i)
                .collect();
            if frontier.is_empty() {
                break;
            }
            for i in frontier {
                placed.insert(self.pending[i].name.clone());
                order.push(i);
            }
        }

        if order.len() < self.pending.len() {
            let stuck = self
                .pending
                .iter()
                .filter(|p| !placed.contains(&p.name))
                .map(|p| p.name.clone())
                .collect();
            return Err(ScheduleError::Cycle(stuck));
        }

        let mut slots: Vec<Option<PendingSystem<S>>> = self.pending.into_iter().map(Some).collect();
        let mut systems = SlotMap::with_key();
        let mut ids = Vec::with_capacity(order.len());
        for i in order {
            if let Some(p) = slots[i].take() {
                ids.push(systems.insert(ScheduledSystem {
                    name: p.name,
                    system: p.system,
                }));
            }
        }
        Ok(TickSchedule { systems, order: ids })
    }
}

impl<S> Default for ScheduleBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

struct ScheduledSystem<S> {
    name: String,
    system: S,
}

/// A fixed execution order over systems of type `S`.
pub struct TickSchedule<S> {
    systems: SlotMap<SystemId, ScheduledSystem<S>>,
    order: Vec<SystemId>,
}

impl<S> TickSchedule<S> {
    pub fn builder() -> ScheduleBuilder<S> {
        ScheduleBuilder::new()
    }

    /// Systems in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &S)> + '_ {
        self.order.iter().filter_map(|id| {
            self.systems
                .get(*id)
                .map(|s| (s.name.as_str(), &s.system))
        })
    }

    /// System names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|(name, _)| name).collect()
    }

    /// Position of `name` in the execution order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.iter().position(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
