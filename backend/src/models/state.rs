//! Actor roster for one iteration context
//!
//! # Critical Invariants
//!
//! 1. Actor names are unique
//! 2. `actors[i].id == ActorId(i)`

use crate::core::ActorId;
use crate::models::actor::{Actor, ActorKind};
use std::collections::HashMap;

/// All actors of a simulation, players first then targets
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    actors: Vec<Actor>,
    by_name: HashMap<String, ActorId>,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor, assigning its id
    pub fn add(&mut self, mut actor: Actor) -> ActorId {
        let id = ActorId(self.actors.len());
        actor.id = id;
        self.by_name.insert(actor.name.clone(), id);
        self.actors.push(actor);
        id
    }

    pub fn get(&self, id: ActorId) -> &Actor {
        &self.actors[id.0]
    }

    pub fn get_mut(&mut self, id: ActorId) -> &mut Actor {
        &mut self.actors[id.0]
    }

    pub fn find(&self, name: &str) -> Option<ActorId> {
        self.by_name.get(name).copied()
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actors_mut(&mut self) -> &mut [Actor] {
        &mut self.actors
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn players(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter().filter(|a| a.kind == ActorKind::Player)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter().filter(|a| a.kind == ActorKind::Target)
    }

    /// Living targets in declaration order
    pub fn alive_targets(&self) -> Vec<ActorId> {
        self.targets().filter(|a| a.alive).map(|a| a.id).collect()
    }

    /// First declared target, used for health-based stop conditions
    pub fn primary_target(&self) -> Option<ActorId> {
        self.targets().next().map(|a| a.id)
    }

    /// True when every target that can die is dead, and at least one can
    pub fn all_mortal_targets_dead(&self) -> bool {
        let mut mortal = self.targets().filter(|a| a.has_finite_health()).peekable();
        mortal.peek().is_some() && mortal.all(|a| !a.alive)
    }

    pub fn reset(&mut self) {
        for actor in &mut self.actors {
            actor.reset();
        }
    }
}
