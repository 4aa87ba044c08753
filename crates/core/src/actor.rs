//! Actor profiles and the active-actor selection
//!
//! An actor is the identity an annotation is attributed to. Each actor owns a
//! color; annotations copy that color when they are created.

use crate::annotation::Color;
use crate::error::{OverlayError, OverlayResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display name of the fallback actor used when no other actor exists.
pub const UNASSIGNED_ACTOR_NAME: &str = "Unassigned";

/// Identifier of an actor within one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broad category of an actor, which picks its default color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Business,
    Government,
    Gym,
    Other,
}

impl ActorKind {
    pub fn default_color(self) -> Color {
        match self {
            ActorKind::Business => Color::rgb(0, 102, 204),
            ActorKind::Government => Color::rgb(0, 153, 0),
            ActorKind::Gym => Color::rgb(204, 102, 0),
            ActorKind::Other => Color::RED,
        }
    }

    /// Parse a kind name case-insensitively; unknown names map to `Other`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "business" => ActorKind::Business,
            "government" => ActorKind::Government,
            "gym" => ActorKind::Gym,
            _ => ActorKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    id: ActorId,
    display_name: String,
    kind: ActorKind,
    color: Color,
}

impl Actor {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

/// Ordered set of actors with exactly one active actor
///
/// The registry is never empty: while no user actor exists it holds the
/// built-in [`UNASSIGNED_ACTOR_NAME`] actor, which is replaced by the first
/// actor added.
#[derive(Debug, Clone)]
pub struct ActorRegistry {
    actors: Vec<Actor>,
    active: ActorId,
    next_id: u64,
    placeholder: Option<ActorId>,
    unique_names: bool,
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::with_unique_names(false)
    }

    /// Create a registry that rejects a second actor with the same display name
    pub fn with_unique_names(unique_names: bool) -> Self {
        let mut registry = Self {
            actors: Vec::new(),
            active: ActorId(0),
            next_id: 1,
            placeholder: None,
            unique_names,
        };
        registry.insert_placeholder();
        registry
    }

    pub fn add_actor(&mut self, display_name: impl Into<String>, color: Color) -> OverlayResult<Actor> {
        self.add_actor_with_kind(display_name, ActorKind::Other, color)
    }

    /// Add an actor whose color comes from its kind's palette entry
    pub fn add_actor_of_kind(
        &mut self,
        display_name: impl Into<String>,
        kind: ActorKind,
    ) -> OverlayResult<Actor> {
        self.add_actor_with_kind(display_name, kind, kind.default_color())
    }

    /// Add an actor with an explicit kind and a color that may differ from its palette entry
    pub fn add_actor_with_kind(
        &mut self,
        display_name: impl Into<String>,
        kind: ActorKind,
        color: Color,
    ) -> OverlayResult<Actor> {
        let display_name = display_name.into();
        let taken = self
            .find_by_name(&display_name)
            .is_some_and(|existing| Some(existing.id) != self.placeholder);
        if self.unique_names && taken {
            return Err(OverlayError::DuplicateActorName(display_name));
        }

        let actor = Actor { id: self.allocate_id(), display_name, kind, color };

        if let Some(placeholder) = self.placeholder.take() {
            self.actors.retain(|existing| existing.id != placeholder);
            self.active = actor.id;
        }

        self.actors.push(actor.clone());
        log::debug!("added actor {} ({})", actor.id, actor.display_name);
        Ok(actor)
    }

    /// Remove an actor; annotations already attributed to it are unaffected
    pub fn remove_actor(&mut self, id: ActorId) -> OverlayResult<Actor> {
        let position = self.position(id)?;
        let removed = self.actors.remove(position);

        if self.placeholder == Some(id) {
            self.placeholder = None;
        }

        if self.actors.is_empty() {
            self.insert_placeholder();
        } else if self.active == id {
            self.active = self.actors[0].id;
        }

        log::debug!(
            "removed actor {} ({}); active is now {}",
            removed.id,
            removed.display_name,
            self.active
        );
        Ok(removed)
    }

    pub fn set_active(&mut self, id: ActorId) -> OverlayResult<()> {
        self.position(id)?;
        self.active = id;
        log::debug!("active actor set to {id}");
        Ok(())
    }

    pub fn active(&self) -> &Actor {
        // The active id always refers to a present actor; fall back to the
        // first entry so a broken invariant cannot panic.
        self.actors
            .iter()
            .find(|actor| actor.id == self.active)
            .unwrap_or(&self.actors[0])
    }

    /// Reassign an actor's color; only annotations created afterwards pick it up
    pub fn set_color(&mut self, id: ActorId, color: Color) -> OverlayResult<()> {
        let position = self.position(id)?;
        self.actors[position].color = color;
        Ok(())
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    pub fn find_by_name(&self, display_name: &str) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.display_name == display_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Whether only the built-in fallback actor is present
    pub fn has_only_placeholder(&self) -> bool {
        self.placeholder.is_some() && self.actors.len() == 1
    }

    fn insert_placeholder(&mut self) {
        let actor = Actor {
            id: self.allocate_id(),
            display_name: UNASSIGNED_ACTOR_NAME.to_owned(),
            kind: ActorKind::Other,
            color: Color::GRAY,
        };
        self.active = actor.id;
        self.placeholder = Some(actor.id);
        self.actors.push(actor);
    }

    fn allocate_id(&mut self) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id += 1;
        id
    }

    fn position(&self, id: ActorId) -> OverlayResult<usize> {
        self.actors
            .iter()
            .position(|actor| actor.id == id)
            .ok_or(OverlayError::ActorNotFound(id))
    }
}
