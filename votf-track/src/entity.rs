// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Named owners of log output.
//!
//! The ring manager, its hardware access layer, the platform loader and the
//! scenario runner each hold an [`Entity`]. Entities form a tree below a
//! single [`toplevel`] entity and their dotted path (`top::votf::hw`) is what
//! the regular expression filters of a tracker are matched against.

use std::fmt;
use std::sync::Arc;

use crate::{Id, Tracker, create, destroy};

const SEPARATOR: &str = "::";

/// A node in the entity tree.
///
/// The path is computed once when the entity is created because it is
/// needed for every filter lookup, whereas entities are never renamed or
/// moved.
pub struct Entity {
    /// Last component of the path.
    pub name: String,

    /// `None` only for the top-level entity.
    pub parent: Option<Arc<Entity>>,

    pub id: Id,

    /// Where this entity's events go. Shared with the whole tree.
    pub tracker: Tracker,

    path: String,
}

impl Entity {
    /// Create an entity below `parent`, sharing its tracker.
    #[must_use]
    pub fn new(parent: &Arc<Entity>, name: &str) -> Self {
        let path = format!("{}{SEPARATOR}{name}", parent.path);
        let entity = Self::register(Some(parent.clone()), name, path, &parent.tracker);
        create!(entity);
        entity
    }

    /// Shorthand for `Arc::new(Entity::new(parent, name))`.
    #[must_use]
    pub fn child(parent: &Arc<Entity>, name: &str) -> Arc<Self> {
        Arc::new(Self::new(parent, name))
    }

    fn register(parent: Option<Arc<Entity>>, name: &str, path: String, tracker: &Tracker) -> Self {
        let id = tracker.unique_id();
        tracker.add_entity(id, &path);
        Self {
            name: name.to_owned(),
            parent,
            id,
            tracker: tracker.clone(),
            path,
        }
    }

    /// Path from the top-level entity, components joined with `::`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Owned copy of [`Entity::path`].
    #[must_use]
    pub fn full_name(&self) -> String {
        self.path.clone()
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        destroy!(self);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("path", &self.path)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Create the root of an entity tree.
pub fn toplevel(tracker: &Tracker, name: &str) -> Arc<Entity> {
    let top = Arc::new(Entity::register(None, name, name.to_owned(), tracker));
    create!(top);
    top
}
