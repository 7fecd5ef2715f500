//! Texture id bookkeeping shared by all plugins of one embedder.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, trace};

/// Identifier assigned to a registered texture.
pub type TextureId = i64;

/// Errors raised by [`TextureRegistrar`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// The id is not (or no longer) registered
    #[error("texture {0} is not registered")]
    Unknown(TextureId),
}

/// Engine-side notifications for texture lifecycle events.
pub trait TextureEngine {
    /// A texture id was handed out
    fn texture_registered(&self, _id: TextureId) {}

    /// A texture id was retired
    fn texture_unregistered(&self, _id: TextureId) {}

    /// New content is ready for the texture
    fn frame_available(&self, _id: TextureId) {}
}

/// Assigns texture ids and forwards frame notifications to the engine.
///
/// Ids start at 1 and are never reused.
pub struct TextureRegistrar {
    next_id: Cell<TextureId>,
    textures: RefCell<BTreeSet<TextureId>>,
    engine: Option<Rc<dyn TextureEngine>>,
}

impl TextureRegistrar {
    /// Create a registrar, optionally notifying `engine`
    pub fn new(engine: Option<Rc<dyn TextureEngine>>) -> Self {
        Self {
            next_id: Cell::new(1),
            textures: RefCell::new(BTreeSet::new()),
            engine,
        }
    }

    /// Register a new texture and return its id
    pub fn register_texture(&self) -> TextureId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.textures.borrow_mut().insert(id);
        debug!(texture = id, "texture registered");
        if let Some(engine) = &self.engine {
            engine.texture_registered(id);
        }
        id
    }

    /// Retire a texture id
    pub fn unregister_texture(&self, id: TextureId) -> Result<(), TextureError> {
        if !self.textures.borrow_mut().remove(&id) {
            return Err(TextureError::Unknown(id));
        }
        debug!(texture = id, "texture unregistered");
        if let Some(engine) = &self.engine {
            engine.texture_unregistered(id);
        }
        Ok(())
    }

    /// Signal that a new frame is ready for `id`
    pub fn mark_texture_frame_available(&self, id: TextureId) -> Result<(), TextureError> {
        if !self.textures.borrow().contains(&id) {
            return Err(TextureError::Unknown(id));
        }
        trace!(texture = id, "frame available");
        if let Some(engine) = &self.engine {
            engine.frame_available(id);
        }
        Ok(())
    }

    /// Number of registered textures
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.borrow().len()
    }

    /// Check if `id` is registered
    #[must_use]
    pub fn is_registered(&self, id: TextureId) -> bool {
        self.textures.borrow().contains(&id)
    }
}

impl Default for TextureRegistrar {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for TextureRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureRegistrar")
            .field("textures", &self.texture_count())
            .field("next_id", &self.next_id.get())
            .finish_non_exhaustive()
    }
}
