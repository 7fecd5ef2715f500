//! Plugin registration
//!
//! An [`Embedder`] owns the messenger and a lazily created
//! [`TextureRegistrar`]. Each plugin entry point receives a
//! [`PluginRegistrar`] giving it access to both.

pub mod embedder;
pub mod registrar;
pub mod texture;

pub use embedder::{Embedder, Plugin};
pub use registrar::PluginRegistrar;
pub use texture::{TextureEngine, TextureError, TextureId, TextureRegistrar};
