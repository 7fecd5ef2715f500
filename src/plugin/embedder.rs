//! Embedder: owner of the messenger and the shared texture registrar.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, instrument};

use super::registrar::PluginRegistrar;
use super::texture::{TextureEngine, TextureRegistrar};
use crate::messenger::{BinaryMessenger, MessengerConfig, Transport};

/// Plugin entry point.
#[derive(Clone, Copy)]
pub struct Plugin {
    /// Plugin name, passed to [`Embedder::registrar_for_plugin`]
    pub name: &'static str,
    /// Registration function
    pub register: fn(&PluginRegistrar),
}

impl Plugin {
    /// Describe a plugin entry point
    #[must_use]
    pub const fn new(name: &'static str, register: fn(&PluginRegistrar)) -> Self {
        Self { name, register }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin").field("name", &self.name).finish_non_exhaustive()
    }
}

/// One engine instance as seen from the plugin side.
pub struct Embedder {
    messenger: BinaryMessenger,
    texture_engine: Option<Rc<dyn TextureEngine>>,
    textures: OnceCell<Rc<TextureRegistrar>>,
}

impl Embedder {
    /// Create an embedder on top of `transport`
    pub fn new(transport: Rc<dyn Transport>, config: MessengerConfig) -> Self {
        Self {
            messenger: BinaryMessenger::new(transport, config),
            texture_engine: None,
            textures: OnceCell::new(),
        }
    }

    /// Forward texture events to `engine`
    #[must_use]
    pub fn with_texture_engine(mut self, engine: Rc<dyn TextureEngine>) -> Self {
        self.texture_engine = Some(engine);
        self
    }

    /// The embedder's messenger
    #[must_use]
    pub fn messenger(&self) -> &BinaryMessenger {
        &self.messenger
    }

    /// The shared texture registrar, created on first use
    pub fn texture_registrar(&self) -> Rc<TextureRegistrar> {
        Rc::clone(self.textures.get_or_init(|| {
            debug!("creating shared texture registrar");
            Rc::new(TextureRegistrar::new(self.texture_engine.clone()))
        }))
    }

    /// Create a registrar for the plugin called `name`
    #[must_use]
    pub fn registrar_for_plugin(&self, name: &str) -> PluginRegistrar {
        PluginRegistrar::new(name, self.messenger.clone(), self.texture_registrar())
    }

    /// Call every plugin's entry point with its own registrar, in order
    #[instrument(level = "info", skip_all, fields(count = plugins.len()))]
    pub fn register_plugins(&self, plugins: &[Plugin]) {
        for plugin in plugins {
            let registrar = self.registrar_for_plugin(plugin.name);
            (plugin.register)(&registrar);
            info!(plugin = plugin.name, "plugin registered");
        }
    }
}

impl fmt::Debug for Embedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedder")
            .field("messenger", &self.messenger)
            .field("textures", &self.textures.get())
            .finish_non_exhaustive()
    }
}
