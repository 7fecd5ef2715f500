//! Per-plugin view of the embedder.

use std::fmt;
use std::rc::Rc;

use super::texture::TextureRegistrar;
use crate::channel::{EventChannel, MethodChannel};
use crate::codec::MethodCodec;
use crate::messenger::BinaryMessenger;

/// What a plugin receives when it registers: the embedder's messenger and
/// its shared texture registrar. Holds no channel state of its own.
#[derive(Clone)]
pub struct PluginRegistrar {
    plugin_name: String,
    messenger: BinaryMessenger,
    textures: Rc<TextureRegistrar>,
}

impl PluginRegistrar {
    pub(crate) fn new(plugin_name: &str, messenger: BinaryMessenger, textures: Rc<TextureRegistrar>) -> Self {
        Self {
            plugin_name: plugin_name.to_owned(),
            messenger,
            textures,
        }
    }

    /// Name the registrar was created for
    #[must_use]
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Messenger shared by every plugin of the embedder
    #[must_use]
    pub fn messenger(&self) -> &BinaryMessenger {
        &self.messenger
    }

    /// Texture registrar shared by every plugin of the embedder
    #[must_use]
    pub fn texture_registrar(&self) -> &Rc<TextureRegistrar> {
        &self.textures
    }

    /// Method channel on the shared messenger using the standard codec
    #[must_use]
    pub fn method_channel(&self, name: &str) -> MethodChannel {
        MethodChannel::with_standard_codec(&self.messenger, name)
    }

    /// Method channel on the shared messenger using `codec`
    #[must_use]
    pub fn method_channel_with_codec(&self, name: &str, codec: Rc<dyn MethodCodec>) -> MethodChannel {
        MethodChannel::new(&self.messenger, name, codec)
    }

    /// Event channel on the shared messenger using the standard codec
    #[must_use]
    pub fn event_channel(&self, name: &str) -> EventChannel {
        EventChannel::with_standard_codec(&self.messenger, name)
    }
}

impl fmt::Debug for PluginRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistrar")
            .field("plugin_name", &self.plugin_name)
            .finish_non_exhaustive()
    }
}
