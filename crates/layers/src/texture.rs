use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use threading::TaskRunnerHandle;

use crate::canvas::Image;

/// Externally-produced image content, registered with the
/// [`TextureRegistry`] and sampled during paint.
///
/// Backing resources are tied to the GPU context; the context lifecycle
/// notifications let each texture release or rebuild state when the context
/// is torn down and recreated.
pub trait Texture: Send + Sync {
    /// Produce an image for the current frame, or `None` when no content is
    /// available yet. A `None` here means "nothing to draw", not an error.
    fn make_image(&self, width: u32, height: u32) -> Option<Image>;

    fn on_gr_context_created(&self) {}

    fn on_gr_context_destroyed(&self) {}

    /// Called synchronously from `unregister_texture` so backing resources
    /// can be released deterministically.
    fn on_texture_unregistered(&self) {}
}

/// Raster-thread-confined mapping from texture id to texture.
///
/// Ids are assigned from a monotonic counter and never reused, even after
/// unregistration, so a stale id can never alias a newer texture. Every
/// mutating call and every context-lifecycle fanout must happen on the
/// raster thread; when the registry is pinned to a task runner this is
/// checked with debug assertions.
pub struct TextureRegistry {
    textures: HashMap<u64, Arc<dyn Texture>>,
    next_texture_id: u64,
    raster_runner: Option<TaskRunnerHandle>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            next_texture_id: 1,
            raster_runner: None,
        }
    }

    /// Registry pinned to the raster task runner; mutating calls off that
    /// runner's thread trip a debug assertion.
    pub fn with_affinity(raster_runner: TaskRunnerHandle) -> Self {
        Self {
            raster_runner: Some(raster_runner),
            ..Self::new()
        }
    }

    fn check_affinity(&self) {
        if let Some(runner) = &self.raster_runner {
            debug_assert!(
                runner.runs_tasks_on_current_thread(),
                "texture registry touched off the '{}' runner thread",
                runner.name()
            );
        }
    }

    /// Store the texture under the next unused id and return the id.
    pub fn register_texture(&mut self, texture: Arc<dyn Texture>) -> u64 {
        self.check_affinity();
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, texture);
        debug!("registered texture {id}");
        id
    }

    /// Remove the mapping and notify the texture, exactly once. A no-op for
    /// ids that were never registered or are already gone.
    pub fn unregister_texture(&mut self, id: u64) {
        self.check_affinity();
        if let Some(texture) = self.textures.remove(&id) {
            texture.on_texture_unregistered();
            debug!("unregistered texture {id}");
        }
    }

    /// Lookup used during paint; absent ids mean "nothing to draw".
    pub fn get_texture(&self, id: u64) -> Option<Arc<dyn Texture>> {
        self.textures.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Fan out context creation to every registered texture. Order is
    /// unspecified; the notifications are independent.
    pub fn on_gr_context_created(&self) {
        self.check_affinity();
        trace!("gr context created, notifying {} textures", self.textures.len());
        for texture in self.textures.values() {
            texture.on_gr_context_created();
        }
    }

    /// Fan out context destruction; every texture must become safely inert
    /// on its own, no response is collected.
    pub fn on_gr_context_destroyed(&self) {
        self.check_affinity();
        trace!(
            "gr context destroyed, notifying {} textures",
            self.textures.len()
        );
        for texture in self.textures.values() {
            texture.on_gr_context_destroyed();
        }
    }
}

impl Default for TextureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTexture {
        images_made: AtomicUsize,
        context_created: AtomicUsize,
        context_destroyed: AtomicUsize,
        unregistered: AtomicUsize,
    }

    impl Texture for CountingTexture {
        fn make_image(&self, width: u32, height: u32) -> Option<Image> {
            self.images_made.fetch_add(1, Ordering::SeqCst);
            Some(Image {
                id: 7,
                width,
                height,
            })
        }

        fn on_gr_context_created(&self) {
            self.context_created.fetch_add(1, Ordering::SeqCst);
        }

        fn on_gr_context_destroyed(&self) {
            self.context_destroyed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_texture_unregistered(&self) {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut registry = TextureRegistry::new();
        let first = registry.register_texture(Arc::new(CountingTexture::default()));
        registry.unregister_texture(first);
        let second = registry.register_texture(Arc::new(CountingTexture::default()));
        assert!(second > first, "id {second} reused after {first} was freed");
    }

    #[test]
    fn unregister_notifies_exactly_once() {
        let texture = Arc::new(CountingTexture::default());
        let mut registry = TextureRegistry::new();
        let id = registry.register_texture(texture.clone());
        registry.unregister_texture(id);
        registry.unregister_texture(id);
        assert_eq!(texture.unregistered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_texture_on_absent_id_is_none() {
        let registry = TextureRegistry::new();
        assert!(registry.get_texture(42).is_none());
    }

    #[test]
    fn context_lifecycle_fans_out_to_all_textures() {
        let first = Arc::new(CountingTexture::default());
        let second = Arc::new(CountingTexture::default());
        let mut registry = TextureRegistry::new();
        registry.register_texture(first.clone());
        registry.register_texture(second.clone());

        registry.on_gr_context_created();
        registry.on_gr_context_destroyed();

        for texture in [&first, &second] {
            assert_eq!(texture.context_created.load(Ordering::SeqCst), 1);
            assert_eq!(texture.context_destroyed.load(Ordering::SeqCst), 1);
        }
    }
}
