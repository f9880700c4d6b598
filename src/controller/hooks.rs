use std::{fmt, sync::Arc};

pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle callbacks; each fires at most once per controller
///
/// Hooks run inline on whichever task triggers them and must not panic.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub(crate) on_init: Option<Hook>,
    pub(crate) on_ready: Option<Hook>,
    pub(crate) on_dispose: Option<Hook>,
}

impl LifecycleHooks {
    pub(crate) fn fire_init(&self) {
        if let Some(hook) = &self.on_init {
            hook();
        }
    }

    pub(crate) fn fire_ready(&self) {
        if let Some(hook) = &self.on_ready {
            hook();
        }
    }

    pub(crate) fn fire_dispose(&self) {
        if let Some(hook) = &self.on_dispose {
            hook();
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_init", &self.on_init.is_some())
            .field("on_ready", &self.on_ready.is_some())
            .field("on_dispose", &self.on_dispose.is_some())
            .finish()
    }
}
