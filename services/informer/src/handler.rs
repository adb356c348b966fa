//! Event-handler registration. Handlers run synchronously on the informer's
//! own state-machine task, in cache-application order.

use std::sync::Arc;

use mqtti_protocol::Object;

pub type AddHandler = Arc<dyn Fn(&Object) + Send + Sync>;
pub type UpdateHandler = Arc<dyn Fn(&Object, &Object) + Send + Sync>;
pub type DeleteHandler = Arc<dyn Fn(&Object) + Send + Sync>;

/// One registered handler set. Any of the three callbacks may be omitted.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub on_add: Option<AddHandler>,
    pub on_update: Option<UpdateHandler>,
    pub on_delete: Option<DeleteHandler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_add(mut self, f: impl Fn(&Object) + Send + Sync + 'static) -> Self {
        self.on_add = Some(Arc::new(f));
        self
    }

    pub fn with_update(mut self, f: impl Fn(&Object, &Object) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    pub fn with_delete(mut self, f: impl Fn(&Object) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Arc::new(f));
        self
    }
}
