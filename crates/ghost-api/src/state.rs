use std::sync::Arc;

use ghost_gateway::Dispatcher;
use ghost_rooms::Lifecycle;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub lifecycle: Lifecycle,
}

impl AppStateInner {
    pub fn new(lifecycle: Lifecycle) -> AppState {
        Arc::new(Self { lifecycle })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.lifecycle.dispatcher()
    }
}
