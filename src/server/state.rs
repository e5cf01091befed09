use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::overlay::ResolvedFont;
use crate::settings;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) settings: settings::Settings,
    pub(crate) font: Option<Arc<ResolvedFont>>,
    pub(crate) translating: BusyFlag,
    pub(crate) exporting: BusyFlag,
}

impl ServerState {
    pub(crate) fn new(settings: settings::Settings, font: Option<ResolvedFont>) -> Self {
        Self {
            settings,
            font: font.map(Arc::new),
            translating: BusyFlag::default(),
            exporting: BusyFlag::default(),
        }
    }
}

/// Advisory "work in progress" flag. Acquiring it while it is held fails
/// instead of waiting; the guard clears it on drop, success or failure.
#[derive(Debug, Clone, Default)]
pub(crate) struct BusyFlag(Arc<AtomicBool>);

pub(crate) struct BusyGuard(Arc<AtomicBool>);

impl BusyFlag {
    pub(crate) fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(self.0.clone()))
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
