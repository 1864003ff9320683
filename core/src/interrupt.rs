use ::std::sync::Arc;
use ::std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone)]
enum Flag {
    Shared(Arc<AtomicBool>),
    Static(&'static AtomicBool),
}

/// Handle that interrupts a runner while it waits for a child process.
///
/// Clones share the same flag. The flag is cleared by the wait that observes
/// it, so one `interrupt()` fails exactly one call.
#[derive(Clone)]
pub struct Interrupter {
    flag: Flag,
}

impl Interrupter {
    pub fn new() -> Self {
        Interrupter { flag: Flag::Shared(Arc::new(AtomicBool::new(false))) }
    }

    /// Backed by a static, so an async signal handler can set it.
    pub fn from_static(flag: &'static AtomicBool) -> Self {
        Interrupter { flag: Flag::Static(flag) }
    }

    fn flag(&self) -> &AtomicBool {
        match self.flag {
            Flag::Shared(ref flag) => &**flag,
            Flag::Static(flag) => flag,
        }
    }

    pub fn interrupt(&self) {
        self.flag().store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag().load(Ordering::SeqCst)
    }

    pub fn take(&self) -> bool {
        self.flag().swap(false, Ordering::SeqCst)
    }
}

impl Default for Interrupter {
    fn default() -> Self {
        Interrupter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag_and_take_clears_it() {
        let interrupter = Interrupter::new();
        let other = interrupter.clone();
        assert!(!other.is_interrupted());
        interrupter.interrupt();
        assert!(other.is_interrupted());
        assert!(other.take());
        assert!(!interrupter.take());
    }

    #[test]
    fn static_flag() {
        static FLAG: AtomicBool = AtomicBool::new(false);
        let interrupter = Interrupter::from_static(&FLAG);
        FLAG.store(true, Ordering::SeqCst);
        assert!(interrupter.take());
        assert!(!FLAG.load(Ordering::SeqCst));
    }
}
