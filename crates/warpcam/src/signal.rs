use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

static STOP: AtomicBool = AtomicBool::new(false);

/// Installs SIGINT/SIGTERM handlers that raise the returned flag.
///
/// The render loop polls the flag once per frame and shuts down cleanly.
#[cfg(unix)]
pub fn install() -> Result<&'static AtomicBool> {
    use anyhow::Context;
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    extern "C" fn on_signal(_: nix::libc::c_int) {
        STOP.store(true, Ordering::SeqCst);
    }

    let action = SigAction::new(SigHandler::Handler(on_signal), SaFlags::SA_RESTART, SigSet::empty());
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic.
        unsafe { sigaction(sig, &action) }.with_context(|| format!("failed to install {sig} handler"))?;
    }

    Ok(&STOP)
}

#[cfg(not(unix))]
pub fn install() -> Result<&'static AtomicBool> {
    Ok(&STOP)
}

pub fn requested() -> bool {
    STOP.load(Ordering::SeqCst)
}
