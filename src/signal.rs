//! Ctrl-C handling for `apply`
//!
//! The first SIGINT cancels the run: resources already converging finish,
//! nothing new starts. The handler then restores the default action, so a
//! second SIGINT terminates the process.

use declarative::CancelToken;
use std::sync::OnceLock;

static TOKEN: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn on_interrupt(_signal: libc::c_int) {
    if let Some(token) = TOKEN.get() {
        token.cancel();
    }
    // SAFETY: signal(2) is async-signal-safe
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

/// Cancel `token` on the next SIGINT. Only the first token installed is used.
pub fn cancel_on_interrupt(token: &CancelToken) {
    if TOKEN.set(token.clone()).is_err() {
        log::debug!("Interrupt handler already installed");
        return;
    }

    // SAFETY: the handler only touches an atomic flag and calls signal(2)
    let previous = unsafe {
        libc::signal(
            libc::SIGINT,
            on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t,
        )
    };
    if previous == libc::SIG_ERR {
        log::warn!("Could not install SIGINT handler; Ctrl-C will abort immediately");
    }
}
