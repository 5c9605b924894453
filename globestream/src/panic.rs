//! Panic hook that records panics in the log before unwinding.
//!
//! Worker panics inside the retrieval service are contained and turned
//! into failed outcomes; this hook covers everything else (startup,
//! caller tasks) so a crash leaves its location and message in the log
//! file, not just on a possibly-lost stderr.

use std::any::Any;
use std::panic::{self, PanicHookInfo};
use std::sync::Once;

static INSTALL: Once = Once::new();

/// Install the panic hook.
///
/// Should be called once early in application startup, after logging is
/// initialized. Subsequent calls are ignored. The original hook still
/// runs afterwards, so the standard backtrace output is preserved.
pub fn install_panic_hook() {
    INSTALL.call_once(|| {
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            log_panic(info);
            original_hook(info);
        }));
    });
}

fn log_panic(info: &PanicHookInfo<'_>) {
    let message = payload_message(info.payload());
    match info.location() {
        Some(location) => tracing::error!(
            file = location.file(),
            line = location.line(),
            column = location.column(),
            "Panic: {message}"
        ),
        None => tracing::error!("Panic: {message}"),
    }
}

/// Extract a printable message from a panic payload.
fn payload_message(payload: &dyn Any) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
