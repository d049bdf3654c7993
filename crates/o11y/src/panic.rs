use metrics::counter;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::panic::{self, PanicHookInfo};
use tracing::error;

static INSTALLED: OnceCell<&'static str> = OnceCell::new();

/// Install a panic hook that logs the panic as a structured event and bumps
/// `panics_total{app}` before delegating to the previous hook.
///
/// Only the first call installs; returns false for repeated calls.
pub fn install_hook(app: &'static str) -> bool {
    if INSTALLED.set(app).is_err() {
        return false;
    }

    let prev = panic::take_hook();
    panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let thread = std::thread::current();
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "<unknown>".into());

        error!(
            app,
            thread = thread.name().unwrap_or("<unnamed>"),
            %location,
            payload = payload_str(info.payload()),
            "panic captured"
        );
        counter!("panics_total", "app" => app).increment(1);

        prev(info);
    }));
    true
}

fn payload_str(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
