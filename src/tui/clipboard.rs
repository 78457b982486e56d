//! Clipboard writes for the output panes.
//!
//! arboard on Linux only serves the selection while the `Clipboard` value is
//! alive, so one background thread owns each write for a few seconds.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{channel, Sender};
use std::sync::OnceLock;
use std::time::Duration;

const HOLD: Duration = Duration::from_secs(2);

static WRITER: OnceLock<Sender<String>> = OnceLock::new();

fn writer() -> &'static Sender<String> {
    WRITER.get_or_init(|| {
        let (tx, rx) = channel::<String>();
        std::thread::spawn(move || {
            for text in rx {
                let mut clipboard = match arboard::Clipboard::new() {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(error = %e, "clipboard unavailable");
                        continue;
                    }
                };
                match clipboard.set_text(text) {
                    Ok(()) => std::thread::sleep(HOLD),
                    Err(e) => tracing::warn!(error = %e, "clipboard write failed"),
                }
            }
        });
        tx
    })
}

/// Queue `text` for the clipboard. Never blocks the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    writer()
        .send(text.to_owned())
        .map_err(|_| anyhow!("clipboard writer stopped"))
}
