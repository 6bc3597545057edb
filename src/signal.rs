//! Cancellation and Ctrl+C handling.
//!
//! A [`CancelToken`] is shared by everything taking part in one archiving
//! run. The synchronous side (rayon fingerprint jobs, deletion loops)
//! polls [`CancelToken::is_cancelled`]; the async side (download tasks)
//! awaits [`CancelToken::cancelled`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use mediavault::signal::install_handler;
//!
//! let token = install_handler().expect("Failed to install signal handler");
//!
//! // Hand clones of the token to the download manager and resolver.
//! let for_workers = token.clone();
//! if for_workers.is_cancelled() {
//!     println!("Cancelled, cleaning up...");
//! }
//! ```
//!
//! # Exit Codes
//!
//! When a signal is received the token is cancelled and the application
//! should exit with code 130 (128 + SIGINT).

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;

/// Exit code for SIGINT (Ctrl+C) interruption.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

#[derive(Debug, Default)]
struct CancelState {
    flag: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation flag with an async wait.
///
/// All clones observe the same state. Cancellation is sticky until
/// [`CancelToken::reset`] is called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation and wake every task awaiting [`Self::cancelled`].
    pub fn cancel(&self) {
        self.state.flag.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Clear the flag. Intended for reusing a process-wide token in tests.
    pub fn reset(&self) {
        self.state.flag.store(false, Ordering::SeqCst);
    }

    /// Resolve once the token is cancelled.
    ///
    /// Returns immediately if it already is.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel()
            // cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Wait on an optional token; never resolves for `None`.
pub(crate) async fn wait_cancelled(token: Option<&CancelToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_TOKEN: OnceLock<CancelToken> = OnceLock::new();

/// Install a Ctrl+C handler that cancels the returned token.
///
/// Safe to call more than once per process: later calls reset and return
/// the token registered by the first call. If another component already
/// owns the Ctrl+C hook, an unhooked token is returned so callers can
/// still cancel manually.
///
/// # Errors
///
/// None: a handler that cannot be hooked yields an unhooked token.
pub fn install_handler() -> Result<CancelToken, SignalError> {
    if let Some(token) = GLOBAL_TOKEN.get() {
        token.reset();
        return Ok(token.clone());
    }

    let token = CancelToken::new();
    let hooked = token.clone();

    match ctrlc::set_handler(move || {
        hooked.cancel();
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing in-flight work...");
        let _ = std::io::stderr().flush();
        log::info!("Cancellation signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
        Err(e) => {
            log::debug!("Ctrl+C handler unavailable ({e}), using unhooked token");
            let token = GLOBAL_TOKEN.get_or_init(CancelToken::new).clone();
            token.reset();
            Ok(token)
        }
    }
}
