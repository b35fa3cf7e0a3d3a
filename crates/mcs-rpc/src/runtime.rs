//! A scoped tokio runtime with signal-driven shutdown.

use tokio_util::sync::CancellationToken;

use crate::error::MustBePositiveError;

/// Worker thread count, strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberOfThreads(usize);

impl NumberOfThreads {
    pub fn new(value: usize) -> Result<Self, MustBePositiveError> {
        if value == 0 {
            return Err(MustBePositiveError {
                what: "number of threads",
            });
        }
        Ok(NumberOfThreads(value))
    }

    pub const fn value(self) -> usize {
        self.0
    }
}

/// A running multi-thread runtime that stops when SIGINT or SIGTERM
/// arrives; dropping it stops all providers and clients spawned on it.
pub struct ScopedRuntime {
    runtime: tokio::runtime::Runtime,
    cancel: CancellationToken,
}

impl ScopedRuntime {
    pub fn new(threads: NumberOfThreads) -> std::io::Result<ScopedRuntime> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads.value())
            .enable_all()
            .build()?;
        let cancel = CancellationToken::new();
        runtime.spawn(wait_for_signals(cancel.clone()));
        Ok(ScopedRuntime { runtime, cancel })
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn handle(&self) -> &tokio::runtime::Handle {
        self.runtime.handle()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Blocks until a shutdown signal arrives; for providers that serve
    /// until signalled.
    pub fn wait(&self) {
        let cancel = self.cancel.clone();
        self.runtime.block_on(cancel.cancelled());
    }
}

async fn wait_for_signals(cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(signal) => signal,
        Err(error) => {
            log::error!("could not install SIGINT handler: {error}");
            return;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(error) => {
            log::error!("could not install SIGTERM handler: {error}");
            return;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => log::info!("SIGINT, stopping"),
        _ = terminate.recv() => log::info!("SIGTERM, stopping"),
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_are_rejected() {
        assert_eq!(
            NumberOfThreads::new(0),
            Err(MustBePositiveError {
                what: "number of threads",
            })
        );
    }

    #[test]
    fn runs_futures() {
        let runtime = ScopedRuntime::new(NumberOfThreads::new(1).unwrap()).unwrap();
        assert_eq!(runtime.block_on(async { 6 * 7 }), 42);
    }
}
