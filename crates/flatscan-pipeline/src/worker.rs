//! One-shot background detection.
//!
//! [`spawn_detection`] moves a captured frame onto a dedicated thread,
//! runs detection there, and sends back only the final
//! [`DetectedDocument`]; none of the intermediate maps cross the channel.
//! The caller's `generation` number travels with the task so a UI that
//! has since captured a newer frame can tell a stale result apart.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::types::{DetectedDocument, DetectionConfig, PipelineError, PixelBuffer};

/// Name given to detection threads.
pub const WORKER_THREAD_NAME: &str = "flatscan-detect";

/// Handle to a detection running on a background thread.
#[derive(Debug)]
pub struct DetectionTask {
    generation: u64,
    receiver: Receiver<Result<DetectedDocument, PipelineError>>,
}

/// Start detection of `buffer` on a new thread.
///
/// # Errors
///
/// Returns [`PipelineError::WorkerSpawn`] if the thread cannot be
/// created.
pub fn spawn_detection(
    buffer: PixelBuffer,
    config: DetectionConfig,
    generation: u64,
) -> Result<DetectionTask, PipelineError> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_owned())
        .spawn(move || {
            log::debug!("detection worker started (generation {generation})");
            let result = crate::detect(&buffer, &config);
            // The receiver may already be gone if the caller lost
            // interest; nothing to do then.
            if sender.send(result).is_err() {
                log::debug!("detection result for generation {generation} was dropped");
            }
        })?;
    Ok(DetectionTask {
        generation,
        receiver,
    })
}

impl DetectionTask {
    /// The generation number passed to [`spawn_detection`].
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The result if detection has finished, without blocking.
    ///
    /// Returns `None` while the worker is still running.
    pub fn try_result(&self) -> Option<Result<DetectedDocument, PipelineError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PipelineError::WorkerDisconnected)),
        }
    }

    /// Block until detection finishes.
    ///
    /// # Errors
    ///
    /// Returns the detection error, or
    /// [`PipelineError::WorkerDisconnected`] if the worker died without
    /// reporting.
    pub fn wait(self) -> Result<DetectedDocument, PipelineError> {
        self.receiver
            .recv()
            .map_err(|_| PipelineError::WorkerDisconnected)?
    }

    /// Block for at most `timeout`.
    ///
    /// The worker keeps running after a timeout; its result is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DetectionTimedOut`] when the deadline
    /// passes, [`PipelineError::WorkerDisconnected`] if the worker died,
    /// or the detection error itself.
    pub fn wait_timeout(self, timeout: Duration) -> Result<DetectedDocument, PipelineError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "detection generation {} did not finish within {timeout:?}",
                    self.generation
                );
                Err(PipelineError::DetectionTimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => Err(PipelineError::WorkerDisconnected),
        }
    }
}
