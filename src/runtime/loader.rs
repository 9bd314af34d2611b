//! Runtime bring-up.
//!
//! A freshly loaded runtime is only trusted after a round trip through its
//! buffer API. The outcome is the runtime's single readiness signal:
//! either it becomes `Ready` or it is `Aborted` with a reason.

use super::{BufferShape, RuntimeError, RuntimeStatus, SoftwareRuntime, VisionRuntime};
use crate::sink::{ResultSink, StatusMessage};

/// Side length of the self-test buffer.
const SELF_TEST_SIZE: u32 = 5;

/// Solid green, opaque.
const SELF_TEST_PIXEL: [u8; 4] = [0, 255, 0, 255];

/// Allocates a small RGBA buffer, fills it and frees it again.
///
/// The buffer is freed even when the upload fails.
pub fn self_test(runtime: &mut dyn VisionRuntime) -> Result<(), RuntimeError> {
    let shape = BufferShape::rgba(SELF_TEST_SIZE, SELF_TEST_SIZE);
    let id = runtime.allocate_buffer(shape)?;

    let pixels: Vec<u8> = SELF_TEST_PIXEL
        .iter()
        .copied()
        .cycle()
        .take(shape.byte_len())
        .collect();
    let uploaded = runtime.upload(id, &pixels);
    let freed = runtime.free_buffer(id);

    uploaded?;
    freed
}

/// Runs the self-test and produces the readiness signal.
///
/// Calling this on a runtime that is already ready is a no-op.
pub fn bring_up(runtime: &mut SoftwareRuntime) -> Result<(), RuntimeError> {
    match runtime.status() {
        RuntimeStatus::Ready => return Ok(()),
        RuntimeStatus::Aborted(reason) => return Err(RuntimeError::Aborted(reason.clone())),
        RuntimeStatus::Initializing => {}
    }

    tracing::info!("Running vision runtime self-test");
    match self_test(runtime) {
        Ok(()) => {
            runtime.mark_ready();
            Ok(())
        }
        Err(e) => {
            runtime.abort(format!("self-test failed: {e}"));
            Err(e)
        }
    }
}

/// [`bring_up`], with each step posted to the sink's status line.
pub fn bring_up_reporting(
    runtime: &mut SoftwareRuntime,
    sink: &mut dyn ResultSink,
) -> Result<(), RuntimeError> {
    sink.status(&StatusMessage::info("Loading vision runtime"));
    match bring_up(runtime) {
        Ok(()) => {
            sink.status(&StatusMessage::success("Vision runtime ready"));
            Ok(())
        }
        Err(e) => {
            sink.status(&StatusMessage::danger(format!(
                "Vision runtime failed to start: {e}"
            )));
            Err(e)
        }
    }
}
