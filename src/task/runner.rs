// src/task/runner.rs

//! Runs a task body on its own tokio task so it can be interrupted.

use std::any::Any;

use tracing::{debug, error};

use crate::errors::{TaskError, TaskResult};
use crate::task::core::TaskCore;
use crate::task::handle::BodyFuture;

/// Spawn `body`, register its abort handle on `core` and map the way it ended
/// onto a task outcome:
///
/// - `Ok` / `Err` from the body become the result / a [`TaskError`]
/// - an abort (interrupt) becomes [`TaskError::Cancelled`]
/// - a panic becomes [`TaskError::Fatal`]
pub(crate) async fn run_body<T: Send + 'static>(
    core: &TaskCore,
    body: BodyFuture<T>,
) -> TaskResult<T> {
    let handle = tokio::spawn(body);
    core.attach_running(handle.abort_handle());
    let joined = handle.await;
    core.detach_running();

    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TaskError::from_body(core.name(), err)),
        Err(join_err) => match join_err.try_into_panic() {
            Ok(payload) => {
                let message = panic_message(payload.as_ref());
                error!(task = %core.name(), %message, "task body panicked");
                Err(TaskError::Fatal {
                    task: core.name().to_string(),
                    message,
                })
            }
            Err(_) => {
                debug!(task = %core.name(), "task body interrupted");
                Err(TaskError::Cancelled {
                    task: core.name().to_string(),
                })
            }
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
