#![allow(dead_code)]

pub use dynatask_test_utils::builders;
pub use dynatask_test_utils::probes::*;
pub use dynatask_test_utils::recording_backend::RecordingBackend;
pub use dynatask_test_utils::{execution, init_tracing, with_timeout};

use std::time::Duration;

/// Short tick so tests never sit on the default one-second poll.
pub const TEST_TICK: Duration = Duration::from_millis(20);
