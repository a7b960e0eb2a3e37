use std::time::Duration;

use mcuwire_frame::DEFAULT_MAX_PAYLOAD;

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest payload sent or accepted on this link. Default: 240.
    pub max_payload: usize,
    /// Deadline for ordinary requests. Default: 700 ms.
    pub request_timeout: Duration,
    /// Deadline for scope control, which the device acknowledges only after
    /// reconfiguring its sampler. Default: 1 s.
    pub scope_control_timeout: Duration,
    /// How long the reader thread blocks in one link read before checking
    /// whether it should stop. Default: 80 ms.
    pub read_poll_interval: Duration,
    /// Size of the reader thread's read buffer. Default: 1024.
    pub read_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            request_timeout: Duration::from_millis(700),
            scope_control_timeout: Duration::from_millis(1000),
            read_poll_interval: Duration::from_millis(80),
            read_chunk_size: 1024,
        }
    }
}
