use greenmon_common::types::Severity;

/// Sends alerts at or above `min_severity` to the channel at
/// `channel_index`. Non-alert events ignore severity.
#[derive(Debug, Clone)]
pub struct ChannelRoute {
    pub min_severity: Severity,
    pub channel_index: usize,
}

impl ChannelRoute {
    pub fn should_send(&self, event_severity: Severity) -> bool {
        event_severity >= self.min_severity
    }
}
