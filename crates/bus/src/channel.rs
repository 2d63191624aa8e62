/// The two logical channels coordinating the process roles.
///
/// `SchedulerRequests` flows server/API → scheduler ("schedule a check");
/// `WorkerResults` flows worker → server ("here's what I found"). Each
/// channel has an associated dead-letter key for messages that failed
/// processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    SchedulerRequests,
    WorkerResults,
}

impl Channel {
    /// The channel's wire name, used as the ZeroMQ topic frame.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchedulerRequests => "scheduler-requests",
            Self::WorkerResults => "worker-results",
        }
    }

    /// Key of the dead-letter list holding this channel's failed messages.
    pub fn dead_letter_key(&self) -> String {
        format!("{}-dlq", self.as_str())
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
