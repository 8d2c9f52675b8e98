use std::fmt;

/// Terminal state of one execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The script returned normally before its deadline.
    Completed,
    /// The script raised an uncaught error, or a host binding panicked.
    Faulted(String),
    /// The watchdog fired and the script was force stopped.
    TimedOut,
}

impl Outcome {
    /// Stable label used in log records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Faulted(_) => "faulted",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Faulted(error) => write!(f, "faulted: {error}"),
            other => f.write_str(other.label()),
        }
    }
}
