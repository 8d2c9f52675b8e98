use std::fmt;

/// Identity of a loaded script.
///
/// `channel` and `topic` come from the two directory levels under the script
/// root, `name` is the file stem. Displayed as `channel/topic/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptKey {
    pub channel: String,
    pub topic: String,
    pub name: String,
}

impl ScriptKey {
    pub fn new(
        channel: impl Into<String>,
        topic: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            topic: topic.into(),
            name: name.into(),
        }
    }

    /// Whether this script is routed for the given channel and topic.
    ///
    /// Matching is exact string equality on both levels.
    pub fn routes(&self, channel: &str, topic: &str) -> bool {
        self.channel == channel && self.topic == topic
    }
}

impl fmt::Display for ScriptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.channel, self.topic, self.name)
    }
}
