//! Load-time script registry.
//!
//! Scripts live in a fixed three-level tree under a root directory:
//!
//! ```text
//! <root>/<channel>/<topic>/<name>.lua
//! ```
//!
//! The registry is built once at startup and is read-only afterwards, so it
//! can be shared as `Arc<ScriptRegistry>` without further synchronisation.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::error::CoreError;
use crate::types::ScriptKey;

/// File extension of loadable scripts.
pub const SCRIPT_EXTENSION: &str = "lua";

type TopicMap = HashMap<String, BTreeMap<String, Arc<str>>>;

/// Mapping from [`ScriptKey`] to script source text.
///
/// Stored as `channel -> topic -> name -> source` so that routing an event
/// is two hash lookups.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    channels: HashMap<String, TopicMap>,
    len: usize,
}

impl ScriptRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `root` for `<channel>/<topic>/<name>.lua` files and load them.
    ///
    /// Files at any other depth or with any other extension are ignored.
    /// Matches are visited in lexical path order and a later match for the
    /// same key overwrites an earlier one.
    ///
    /// # Errors
    ///
    /// Fails if `root` is missing or not a directory, if any directory under
    /// it cannot be scanned, or if a matched file cannot be read as UTF-8
    /// text. Every one of these is fatal at startup.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, CoreError> {
        let root = root.as_ref();
        let meta = std::fs::metadata(root).map_err(|source| CoreError::ScriptRoot {
            path: root.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(CoreError::NotADirectory(root.to_path_buf()));
        }

        let pattern = format!(
            "{}/*/*/*.{SCRIPT_EXTENSION}",
            glob::Pattern::escape(&root.to_string_lossy())
        );

        let mut registry = Self::new();
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            let Some(key) = key_from_path(&path) else {
                tracing::warn!(path = %path.display(), "Skipping script with non UTF-8 path");
                continue;
            };

            let source = std::fs::read_to_string(&path).map_err(|source| {
                CoreError::ReadScript {
                    path: path.clone(),
                    source,
                }
            })?;

            tracing::info!(path = %path.display(), script = %key, "Found script");
            registry.insert(key, source);
        }

        tracing::info!(root = %root.display(), count = registry.len(), "Scripts loaded");
        Ok(registry)
    }

    /// Insert or overwrite a script, returning the previous source if any.
    pub fn insert(&mut self, key: ScriptKey, source: impl Into<Arc<str>>) -> Option<Arc<str>> {
        let previous = self
            .channels
            .entry(key.channel)
            .or_default()
            .entry(key.topic)
            .or_default()
            .insert(key.name, source.into());
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Source text of a single script.
    pub fn get(&self, key: &ScriptKey) -> Option<&Arc<str>> {
        self.channels
            .get(&key.channel)?
            .get(&key.topic)?
            .get(&key.name)
    }

    /// All scripts registered for exactly this channel and topic, ordered by
    /// name.
    pub fn scripts_for(&self, channel: &str, topic: &str) -> Vec<(ScriptKey, Arc<str>)> {
        let Some(names) = self.channels.get(channel).and_then(|t| t.get(topic)) else {
            return Vec::new();
        };
        names
            .iter()
            .map(|(name, source)| (ScriptKey::new(channel, topic, name), Arc::clone(source)))
            .collect()
    }

    /// Every registered key, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = ScriptKey> + '_ {
        self.channels.iter().flat_map(|(channel, topics)| {
            topics.iter().flat_map(move |(topic, names)| {
                names
                    .keys()
                    .map(move |name| ScriptKey::new(channel, topic, name))
            })
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Derive a key from the last three components of a matched path.
///
/// The glob pattern already pins the depth, so the parent directories are
/// the topic and channel.
fn key_from_path(path: &Path) -> Option<ScriptKey> {
    let name = path.file_stem()?.to_str()?;
    let topic_dir = path.parent()?;
    let topic = topic_dir.file_name()?.to_str()?;
    let channel = topic_dir.parent()?.file_name()?.to_str()?;
    Some(ScriptKey::new(channel, topic, name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
