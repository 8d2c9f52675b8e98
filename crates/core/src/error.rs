use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Script root {path} is not accessible: {source}")]
    ScriptRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Script root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Invalid script pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Unable to scan script directory: {0}")]
    Scan(#[from] glob::GlobError),

    #[error("Unable to read script {path}: {source}")]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
