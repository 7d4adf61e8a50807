pub type InklayResult<T> = Result<T, InklayError>;

#[derive(thiserror::Error, Debug)]
pub enum InklayError {
    /// Malformed or undecodable source bytes. Fails the load; callers fall
    /// back to a placeholder buffer.
    #[error("decode error: {0}")]
    Decode(String),

    /// Degenerate filter input. Recovered locally as a no-op and never
    /// surfaced through the public filter path.
    #[error("filter error: {0}")]
    Filter(String),

    /// Degenerate flatten target or unrenderable overlay. Aborts the save;
    /// the session stays in its pre-saving mode.
    #[error("composition error: {0}")]
    Composition(String),

    /// Upload or discovery failure. Non-fatal; a completed local save is
    /// never rolled back.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InklayError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn filter(msg: impl Into<String>) -> Self {
        Self::Filter(msg.into())
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
