use crate::pose::KeypointName;

/// Edits rejected locally. These never reach the backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("template {index} has no raw capture: base and core keypoints are frozen")]
    FrozenStructure { index: u32 },

    #[error("core keypoint {0} is listed more than once")]
    DuplicateCoreKeypoint(KeypointName),

    #[error("capture is missing keypoint {0}")]
    MissingKeypoint(KeypointName),

    #[error("unknown keypoint name: {0}")]
    UnknownKeypoint(String),

    #[error("key slot {position} is empty")]
    UnresolvedKey { position: usize },

    #[error("unknown key token: {0}")]
    UnknownKey(String),

    #[error("similarity threshold {0} is outside [0, 1]")]
    ThresholdOutOfRange(f64),

    #[error("config field {field} out of range: {value}")]
    ConfigOutOfRange { field: &'static str, value: String },

    #[error("relative vectors do not match core keypoints (missing {missing:?}, extra {extra:?})")]
    InconsistentVectors {
        missing: Vec<KeypointName>,
        extra: Vec<KeypointName>,
    },

    #[error("unknown camera type: {0}")]
    UnknownCameraType(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("backend rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("no template with index {0}")]
    UnknownTemplate(u32),

    #[error("no draft is open")]
    NoDraft,

    #[error("template catalog is not loaded; run list first")]
    CatalogNotLoaded,

    #[error("{0}")]
    CaptureRefused(&'static str),

    #[error("failed to decode backend payload")]
    Decode(#[source] serde_json::Error),
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Refused locally before anything was attempted; shown as a warning.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::CaptureRefused(_)
                | Error::CatalogNotLoaded
                | Error::NoDraft
                | Error::UnknownTemplate(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Transport(format!("invalid response body: {e}"))
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
