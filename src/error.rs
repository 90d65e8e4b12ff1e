use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("microservice is not a business moments adaptor")]
    NotBusinessMomentsAdaptor,

    #[error("invalid environment variable: {0}")]
    InvalidEnvironmentVariable(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("push rejected: {0}")]
    PushRejected(String),

    #[error("local branch cannot be fast-forwarded to the remote")]
    NotFastForward,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{source}; rollback also failed: {rollback}")]
    Rollback {
        source: Box<Error>,
        rollback: Box<Error>,
    },
}

impl Error {
    /// Maps Kubernetes API status codes onto the typed variants callers match on.
    pub(crate) fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref response) if response.code == 404 => Self::NotFound,
            kube::Error::Api(ref response) if response.code == 409 => Self::AlreadyExists,
            other => Self::Kube(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
