#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
    Persistence(PersistenceError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
            Self::Persistence(err) => write!(f, "server persistence error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<PersistenceError> for ServerError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn invalid_request(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidRequest, message, details),
        }
    }
}

impl From<GameApiError> for HttpApiError {
    fn from(value: GameApiError) -> Self {
        match value {
            GameApiError::GameNotFound(key) => Self {
                status: StatusCode::NOT_FOUND,
                error: ApiError::new(
                    ErrorCode::GameNotFound,
                    "no game matches the requested id or link token",
                    Some(format!("requested={key}")),
                ),
            },
            GameApiError::Engine(err) => Self::from_engine(err),
            GameApiError::Persistence(err) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::new(
                    ErrorCode::InternalError,
                    "persistence operation failed",
                    Some(err.to_string()),
                ),
            },
        }
    }
}

impl HttpApiError {
    fn from_engine(err: EngineError) -> Self {
        let (status, code) = match &err {
            EngineError::ItemNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::ItemNotFound),
            EngineError::ParticipantNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::ParticipantNotFound)
            }
            EngineError::InvalidPrice(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidPrice),
            EngineError::NoRedistributionTarget => {
                (StatusCode::BAD_REQUEST, ErrorCode::NoRedistributionTarget)
            }
            EngineError::GameExpired => (StatusCode::GONE, ErrorCode::GameExpired),
            EngineError::GameStateConflict(_) => {
                (StatusCode::CONFLICT, ErrorCode::GameStateConflict)
            }
            EngineError::BudgetInvariantViolation { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::BudgetInvariantViolation,
            ),
        };
        Self {
            status,
            error: ApiError::new(code, err.to_string(), None),
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

/// Body extractor that reports malformed JSON in the same error shape as
/// every other response instead of axum's plain-text rejection.
#[derive(Debug)]
struct ApiJson<T>(T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(HttpApiError {
                status: rejection.status(),
                error: ApiError::new(
                    ErrorCode::InvalidRequest,
                    "request body could not be read",
                    Some(rejection.body_text()),
                ),
            }),
        }
    }
}
