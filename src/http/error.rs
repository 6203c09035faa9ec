use rouille::Response;

use crate::storage::error::StoreError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// the write clashes with a row already stored
    Conflict(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(lookup) => ApiError::NotFound(format!("{lookup} not found")),

            StoreError::InvalidLink(e) => ApiError::BadRequest(e.to_string()),

            e @ StoreError::DuplicateEntry { .. } => ApiError::Conflict(e.to_string()),

            e @ (StoreError::Database(_)
            | StoreError::InvalidIgnoreList(_)
            | StoreError::Internal(_)) => {
                log::error!("request failed: {e}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Conflict(_) => 409,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => Response::text(msg).with_status_code(status),
        }
    }
}
