use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use fridge_settlement_engine::SettlementError;
use log::error;
use thiserror::Error;

const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Could not read query string: {0}")]
    InvalidQuery(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    GatewayUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::InvalidSignature(_) => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal errors are logged in full, but the caller only gets a generic message.
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!("💻️ {self}");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("The access token is invalid. {0}")]
    InvalidToken(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The request signature is invalid. {0}")]
    InvalidSignature(String),
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        use SettlementError::*;
        match e {
            ValidationError(_) | GatewayDeclined(_) | InsufficientFunds { .. } | InsufficientStock { .. } => {
                Self::InvalidRequest(e.to_string())
            },
            e if e.is_not_found() => Self::NoRecordFound(e.to_string()),
            e if e.is_invalid_state() => Self::Conflict(e.to_string()),
            GatewayError(_) => Self::GatewayUnavailable(e.to_string()),
            e => Self::BackendError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use fridge_settlement_engine::db_types::{Brl, OrderStatusType};

    use super::*;

    fn status_of(e: SettlementError) -> StatusCode {
        ServerError::from(e).status_code()
    }

    #[test]
    fn settlement_errors_map_to_status_codes() {
        assert_eq!(status_of(SettlementError::ValidationError("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(SettlementError::GatewayDeclined("cc_rejected".into())), StatusCode::BAD_REQUEST);
        let funds = SettlementError::InsufficientFunds { available: Brl::from(1), required: Brl::from(2) };
        assert_eq!(status_of(funds), StatusCode::BAD_REQUEST);
        let stock = SettlementError::InsufficientStock { product_id: 1, requested: 2, available: 1 };
        assert_eq!(status_of(stock), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(SettlementError::OrderNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(SettlementError::RecipientNotFound("a@b.c".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(SettlementError::InvalidState("x".into())), StatusCode::CONFLICT);
        let transition = SettlementError::IllegalOrderTransition {
            order_id: 1,
            status: OrderStatusType::Refunded,
            message: "x".into(),
        };
        assert_eq!(status_of(transition), StatusCode::CONFLICT);
        assert_eq!(status_of(SettlementError::GatewayError("timeout".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(SettlementError::DatabaseError("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(SettlementError::ConsistencyViolation("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn internal_details_are_not_leaked() {
        let err = ServerError::from(SettlementError::DatabaseError("disk I/O error at /var/db".into()));
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], INTERNAL_ERROR_MESSAGE);
    }
}
