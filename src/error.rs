use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::Debug;

// Codes 1..=99 are internal faults, 100..=109 caller faults, 110..=119
// negotiation state conflicts, 120 settlement declines.
#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    pub fn env_var_error(_: env::VarError) -> Self {
        Self {
            code: 1,
            message: "environment variable error".into(),
        }
    }

    pub fn database_error<T: Debug>(_: T) -> Self {
        Self {
            code: 2,
            message: "database error".into(),
        }
    }

    pub fn reqwest_error(_: reqwest::Error) -> Self {
        Self {
            code: 3,
            message: "reqwest error".into(),
        }
    }

    pub fn upstream_error() -> Self {
        Self {
            code: 4,
            message: "upstream error".into(),
        }
    }

    pub fn unexpected_error() -> Self {
        Self {
            code: 5,
            message: "unexpected error".into(),
        }
    }

    pub fn invalid_input_error() -> Self {
        Self {
            code: 100,
            message: "invalid input".into(),
        }
    }

    pub fn unauthorized_error() -> Self {
        Self {
            code: 101,
            message: "unauthorized".into(),
        }
    }

    pub fn ride_not_biddable_error() -> Self {
        Self {
            code: 110,
            message: "ride is not open for bidding".into(),
        }
    }

    pub fn duplicate_bid_error() -> Self {
        Self {
            code: 111,
            message: "driver already has an open offer on this ride".into(),
        }
    }

    pub fn stale_bid_error() -> Self {
        Self {
            code: 112,
            message: "bid has been superseded by a newer round".into(),
        }
    }

    pub fn not_your_turn_error() -> Self {
        Self {
            code: 113,
            message: "awaiting a response from the other party".into(),
        }
    }

    pub fn thread_closed_error() -> Self {
        Self {
            code: 114,
            message: "negotiation is closed".into(),
        }
    }

    pub fn max_rounds_error() -> Self {
        Self {
            code: 115,
            message: "negotiation round limit reached".into(),
        }
    }

    pub fn invalid_transition_error() -> Self {
        Self {
            code: 116,
            message: "ride state does not allow this transition".into(),
        }
    }

    pub fn payment_failed_error() -> Self {
        Self {
            code: 120,
            message: "charge was declined".into(),
        }
    }

    pub fn is_invalid_input_error(&self) -> bool {
        self.code == 100
    }

    pub fn is_unauthorized_error(&self) -> bool {
        self.code == 101
    }

    pub fn is_state_conflict_error(&self) -> bool {
        (110..=119).contains(&self.code)
    }

    pub fn is_payment_failed_error(&self) -> bool {
        self.code == 120
    }
}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        Error::env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::reqwest_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        tracing::error!("authorizor error: {}", err);
        Error::unexpected_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            101 => (StatusCode::FORBIDDEN, self.message.as_str()),
            110..=119 => (StatusCode::CONFLICT, self.message.as_str()),
            120 => (StatusCode::PAYMENT_REQUIRED, self.message.as_str()),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
