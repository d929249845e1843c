pub use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
pub use diesel::prelude::*;
pub use serde::{Deserialize, Serialize};

pub use crate::auth::AuthUser;
pub use crate::error::{
    bad_request, conflict, forbidden, internal_error, not_found, refuse, unauthorized,
    unique_conflict, unwrap_tx, ApiError, TxError,
};
pub use crate::Context;
