use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Bearer token payload. `role` is one of `user`, `employee`, `admin`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
