//! Uniform `{ success, error, payload }` envelope for presentation layers.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl<T> Response<T> {
    #[must_use]
    pub const fn ok(payload: T) -> Self {
        Self {
            success: true,
            error: None,
            payload: Some(payload),
        }
    }

    #[must_use]
    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            payload: None,
        }
    }
}

impl<T, E: fmt::Display> From<Result<T, E>> for Response<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(err) => Self::failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn failure_serializes_without_payload() {
        let response: Response<u32> = Err(EngineError::NoActiveBattle).into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "no battle is in progress" })
        );

        let response: Response<u32> = Ok::<_, EngineError>(3).into();
        assert_eq!(response.payload, Some(3));
        assert!(response.error.is_none());
    }
}
