//! Status-code driven error classification.
//!
//! [`classify`] is a pure, total function: every status code maps to exactly one
//! [`Error`] variant, and a malformed body never makes classification fail. For
//! each recognized code the body is parsed as the status-specific shape first,
//! then as the generic `{code?, message, ...}` shape, and finally used verbatim
//! as the message.

use crate::error::{ApiError, Error, FieldError};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

/// `{code?, message, ...}`; any other fields become [`ApiError::details`].
#[derive(Debug, Deserialize)]
struct GenericBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// `{code, message, required, available}`
#[derive(Debug, Deserialize)]
struct PaymentRequiredBody {
    #[serde(default)]
    required: Option<f64>,
    #[serde(default)]
    available: Option<f64>,
}

/// `{message, resource}`
#[derive(Debug, Deserialize)]
struct NotFoundBody {
    #[serde(default)]
    resource: Option<String>,
}

/// `{code, message, service}`
#[derive(Debug, Deserialize)]
struct ThirdPartyBody {
    #[serde(default)]
    service: Option<String>,
}

/// Classifies a non-success response into a typed [`Error`].
///
/// # Examples
///
/// ```
/// use pixbank::{classify, ErrorKind};
/// use http::StatusCode;
///
/// let err = classify(
///     StatusCode::CONFLICT,
///     br#"{"code":"TXID_DUPLICATED","message":"txid already used"}"#,
/// );
/// assert_eq!(err.kind(), ErrorKind::BusinessRule);
/// assert_eq!(err.code(), Some("TXID_DUPLICATED"));
/// assert_eq!(err.status(), Some(StatusCode::CONFLICT));
/// ```
pub fn classify(status: StatusCode, body: &[u8]) -> Error {
    match status.as_u16() {
        400 => validation(status, body),
        401 => Error::Unauthorized(generic(status, body)),
        402 => {
            let shape = serde_json::from_slice::<PaymentRequiredBody>(body).ok();
            Error::InsufficientFunds {
                error: generic(status, body),
                required: shape.as_ref().and_then(|s| s.required),
                available: shape.and_then(|s| s.available),
            }
        }
        403 => Error::Forbidden(generic(status, body)),
        404 => Error::NotFound {
            error: generic(status, body),
            resource: serde_json::from_slice::<NotFoundBody>(body)
                .ok()
                .and_then(|s| s.resource),
        },
        405 => Error::MethodNotAllowed(generic(status, body)),
        409 => Error::BusinessRule(generic(status, body)),
        412 => Error::PreconditionFailed(generic(status, body)),
        422 => Error::Unprocessable(generic(status, body)),
        424 => Error::ThirdParty {
            error: generic(status, body),
            service: serde_json::from_slice::<ThirdPartyBody>(body)
                .ok()
                .and_then(|s| s.service),
        },
        500 => Error::ServerException(generic(status, body)),
        503 => Error::Integration(generic(status, body)),
        _ => {
            let raw = String::from_utf8_lossy(body).into_owned();
            Error::Api(ApiError::new(status, raw.clone(), raw))
        }
    }
}

/// Parses the generic error shape, falling back to the raw body as message.
fn generic(status: StatusCode, body: &[u8]) -> ApiError {
    let raw = String::from_utf8_lossy(body).into_owned();

    match serde_json::from_slice::<GenericBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| default_message(status, &raw));
            let details = if parsed.extra.is_empty() {
                None
            } else {
                Some(Value::Object(parsed.extra))
            };
            ApiError {
                status,
                code: parsed.code,
                message,
                details,
                raw_body: raw,
            }
        }
        Err(_) => ApiError::new(status, default_message(status, &raw), raw),
    }
}

fn default_message(status: StatusCode, raw: &str) -> String {
    if raw.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        raw.to_string()
    }
}

/// 400 bodies are an array of field errors; an absent or empty array falls
/// back to a single request-wide detail built from the generic shape.
fn validation(status: StatusCode, body: &[u8]) -> Error {
    let fields = serde_json::from_slice::<Vec<FieldError>>(body)
        .ok()
        .filter(|fields| !fields.is_empty());

    match fields {
        Some(fields) => {
            let raw = String::from_utf8_lossy(body).into_owned();
            let message = fields
                .iter()
                .map(|f| match &f.field {
                    Some(field) => format!("{}: {}", field, f.message),
                    None => f.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            let details = serde_json::to_value(&fields).ok();
            Error::Validation {
                error: ApiError {
                    status,
                    code: fields.iter().find_map(|f| f.code.clone()),
                    message,
                    details,
                    raw_body: raw,
                },
                fields,
            }
        }
        None => {
            let error = generic(status, body);
            let fields = vec![FieldError {
                code: error.code.clone(),
                field: None,
                message: error.message.clone(),
            }];
            Error::Validation { error, fields }
        }
    }
}
