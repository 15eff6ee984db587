//! The response envelope returned by the upstream API client.
//!
//! The client itself (transport, authentication, retries) is not part of this crate. Every
//! endpoint returns an [`Envelope`] holding the status code, the raw body and whichever typed
//! branch the body decoded into.
use std::collections::BTreeMap;

use http::StatusCode;
use serde::Deserialize;

/// Any error raised by the client before a response envelope was produced.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A generic API error body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorList {
    #[serde(default)]
    pub errors: Vec<String>,
}

/// A field-level validation error body, mapping each field to all of its messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FieldErrors {
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
}

/// A populated error branch of a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorBranch<'a> {
    Generic(&'a ApiErrorList),
    Validation(&'a FieldErrors),
}

impl ErrorBranch<'_> {
    /// Renders every message of the branch, including each field's full message list.
    pub fn describe(&self) -> String {
        match self {
            Self::Generic(list) => list.errors.join(", "),
            Self::Validation(fields) => fields
                .errors
                .iter()
                .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// A response envelope as seen by the generic record plumbing.
pub trait ApiResponse {
    fn status(&self) -> StatusCode;

    /// All populated error branches, in a stable order.
    fn error_branches(&self) -> Vec<ErrorBranch<'_>>;

    /// The raw body, reported when the status matches no typed branch.
    fn body(&self) -> &[u8] {
        &[]
    }

    fn is_not_found(&self) -> bool {
        self.status() == StatusCode::NOT_FOUND
    }
}

/// The response of a single endpoint call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope<D> {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub detail: Option<D>,
    pub not_found: Option<ApiErrorList>,
    pub validation_error: Option<FieldErrors>,
    pub error: Option<ApiErrorList>,
}

impl<D> Envelope<D> {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            body: Vec::new(),
            detail: None,
            not_found: None,
            validation_error: None,
            error: None,
        }
    }

    pub fn ok(detail: D) -> Self {
        Self {
            detail: Some(detail),
            ..Self::new(StatusCode::OK)
        }
    }

    pub fn not_found() -> Self {
        Self {
            not_found: Some(ApiErrorList {
                errors: vec!["not found".to_owned()],
            }),
            ..Self::new(StatusCode::NOT_FOUND)
        }
    }

    pub fn with_validation_error(mut self, errors: FieldErrors) -> Self {
        self.validation_error = Some(errors);
        self
    }

    pub fn with_error(mut self, errors: ApiErrorList) -> Self {
        self.error = Some(errors);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Splits off the detail, as handed to record projections.
    pub fn take_detail(&mut self) -> Option<D> {
        self.detail.take()
    }
}

impl<D> ApiResponse for Envelope<D> {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn error_branches(&self) -> Vec<ErrorBranch<'_>> {
        let mut branches = Vec::new();
        if let Some(fields) = &self.validation_error {
            branches.push(ErrorBranch::Validation(fields));
        }
        if let Some(list) = &self.error {
            branches.push(ErrorBranch::Generic(list));
        }
        branches
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn validation_errors_list_every_message() {
        let fields: FieldErrors = serde_json::from_str(indoc! {r#"
            {
              "errors": {
                "origin_url": ["must use https", "must not be empty"],
                "label": ["is too long"]
              }
            }
        "#})
        .unwrap();

        assert_eq!(
            ErrorBranch::Validation(&fields).describe(),
            "label: is too long; origin_url: must use https, must not be empty"
        );
    }

    #[test]
    fn branches_are_reported_in_order() {
        let envelope = Envelope::<()>::new(StatusCode::UNPROCESSABLE_ENTITY)
            .with_error(ApiErrorList {
                errors: vec!["quota exceeded".to_owned()],
            })
            .with_validation_error(FieldErrors::default());

        let branches = envelope.error_branches();
        assert!(matches!(branches[0], ErrorBranch::Validation(_)));
        assert!(matches!(branches[1], ErrorBranch::Generic(_)));
        assert!(!envelope.is_not_found());
        assert!(Envelope::<()>::not_found().is_not_found());
    }
}
