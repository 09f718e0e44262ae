use indexmap::IndexMap;
use stitchgate_planner::{FetchNode, ResponseField, Response, ServerError};
use thiserror::Error;
use value::{ConstValue, Name};

use crate::FetchError;

pub(crate) const UPSTREAM_FETCH_ERROR: &str = "UPSTREAM_FETCH_ERROR";
pub(crate) const UPSTREAM_INVALID_RESPONSE: &str = "UPSTREAM_INVALID_RESPONSE";

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum MergeError {
    #[error("Response key '{key}' is owned by more than one sub-request.")]
    Conflict { key: String },
}

/// Assemble the response of an operation from the settled sub-requests.
///
/// `data` holds exactly the keys of `shape`, in that order. Each key is taken
/// from the sub-request that owns it; anything else an upstream returns is
/// dropped. A failed sub-request reports one error per owned key and leaves
/// those keys `null`. An owned key missing from an upstream response without
/// errors is reported too. A `null` in a non-null field nulls the whole `data`.
pub fn merge_responses<'a>(
    shape: &[ResponseField],
    results: impl IntoIterator<Item = (&'a FetchNode, Result<Response, FetchError>)>,
) -> Result<Response, MergeError> {
    let mut owned: IndexMap<Name, ConstValue> = IndexMap::new();
    let mut errors = Vec::new();
    let mut extensions = IndexMap::new();

    let mut claim = |key: &Name, value: ConstValue| {
        if owned.insert(key.clone(), value).is_some() {
            return Err(MergeError::Conflict { key: key.to_string() });
        }
        Ok(())
    };

    for (fetch, result) in results {
        match result {
            Ok(response) => {
                let mut data = match response.data {
                    ConstValue::Object(data) => data,
                    _ => Default::default(),
                };
                let reported = !response.errors.is_empty();
                for key in &fetch.fields {
                    let value = match data.swap_remove(key) {
                        Some(value) => value,
                        None => {
                            if !reported {
                                tracing::warn!(
                                    service = %fetch.service,
                                    key = %key,
                                    "Upstream response is missing an owned field."
                                );
                                errors.push(
                                    ServerError::new(format!(
                                        "Service '{}' did not return field '{}'.",
                                        fetch.service, key
                                    ))
                                    .path(vec![ConstValue::String(key.to_string())])
                                    .extension("code", ConstValue::String(UPSTREAM_INVALID_RESPONSE.to_string()))
                                    .extension("service", ConstValue::String(fetch.service.clone())),
                                );
                            }
                            ConstValue::Null
                        },
                    };
                    claim(key, value)?;
                }
                errors.extend(response.errors);
                extensions.extend(response.extensions);
            },
            Err(err) => {
                tracing::warn!(service = err.service(), error = %err, "Sub-request failed.");
                let message = err.to_string();
                for key in &fetch.fields {
                    claim(key, ConstValue::Null)?;
                    errors.push(
                        ServerError::new(message.clone())
                            .path(vec![ConstValue::String(key.to_string())])
                            .extension("code", ConstValue::String(UPSTREAM_FETCH_ERROR.to_string()))
                            .extension("service", ConstValue::String(err.service().to_string())),
                    );
                }
            },
        }
    }

    let mut null_data = false;
    let mut data = IndexMap::new();
    for field in shape {
        let value = match &field.value {
            Some(value) => value.clone(),
            None => owned.swap_remove(&field.key).unwrap_or(ConstValue::Null),
        };
        null_data |= field.non_null && value == ConstValue::Null;
        data.insert(field.key.clone(), value);
    }

    Ok(Response {
        data: match null_data {
            true => ConstValue::Null,
            false => ConstValue::Object(data.into_iter().collect()),
        },
        errors,
        extensions,
    })
}
