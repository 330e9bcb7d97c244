//! # Conversion Handler

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;
use std::sync::Arc;

use crate::converters::{ConvertedRecord, ConverterKind, Record};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::WebState;

/// Convert one record: POST /api/convert/{kind}
///
/// The body is the record as a JSON object; the response is the converted record.
pub async fn convert_record(
    State(state): State<Arc<WebState>>,
    Path(kind): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ConvertedRecord>> {
    let kind: ConverterKind = kind
        .parse()
        .map_err(|_| ApiError::unknown_converter(kind.as_str()))?;

    let Json(body) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let record = Record::from_value(body)?;

    let converted = state.service().process(kind, record).await?;
    Ok(Json(converted))
}
