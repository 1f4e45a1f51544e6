//! Evolution of a single value over the long coverage window.

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::NaiveDate;
use potiron_core::{DayScore, FieldKey, KeyTranslator};
use serde::{Deserialize, Serialize};

use super::{blocking, resolve_day};
use crate::cache::get_or_compute;
use crate::error::ApiError;
use crate::state::AppState;

/// Daily scores of one value of one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResponse {
    pub field: String,
    /// Label as requested.
    pub key: String,
    /// Stored value the label translates to.
    pub member: String,
    /// Last day of the history.
    pub day: NaiveDate,
    /// One entry per day, oldest first, zero where the value was not seen.
    pub history: Vec<DayScore>,
}

/// `GET /api/v1/evolution/{date}/{field}/{key}`
///
/// `date` accepts `YYYYMMDD` and `YYYY-MM-DD`; anything else falls back to
/// the latest day. Cached per day, field and key.
pub async fn evolution(
    State(state): State<AppState>,
    Path((date, field, key)): Path<(String, String, String)>,
) -> Result<Json<EvolutionResponse>, ApiError> {
    let day = blocking(&state, move |session| resolve_day(session, Some(date.as_str()))).await?;
    Ok(Json(history(&state, day, field, key).await?))
}

/// Query parameters of the custom evolution form.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomQuery {
    /// Field to look in.
    pub fieldname: Option<String>,
    /// Label of the value.
    pub field: Option<String>,
    /// Last day (`YYYY-MM-DD`), defaults to the latest day.
    pub date: Option<String>,
}

/// `GET /api/v1/custom`
///
/// Same as the evolution endpoint, for a field and value typed in by the
/// user. The field must be known to the sensor.
pub async fn custom(
    State(state): State<AppState>,
    Query(params): Query<CustomQuery>,
) -> Result<Json<EvolutionResponse>, ApiError> {
    let fieldname = params
        .fieldname
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("no custom fieldname was specified".to_string()))?;
    let key = params.field.unwrap_or_default();
    let date = params.date;

    let (day, known) = {
        let fieldname = fieldname.clone();
        blocking(&state, move |session| {
            let known = session.is_known_field(&fieldname)?;
            Ok((resolve_day(session, date.as_deref())?, known))
        })
        .await?
    };
    if !known {
        return Err(ApiError::NotFound(format!("unknown field: {fieldname}")));
    }

    Ok(Json(history(&state, day, fieldname, key).await?))
}

async fn history(
    state: &AppState,
    day: NaiveDate,
    field: String,
    key: String,
) -> Result<EvolutionResponse, ApiError> {
    // A valid field holds no ':', so the cache key cannot be ambiguous.
    FieldKey::new(state.session.source(), &field)?;
    let window = state.config.coverage;
    let cache_key = format!("evolution:{day}:{field}:{key}");

    get_or_compute(&state.cache, &cache_key, || async {
        blocking(state, move |session| {
            let member = session.translator().to_store(&field, &key)?;
            let history = session.member_history(&field, &member, day, window)?;
            tracing::debug!(field = %field, member = %member, days = history.len(), "history loaded");
            Ok(EvolutionResponse {
                field,
                key,
                member,
                day,
                history,
            })
        })
        .await
    })
    .await
}
