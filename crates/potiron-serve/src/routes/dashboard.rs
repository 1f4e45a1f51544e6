//! Dashboard endpoints: sensor metadata, field list and daily top values.

use axum::Json;
use axum::extract::{Query, State};
use chrono::NaiveDate;
use potiron_core::{FieldTop, TopKOptions};
use serde::{Deserialize, Serialize};

use super::{blocking, resolve_day};
use crate::cache::get_or_compute;
use crate::error::ApiError;
use crate::state::AppState;

/// Sensor metadata shown in the page header.
#[derive(Debug, Clone, Serialize)]
pub struct MetaResponse {
    pub sensor_name: String,
    pub version: String,
    /// Most recent day with data, if any.
    pub latest_day: Option<NaiveDate>,
}

/// `GET /api/v1/meta`
pub async fn meta(State(state): State<AppState>) -> Result<Json<MetaResponse>, ApiError> {
    let latest_day = blocking(&state, |session| Ok(session.latest_day()?)).await?;

    Ok(Json(MetaResponse {
        sensor_name: state.config.sensor_name.clone(),
        version: state.config.version.clone(),
        latest_day,
    }))
}

/// A field known to the sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    /// Whether the field is shown on the dashboard.
    pub enabled: bool,
}

/// `GET /api/v1/fields`
///
/// Every field in `FIELDS`, sorted by name.
pub async fn fields(State(state): State<AppState>) -> Result<Json<Vec<FieldInfo>>, ApiError> {
    let fields = blocking(&state, |session| {
        let enabled = session.enabled_fields()?;
        Ok(session
            .fields()?
            .into_iter()
            .map(|name| FieldInfo {
                enabled: enabled.contains(&name),
                name,
            })
            .collect::<Vec<_>>())
    })
    .await?;

    Ok(Json(fields))
}

/// Query parameters for the top values page.
#[derive(Debug, Clone, Deserialize)]
pub struct TopQuery {
    /// Day to show (`YYYY-MM-DD`), defaults to the latest day.
    pub date: Option<String>,
}

/// Top values of every enabled field on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopResponse {
    pub day: NaiveDate,
    pub fields: Vec<FieldTop>,
}

/// `GET /api/v1/top`
///
/// Top values of the enabled fields with the evolution of the leading ones
/// over the short coverage window. Cached per day.
pub async fn top(
    State(state): State<AppState>,
    Query(params): Query<TopQuery>,
) -> Result<Json<TopResponse>, ApiError> {
    let day = blocking(&state, move |session| resolve_day(session, params.date.as_deref())).await?;
    let options = TopKOptions {
        window: state.config.short_coverage,
        ..TopKOptions::default()
    };

    let cache_key = format!("top:{day}");
    let result = get_or_compute(&state.cache, &cache_key, || async {
        blocking(&state, move |session| {
            let fields: Vec<String> = session.enabled_fields()?.into_iter().collect();
            let fields = session.top_k(day, &fields, options)?;
            Ok(TopResponse { day, fields })
        })
        .await
    })
    .await?;

    Ok(Json(result))
}
