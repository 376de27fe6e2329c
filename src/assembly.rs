// Result Assembly - merge place records with their resolved status
//
// Search: interpret query → store filter → resolve each candidate.
// Detail: load one place → resolve.
// `now` is sampled once per request by the caller and shared by every
// resolution in it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::PlaceStore;
use crate::error::{IsItOpenError, Result};
use crate::models::Place;
use crate::policy::{Pagination, StatusPolicy, REPORT_HISTORY_LIMIT};
use crate::query::interpret_query;
use crate::status::ResolvedStatus;

/// A place with its status merged into one flat JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceWithStatus {
    #[serde(flatten)]
    pub place: Place,

    #[serde(flatten)]
    pub status: ResolvedStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub results: Vec<PlaceWithStatus>,
    pub page: u32,
    pub limit: u32,
}

/// Resolve the status of one place from its recent report history
pub fn resolve_place<S: PlaceStore + ?Sized>(
    store: &S,
    place: Place,
    policy: &StatusPolicy,
    now: DateTime<Utc>,
) -> Result<PlaceWithStatus> {
    let reports = store.find_reports_for_place(&place.id, REPORT_HISTORY_LIMIT)?;
    let status = policy.resolve(&reports, now);

    Ok(PlaceWithStatus { place, status })
}

/// Resolve a page of places. Each result stays paired with its own place.
pub fn resolve_places<S: PlaceStore + ?Sized>(
    store: &S,
    places: Vec<Place>,
    policy: &StatusPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<PlaceWithStatus>> {
    places
        .into_iter()
        .map(|place| resolve_place(store, place, policy, now))
        .collect()
}

pub fn search<S: PlaceStore + ?Sized>(
    store: &S,
    query: &str,
    city: &str,
    pagination: Pagination,
    policy: &StatusPolicy,
    now: DateTime<Utc>,
) -> Result<SearchPage> {
    let filter = interpret_query(query, city);
    debug!(query, city, clauses = filter.clauses.len(), "search");

    let places = store.find_places(&filter, pagination)?;
    let results = resolve_places(store, places, policy, now)?;

    Ok(SearchPage {
        results,
        page: pagination.page,
        limit: pagination.limit,
    })
}

pub fn place_detail<S: PlaceStore + ?Sized>(
    store: &S,
    place_id: &str,
    policy: &StatusPolicy,
    now: DateTime<Utc>,
) -> Result<PlaceWithStatus> {
    let place = store
        .get_place(place_id)?
        .ok_or_else(|| IsItOpenError::place_not_found(place_id))?;

    resolve_place(store, place, policy, now)
}
