//! Read-only trip and request listings.

use std::collections::HashMap;

use carpool_common::SearchRidesQuery;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::params;
use serde::Serialize;

use crate::models::{RideRequest, Share};
use crate::store::{
    is_storable, request_columns, request_from_row, share_columns, share_from_row, to_db_time,
    Store, StoreError, LATEST_DB_TIME, REQUEST_COLUMN_COUNT, SHARE_COLUMN_COUNT,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    pub first_name: String,
    pub last_name: String,
}

/// A request on one of the driver's trips, with the rider's name.
#[derive(Debug, Clone, Serialize)]
pub struct TripRequest {
    #[serde(flatten)]
    pub request: RideRequest,
    pub user: PersonName,
}

/// A trip owned by the caller with every request made on it.
#[derive(Debug, Clone, Serialize)]
pub struct DrivingTrip {
    #[serde(flatten)]
    pub share: Share,
    pub requests: Vec<TripRequest>,
}

/// A request directed at one of the caller's trips.
#[derive(Debug, Clone, Serialize)]
pub struct IncomingRequest {
    #[serde(flatten)]
    pub request: RideRequest,
    pub share: Share,
    pub user: PersonName,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
}

/// A request the caller made, with the trip it targets.
#[derive(Debug, Clone, Serialize)]
pub struct RidingRequest {
    #[serde(flatten)]
    pub request: RideRequest,
    pub share: TripSummary,
}

/// A search hit with the driver's name.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub share: Share,
    pub driver: PersonName,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid date: {0}")]
pub struct InvalidDate(String);

/// Parsed search filters. Unset filters match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub origin: Option<String>,
    pub destination: Option<String>,
    /// Start of the 24-hour departure window.
    pub window_start: Option<DateTime<Utc>>,
}

impl SearchCriteria {
    /// Build criteria from query parameters.
    ///
    /// `date` may be a calendar date (`YYYY-MM-DD`, read as midnight UTC) or
    /// a full RFC 3339 timestamp.
    pub fn from_query(query: &SearchRidesQuery) -> Result<Self, InvalidDate> {
        let window_start = match non_blank(query.date.as_deref()) {
            None => None,
            Some(raw) => Some(parse_window_start(&raw)?),
        };

        Ok(Self {
            origin: non_blank(query.from.as_deref()),
            destination: non_blank(query.to.as_deref()),
            window_start,
        })
    }

    fn matches_text(&self, share: &Share) -> bool {
        contains_ignore_case(&share.origin, self.origin.as_deref())
            && contains_ignore_case(&share.destination, self.destination.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_window_start(raw: &str) -> Result<DateTime<Utc>, InvalidDate> {
    let start = match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
        Err(_) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    };
    start
        .filter(is_storable)
        .ok_or_else(|| InvalidDate(raw.to_string()))
}

fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

pub struct TripQueries<'a> {
    store: &'a Store,
}

impl<'a> TripQueries<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Trips driven by `driver_id`, each with its requests and requester names.
    pub fn driving(&self, driver_id: i64) -> Result<Vec<DrivingTrip>, StoreError> {
        self.store.with_conn(|conn| {
            let mut trips_stmt = conn.prepare(&format!(
                "SELECT {} FROM shares s WHERE s.driver_id = ?1 ORDER BY s.departure_time, s.id",
                share_columns("s")
            ))?;
            let mut trips = trips_stmt
                .query_map(params![driver_id], |row| {
                    Ok(DrivingTrip {
                        share: share_from_row(row, 0)?,
                        requests: Vec::new(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut requests_stmt = conn.prepare(&format!(
                "SELECT {}, u.first_name, u.last_name
                 FROM requests r
                 JOIN shares s ON s.id = r.share_id
                 JOIN users u ON u.id = r.user_id
                 WHERE s.driver_id = ?1
                 ORDER BY r.id",
                request_columns("r")
            ))?;
            let mut by_share: HashMap<i64, Vec<TripRequest>> = HashMap::new();
            let rows = requests_stmt.query_map(params![driver_id], |row| {
                Ok(TripRequest {
                    request: request_from_row(row, 0)?,
                    user: name_from_row(row, REQUEST_COLUMN_COUNT)?,
                })
            })?;
            for row in rows {
                let request = row?;
                by_share
                    .entry(request.request.share_id)
                    .or_default()
                    .push(request);
            }

            for trip in &mut trips {
                trip.requests = by_share.remove(&trip.share.id).unwrap_or_default();
            }
            Ok(trips)
        })
    }

    /// Requests made on trips driven by `driver_id`.
    pub fn ride_requests(&self, driver_id: i64) -> Result<Vec<IncomingRequest>, StoreError> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, {}, u.first_name, u.last_name
                 FROM requests r
                 JOIN shares s ON s.id = r.share_id
                 JOIN users u ON u.id = r.user_id
                 WHERE s.driver_id = ?1
                 ORDER BY r.id",
                request_columns("r"),
                share_columns("s")
            ))?;
            let requests = stmt
                .query_map(params![driver_id], |row| {
                    Ok(IncomingRequest {
                        request: request_from_row(row, 0)?,
                        share: share_from_row(row, REQUEST_COLUMN_COUNT)?,
                        user: name_from_row(row, REQUEST_COLUMN_COUNT + SHARE_COLUMN_COUNT)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(requests)
        })
    }

    /// Requests made by `user_id`, with the targeted trip.
    pub fn riding(&self, user_id: i64) -> Result<Vec<RidingRequest>, StoreError> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, {}
                 FROM requests r
                 JOIN shares s ON s.id = r.share_id
                 WHERE r.user_id = ?1
                 ORDER BY r.id",
                request_columns("r"),
                share_columns("s")
            ))?;
            let requests = stmt
                .query_map(params![user_id], |row| {
                    let share = share_from_row(row, REQUEST_COLUMN_COUNT)?;
                    Ok(RidingRequest {
                        request: request_from_row(row, 0)?,
                        share: TripSummary {
                            origin: share.origin,
                            destination: share.destination,
                            departure_time: share.departure_time,
                        },
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(requests)
        })
    }

    /// Trips with free seats matching the criteria.
    ///
    /// The departure window is closed on both ends: `[start, start + 24h]`.
    /// Text filters are applied after the query so that case folding covers
    /// non-ASCII place names.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<SearchResult>, StoreError> {
        let window = criteria.window_start.map(|start| {
            // Past the last storable day the window is cut at the last storable instant.
            let until = start
                .checked_add_signed(Duration::hours(24))
                .filter(is_storable)
                .map(|end| to_db_time(&end))
                .unwrap_or_else(|| LATEST_DB_TIME.to_string());
            (to_db_time(&start), until)
        });
        let (from, until) = match &window {
            Some((from, until)) => (Some(from.as_str()), Some(until.as_str())),
            None => (None, None),
        };

        let candidates = self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, u.first_name, u.last_name
                 FROM shares s
                 JOIN users u ON u.id = s.driver_id
                 WHERE s.spots > 0
                   AND (?1 IS NULL OR s.departure_time >= ?1)
                   AND (?2 IS NULL OR s.departure_time <= ?2)
                 ORDER BY s.departure_time, s.id",
                share_columns("s")
            ))?;
            let rows = stmt
                .query_map(params![from, until], |row| {
                    Ok(SearchResult {
                        share: share_from_row(row, 0)?,
                        driver: name_from_row(row, SHARE_COLUMN_COUNT)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        Ok(candidates
            .into_iter()
            .filter(|hit| criteria.matches_text(&hit.share))
            .collect())
    }
}

fn name_from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<PersonName> {
    Ok(PersonName {
        first_name: row.get(at)?,
        last_name: row.get(at + 1)?,
    })
}
