//! Ride request lifecycle.
//!
//! [`RequestLifecycle`] is the only writer of `requests.status` and, after a
//! trip is created, of `shares.spots`. Every transition runs in one immediate
//! transaction, so a request becomes APPROVED exactly when a seat is taken
//! from its trip and leaves APPROVED exactly when the seat is returned.

use carpool_common::{ParseStatusError, RequestStatus};
use rusqlite::{params, Transaction};

use crate::models::RideRequest;
use crate::store::{query_request, query_share, Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid target status: {0}")]
    InvalidArgument(#[from] ParseStatusError),

    #[error("Request not found: {0}")]
    NotFound(i64),

    /// The request's trip has no free seat (or no longer exists).
    #[error("No spots available for trip {0}")]
    NoCapacity(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(err: rusqlite::Error) -> Self {
        LifecycleError::Store(StoreError::Database(err))
    }
}

/// Parse a client-supplied target status.
pub fn parse_target(status: &str) -> Result<RequestStatus, LifecycleError> {
    Ok(status.parse()?)
}

pub struct RequestLifecycle<'a> {
    store: &'a Store,
}

impl<'a> RequestLifecycle<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Move a request to `target`, keeping its trip's seat count consistent.
    ///
    /// - APPROVED from PENDING takes one seat, or fails with `NoCapacity`
    ///   when none is left. APPROVED from any other status is a no-op.
    /// - PENDING or DECLINED from APPROVED returns the seat.
    /// - Re-applying the current PENDING or DECLINED status is a no-op.
    ///
    /// On error nothing is written.
    pub fn transition(
        &self,
        request_id: i64,
        target: RequestStatus,
    ) -> Result<RideRequest, LifecycleError> {
        let result = self.store.with_transaction(|tx| {
            let current =
                query_request(tx, request_id)?.ok_or(LifecycleError::NotFound(request_id))?;

            match target {
                RequestStatus::Approved => approve(tx, current),
                RequestStatus::Pending | RequestStatus::Declined => release(tx, current, target),
            }
        });

        match &result {
            Ok(request) => tracing::info!(
                request_id,
                share_id = request.share_id,
                status = %request.status,
                "Request transitioned"
            ),
            Err(LifecycleError::NoCapacity(share_id)) => tracing::info!(
                request_id,
                share_id,
                "Approval refused: trip is full"
            ),
            Err(e) => tracing::debug!(request_id, target = %target, "Transition failed: {}", e),
        }

        result
    }
}

fn approve(tx: &Transaction<'_>, current: RideRequest) -> Result<RideRequest, LifecycleError> {
    if current.status != RequestStatus::Pending {
        return Ok(current);
    }

    let share_id = current.share_id;
    let has_capacity = query_share(tx, share_id)?
        .map(|share| share.has_capacity())
        .unwrap_or(false);
    if !has_capacity {
        return Err(LifecycleError::NoCapacity(share_id));
    }

    // Guarded even though the immediate transaction already serializes writers.
    let taken = tx.execute(
        "UPDATE shares SET spots = spots - 1 WHERE id = ?1 AND spots > 0",
        params![share_id],
    )?;
    if taken != 1 {
        return Err(LifecycleError::NoCapacity(share_id));
    }

    set_status(tx, current, RequestStatus::Approved)
}

fn release(
    tx: &Transaction<'_>,
    current: RideRequest,
    target: RequestStatus,
) -> Result<RideRequest, LifecycleError> {
    if current.status == target {
        return Ok(current);
    }

    if current.status.holds_seat() {
        tx.execute(
            "UPDATE shares SET spots = spots + 1 WHERE id = ?1",
            params![current.share_id],
        )?;
    }

    set_status(tx, current, target)
}

fn set_status(
    tx: &Transaction<'_>,
    mut request: RideRequest,
    status: RequestStatus,
) -> Result<RideRequest, LifecycleError> {
    tx.execute(
        "UPDATE requests SET status = ?1 WHERE id = ?2",
        params![status.as_str(), request.id],
    )?;
    request.status = status;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{new_share, new_user};
    use std::sync::Arc;
    use std::thread;

    struct Fixture {
        store: Store,
        share_id: i64,
        next_rider: usize,
    }

    impl Fixture {
        fn with_spots(spots: i64) -> Self {
            let store = Store::open_in_memory().unwrap();
            let driver = store.insert_user(&new_user("driver@sp.senac.br")).unwrap();
            let share = store.insert_share(&new_share(driver.id, spots)).unwrap();
            Self {
                store,
                share_id: share.id,
                next_rider: 0,
            }
        }

        fn request(&mut self) -> i64 {
            self.next_rider += 1;
            let email = format!("rider{}@sp.senac.br", self.next_rider);
            let rider = self.store.insert_user(&new_user(&email)).unwrap();
            self.store
                .insert_request(self.share_id, rider.id, None)
                .unwrap()
                .id
        }

        fn spots(&self) -> i64 {
            self.store.find_share(self.share_id).unwrap().unwrap().spots
        }

        fn status(&self, request_id: i64) -> RequestStatus {
            self.store.find_request(request_id).unwrap().unwrap().status
        }

        fn transition(&self, request_id: i64, target: RequestStatus) -> Result<RideRequest, LifecycleError> {
            RequestLifecycle::new(&self.store).transition(request_id, target)
        }
    }

    #[test]
    fn test_approve_takes_one_seat() {
        let mut fx = Fixture::with_spots(2);
        let req = fx.request();

        let approved = fx.transition(req, RequestStatus::Approved).unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(fx.spots(), 1);
        assert_eq!(fx.status(req), RequestStatus::Approved);
    }

    #[test]
    fn test_approve_twice_is_idempotent() {
        let mut fx = Fixture::with_spots(2);
        let req = fx.request();

        fx.transition(req, RequestStatus::Approved).unwrap();
        let again = fx.transition(req, RequestStatus::Approved).unwrap();
        assert_eq!(again.status, RequestStatus::Approved);
        assert_eq!(fx.spots(), 1);
    }

    #[test]
    fn test_approve_then_decline_restores_spots() {
        let mut fx = Fixture::with_spots(2);
        let req = fx.request();

        fx.transition(req, RequestStatus::Approved).unwrap();
        let declined = fx.transition(req, RequestStatus::Declined).unwrap();
        assert_eq!(declined.status, RequestStatus::Declined);
        assert_eq!(fx.spots(), 2);
    }

    #[test]
    fn test_approved_back_to_pending_returns_seat() {
        let mut fx = Fixture::with_spots(1);
        let req = fx.request();

        fx.transition(req, RequestStatus::Approved).unwrap();
        assert_eq!(fx.spots(), 0);
        fx.transition(req, RequestStatus::Pending).unwrap();
        assert_eq!(fx.spots(), 1);
        assert_eq!(fx.status(req), RequestStatus::Pending);
    }

    #[test]
    fn test_approve_without_capacity_changes_nothing() {
        let mut fx = Fixture::with_spots(0);
        let req = fx.request();

        let err = fx.transition(req, RequestStatus::Approved).unwrap_err();
        assert!(matches!(err, LifecycleError::NoCapacity(id) if id == fx.share_id));
        assert_eq!(fx.spots(), 0);
        assert_eq!(fx.status(req), RequestStatus::Pending);
    }

    #[test]
    fn test_unknown_request_is_not_found() {
        let fx = Fixture::with_spots(1);

        let err = fx.transition(404, RequestStatus::Approved).unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(404)));
        let err = fx.transition(404, RequestStatus::Declined).unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(404)));
    }

    #[test]
    fn test_declined_request_is_not_approved_again() {
        let mut fx = Fixture::with_spots(2);
        let req = fx.request();

        fx.transition(req, RequestStatus::Declined).unwrap();
        let unchanged = fx.transition(req, RequestStatus::Approved).unwrap();
        assert_eq!(unchanged.status, RequestStatus::Declined);
        assert_eq!(fx.spots(), 2);
    }

    #[test]
    fn test_declining_declined_request_is_noop() {
        let mut fx = Fixture::with_spots(2);
        let req = fx.request();

        fx.transition(req, RequestStatus::Declined).unwrap();
        let again = fx.transition(req, RequestStatus::Declined).unwrap();
        assert_eq!(again.status, RequestStatus::Declined);
        assert_eq!(fx.spots(), 2);
    }

    #[test]
    fn test_declining_pending_request_keeps_spots() {
        let mut fx = Fixture::with_spots(3);
        let req = fx.request();

        fx.transition(req, RequestStatus::Declined).unwrap();
        assert_eq!(fx.spots(), 3);
    }

    #[test]
    fn test_three_seat_scenario() {
        let mut fx = Fixture::with_spots(3);
        let a = fx.request();
        let b = fx.request();

        fx.transition(a, RequestStatus::Approved).unwrap();
        assert_eq!(fx.spots(), 2);
        fx.transition(b, RequestStatus::Approved).unwrap();
        assert_eq!(fx.spots(), 1);
        fx.transition(a, RequestStatus::Declined).unwrap();
        assert_eq!(fx.spots(), 2);
    }

    #[test]
    fn test_last_seat_scenario() {
        let mut fx = Fixture::with_spots(1);
        let a = fx.request();
        let b = fx.request();

        fx.transition(a, RequestStatus::Approved).unwrap();
        assert_eq!(fx.spots(), 0);

        let err = fx.transition(b, RequestStatus::Approved).unwrap_err();
        assert!(matches!(err, LifecycleError::NoCapacity(_)));
        assert_eq!(fx.spots(), 0);
        assert_eq!(fx.status(b), RequestStatus::Pending);
    }

    #[test]
    fn test_seat_freed_by_decline_can_be_reused() {
        let mut fx = Fixture::with_spots(1);
        let a = fx.request();
        let b = fx.request();

        fx.transition(a, RequestStatus::Approved).unwrap();
        fx.transition(a, RequestStatus::Declined).unwrap();
        fx.transition(b, RequestStatus::Approved).unwrap();
        assert_eq!(fx.spots(), 0);
        assert_eq!(fx.status(a), RequestStatus::Declined);
        assert_eq!(fx.status(b), RequestStatus::Approved);
    }

    #[test]
    fn test_spots_never_negative_over_mixed_sequence() {
        let initial = 2;
        let mut fx = Fixture::with_spots(initial);
        let requests: Vec<i64> = (0..4).map(|_| fx.request()).collect();
        let script = [
            RequestStatus::Approved,
            RequestStatus::Approved,
            RequestStatus::Declined,
            RequestStatus::Approved,
            RequestStatus::Pending,
            RequestStatus::Approved,
        ];

        for (step, target) in script.iter().cycle().take(40).enumerate() {
            let req = requests[step % requests.len()];
            let _ = fx.transition(req, *target);

            let spots = fx.spots();
            let approved = requests
                .iter()
                .filter(|id| fx.status(**id) == RequestStatus::Approved)
                .count() as i64;
            assert!(spots >= 0);
            assert_eq!(spots + approved, initial);
        }
    }

    #[test]
    fn test_concurrent_approvals_for_last_seat() {
        let mut fx = Fixture::with_spots(1);
        let requests: Vec<i64> = (0..8).map(|_| fx.request()).collect();
        let share_id = fx.share_id;
        let store = Arc::new(fx.store);

        let handles: Vec<_> = requests
            .iter()
            .map(|&id| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    RequestLifecycle::new(&store).transition(id, RequestStatus::Approved)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let approved = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(LifecycleError::NoCapacity(_))))
            .count();

        assert_eq!(approved, 1);
        assert_eq!(refused, requests.len() - 1);
        assert_eq!(store.find_share(share_id).unwrap().unwrap().spots, 0);
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("APPROVED").unwrap(), RequestStatus::Approved);
        assert!(matches!(
            parse_target("CANCELLED"),
            Err(LifecycleError::InvalidArgument(_))
        ));
    }
}
