//! Collaborator and persistence seams.
//!
//! The engine is generic over these traits so that probing passes can be
//! driven against HTTP clients in production and in-process fakes in tests.
//! Every future is `Send`: passes run inside multi-threaded tokio handlers.

use std::future::Future;

use proploc_core::model::{
    CandidateFingerprint, GeoPoint, NewSearchRun, PoolObservation, RequestStatus, ResolvedAddress,
    SearchZone, VisualAssets, VisualSignature,
};
use uuid::Uuid;

use crate::error::{CollaboratorError, StoreError};

/// Reverse-geocoding collaborator.
pub trait ReverseGeocoder: Send + Sync {
    /// Resolve a sampled coordinate to a street-level address.
    ///
    /// `Ok(None)` means the service answered but found no usable street-level
    /// address at this point — the point is dropped, not an error.
    fn reverse(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<Option<ResolvedAddress>, CollaboratorError>> + Send;

    /// Generic addresses near the zone centre, used to pad a batch when too
    /// few genuine candidates survive exclusion.
    fn search_near(
        &self,
        zone: &SearchZone,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ResolvedAddress>, CollaboratorError>> + Send;
}

/// Aerial pool-detection collaborator.
pub trait PoolDetector: Send + Sync {
    fn detect(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<PoolObservation, CollaboratorError>> + Send;
}

/// Visual-asset collaborator: satellite / street-level / cadastral imagery
/// references for presenting a candidate.
pub trait ImageryProvider: Send + Sync {
    fn assets(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<VisualAssets, CollaboratorError>> + Send;
}

/// A localisation request as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredRequest {
    pub id: Uuid,
    pub zone: SearchZone,
    pub signature: VisualSignature,
    pub user_hints: Option<String>,
    pub status: RequestStatus,
    /// Number of search runs already appended (level of the next run).
    pub completed_runs: u32,
}

/// Durable record store for localisation requests and their search runs.
///
/// Runs are append-only: one append per completed pass, after selection,
/// never mutated in place. `history` must see every previously committed run
/// for the request, oldest first.
pub trait RequestRepository: Send + Sync {
    fn create(
        &self,
        zone: &SearchZone,
        signature: &VisualSignature,
        user_hints: Option<&str>,
    ) -> impl Future<Output = Result<Uuid, StoreError>> + Send;

    fn fetch(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<StoredRequest>, StoreError>> + Send;

    /// Every fingerprint from every prior run for the request, oldest first.
    fn history(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Vec<CandidateFingerprint>, StoreError>> + Send;

    fn append_run(
        &self,
        id: Uuid,
        run: &NewSearchRun,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn mark_exhausted(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;
}
