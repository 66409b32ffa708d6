//! Postgres-backed implementation of the engine's request repository.

use std::future::Future;

use proploc_core::model::{CandidateFingerprint, NewSearchRun, SearchZone, VisualSignature};
use proploc_engine::error::StoreError;
use proploc_engine::traits::{RequestRepository, StoredRequest};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{requests, runs, DbError};

/// Repository over a shared connection pool. Cloning shares the pool.
#[derive(Clone)]
pub struct PgRequestRepository {
    pool: PgPool,
}

impl PgRequestRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_err(err: DbError) -> StoreError {
    StoreError::Backend(Box::new(err))
}

impl RequestRepository for PgRequestRepository {
    fn create(
        &self,
        zone: &SearchZone,
        signature: &VisualSignature,
        user_hints: Option<&str>,
    ) -> impl Future<Output = Result<Uuid, StoreError>> + Send {
        let zone = zone.clone();
        let signature = signature.clone();
        let user_hints = user_hints.map(str::to_owned);
        async move {
            let row = requests::create_localisation_request(
                &self.pool,
                &zone,
                &signature,
                user_hints.as_deref(),
            )
            .await
            .map_err(store_err)?;
            Ok(row.id)
        }
    }

    fn fetch(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<StoredRequest>, StoreError>> + Send {
        async move {
            let Some(row) = requests::get_localisation_request(&self.pool, id)
                .await
                .map_err(store_err)?
            else {
                return Ok(None);
            };
            let completed_runs = runs::count_search_runs(&self.pool, id)
                .await
                .map_err(store_err)?;
            let signature = row.signature().map_err(store_err)?;
            Ok(Some(StoredRequest {
                id: row.id,
                zone: row.zone(),
                signature,
                user_hints: row.user_hints.clone(),
                status: row.status(),
                completed_runs,
            }))
        }
    }

    fn history(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Vec<CandidateFingerprint>, StoreError>> + Send {
        async move {
            runs::load_fingerprint_history(&self.pool, id)
                .await
                .map_err(store_err)
        }
    }

    fn append_run(
        &self,
        id: Uuid,
        run: &NewSearchRun,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        let run = run.clone();
        async move {
            runs::append_search_run(&self.pool, id, &run)
                .await
                .map_err(store_err)?;
            Ok(())
        }
    }

    fn mark_exhausted(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            match requests::mark_request_exhausted(&self.pool, id).await {
                Ok(()) => Ok(()),
                Err(DbError::NotFound) => Err(StoreError::RequestNotFound(id)),
                Err(e) => Err(store_err(e)),
            }
        }
    }
}
