mod attachment;
mod channel;
mod embed;
mod message;
mod reaction;
mod receipt;
mod role;
mod user;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};

use super::{RepositoryFactory, RepositorySet, RepositoryTransaction};

use attachment::PgAttachmentRepository;
use channel::PgChannelRepository;
use embed::PgEmbedRepository;
use message::PgMessageRepository;
use reaction::PgReactionRepository;
use receipt::PgReadReceiptRepository;
use role::PgRoleRepository;
use user::PgUserRepository;

/// Every Postgres repo struct holds one of these rather than a bare
/// `PgPool`, so the exact same implementation backs both the pool-wide
/// `RepositorySet` and a transaction-bound one (§4.1 `WithTransaction`).
/// The transaction variant is wrapped in `Arc<Mutex<_>>` because several
/// sibling repos (message/attachment/embed) share one transaction across
/// one service-level call — sqlx's `Transaction` isn't `Clone`, and the
/// repos only ever touch it sequentially within that call, so the mutex
/// never contends in practice.
#[derive(Clone)]
pub(super) enum Executor {
    Pool(PgPool),
    Tx(Arc<Mutex<Transaction<'static, Postgres>>>),
}

fn build_set(executor: Executor) -> RepositorySet {
    RepositorySet {
        messages: Box::new(PgMessageRepository::new(executor.clone())),
        channels: Box::new(PgChannelRepository::new(executor.clone())),
        reactions: Box::new(PgReactionRepository::new(executor.clone())),
        receipts: Box::new(PgReadReceiptRepository::new(executor.clone())),
        attachments: Box::new(PgAttachmentRepository::new(executor.clone())),
        embeds: Box::new(PgEmbedRepository::new(executor.clone())),
        users: Box::new(PgUserRepository::new(executor.clone())),
        roles: Box::new(PgRoleRepository::new(executor)),
    }
}

/// The production `RepositoryFactory`: a pool-backed set for reads, and a
/// fresh `sqlx::Transaction` (acquired from the same pool) for every
/// multi-entity write the Messaging service performs.
pub struct PgRepositoryFactory {
    pool_repos: RepositorySet,
    pool: PgPool,
}

impl PgRepositoryFactory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool_repos: build_set(Executor::Pool(pool.clone())),
            pool,
        }
    }
}

#[async_trait]
impl RepositoryFactory for PgRepositoryFactory {
    fn repos(&self) -> &RepositorySet {
        &self.pool_repos
    }

    async fn begin(&self) -> AppResult<Box<dyn RepositoryTransaction>> {
        let tx = self.pool.begin().await?;
        let shared = Arc::new(Mutex::new(tx));
        let repos = build_set(Executor::Tx(Arc::clone(&shared)));
        Ok(Box::new(PgTransaction { shared, repos }))
    }
}

struct PgTransaction {
    shared: Arc<Mutex<Transaction<'static, Postgres>>>,
    repos: RepositorySet,
}

#[async_trait]
impl RepositoryTransaction for PgTransaction {
    fn repos(&self) -> &RepositorySet {
        &self.repos
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        // `self.repos` holds eight clones of `shared` (one per repository,
        // see `build_set`), so `try_unwrap` fails until they're dropped.
        let PgTransaction { shared, repos } = *self;
        drop(repos);
        let tx = Arc::try_unwrap(shared)
            .map_err(|_| AppError::Internal)?
            .into_inner();
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let PgTransaction { shared, repos } = *self;
        drop(repos);
        let tx = Arc::try_unwrap(shared)
            .map_err(|_| AppError::Internal)?
            .into_inner();
        tx.rollback().await?;
        Ok(())
    }
}
