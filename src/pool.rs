//! Bounded pools of reusable worker entities.
//!
//! ## Overview
//!
//! A pool holds a fixed population of interchangeable entities, created up
//! front by a factory. Stage drivers acquire an entity per unit of work, so a
//! pool's size is the concurrency bound of its stage. `used + idle == total`
//! holds at all times: an entity is either resting in the pool or checked out
//! to exactly one task.
//!
//! Acquisition is scoped: [`EntityPool::acquire`] hands out a [`PoolLease`]
//! that returns the entity when dropped, on every exit path including an
//! unwinding panic. Callers never release manually, which is what makes the
//! accounting reliable across failing user code.
//!
//! The pool is parameterized by its entity type, so returning an entity of the
//! wrong kind is a compile error rather than a runtime check.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};

use kanal::{AsyncReceiver, AsyncSender};

use crate::analyzer::Analyzer;
use crate::config::EngineConfig;
use crate::downloader::Downloader;
use crate::error::EngineError;

/// A worker that can live in an [`EntityPool`].
pub trait PoolEntity {
    /// Process-unique identity within this entity kind.
    fn id(&self) -> u64;
}

#[derive(Debug)]
pub struct EntityPool<E> {
    tx: AsyncSender<E>,
    rx: AsyncReceiver<E>,
    total: u32,
    closed: AtomicBool,
}

impl<E: PoolEntity> EntityPool<E> {
    /// Builds a pool of `total` entities, invoking `factory` once per slot.
    pub fn new(total: u32, mut factory: impl FnMut() -> E) -> Result<Self, EngineError> {
        if total == 0 {
            return Err(EngineError::Configuration(
                "pool size must be greater than 0".to_string(),
            ));
        }
        let (tx, rx) = kanal::bounded_async(total as usize);
        for _ in 0..total {
            // Capacity equals `total`, so seeding can never observe a full queue.
            if tx.try_send(factory()).is_err() {
                return Err(EngineError::Configuration(
                    "failed to populate entity pool".to_string(),
                ));
            }
        }
        Ok(Self {
            tx,
            rx,
            total,
            closed: AtomicBool::new(false),
        })
    }

    /// Checks an entity out, waiting until one is idle. Fails once the pool is
    /// closed.
    pub async fn acquire(&self) -> Result<PoolLease<'_, E>, EngineError> {
        if self.is_closed() {
            return Err(EngineError::PoolClosed);
        }
        let entity = self.rx.recv().await.map_err(|_| EngineError::PoolClosed)?;
        Ok(PoolLease {
            entity: Some(entity),
            pool: self,
        })
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Entities currently checked out. Zero once the pool has closed.
    pub fn used(&self) -> u32 {
        if self.is_closed() {
            return 0;
        }
        self.total.saturating_sub(self.tx.len() as u32)
    }

    /// Discards the idle population and rejects further operations. Only the
    /// first call returns true. Entities still on lease are dropped when their
    /// lease ends.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.close();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn release(&self, entity: E) {
        if self.is_closed() {
            return;
        }
        // Space is guaranteed: the slot was freed when the entity checked out.
        let _ = self.tx.try_send(entity);
    }
}

/// Scoped checkout of one pool entity.
pub struct PoolLease<'a, E: PoolEntity> {
    entity: Option<E>,
    pool: &'a EntityPool<E>,
}

impl<E: PoolEntity> PoolLease<'_, E> {
    pub fn id(&self) -> u64 {
        self.entity.as_ref().map(PoolEntity::id).unwrap_or(0)
    }
}

impl<E: PoolEntity> Deref for PoolLease<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.entity.as_ref().expect("entity present until drop")
    }
}

impl<E: PoolEntity> Drop for PoolLease<'_, E> {
    fn drop(&mut self) {
        if let Some(entity) = self.entity.take() {
            self.pool.release(entity);
        }
    }
}

/// The registry over the two worker pools, mirroring the queue registry's
/// lifecycle: born initialized, accessors fail once closed.
#[derive(Debug)]
pub struct PoolRegistry {
    downloader: EntityPool<Downloader>,
    analyzer: EntityPool<Analyzer>,
    closed: AtomicBool,
}

impl PoolRegistry {
    /// Builds both pools. Every downloader shares `client`.
    pub fn new(config: &EngineConfig, client: reqwest::Client) -> Result<Self, EngineError> {
        let downloader =
            EntityPool::new(config.downloader_pool_size, || Downloader::new(client.clone()))?;
        let analyzer = EntityPool::new(config.analyzer_pool_size, Analyzer::new)?;
        Ok(Self {
            downloader,
            analyzer,
            closed: AtomicBool::new(false),
        })
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::PoolUnavailable("closed"));
        }
        Ok(())
    }

    pub fn downloader(&self) -> Result<&EntityPool<Downloader>, EngineError> {
        self.check()?;
        Ok(&self.downloader)
    }

    pub fn analyzer(&self) -> Result<&EntityPool<Analyzer>, EngineError> {
        self.check()?;
        Ok(&self.analyzer)
    }

    pub fn is_initialized(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Closes both pools. Idempotent.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.downloader.close();
        self.analyzer.close();
        true
    }

    pub fn summary(&self) -> String {
        format!(
            "downloaderPool: {}/{}, analyzerPool: {}/{}",
            self.downloader.used(),
            self.downloader.total(),
            self.analyzer.used(),
            self.analyzer.total(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Worker {
        id: u64,
    }

    impl PoolEntity for Worker {
        fn id(&self) -> u64 {
            self.id
        }
    }

    fn pool_of(total: u32) -> EntityPool<Worker> {
        let mut next = 0;
        EntityPool::new(total, move || {
            next += 1;
            Worker { id: next }
        })
        .unwrap()
    }

    #[tokio::test]
    async fn construction_populates_all_slots() {
        let pool = pool_of(3);
        assert_eq!(pool.total(), 3);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        assert!(EntityPool::new(0, || Worker { id: 1 }).is_err());
    }

    #[tokio::test]
    async fn acquire_and_drop_restore_accounting() {
        let pool = pool_of(2);
        let lease = pool.acquire().await.unwrap();
        assert!(lease.id() >= 1);
        assert_eq!(pool.used(), 1);
        drop(lease);
        assert_eq!(pool.used(), 0);
        assert_eq!(pool.total(), 2);
    }

    #[tokio::test]
    async fn acquire_waits_for_a_returned_entity() {
        let pool = std::sync::Arc::new(pool_of(1));
        let lease = pool.acquire().await.unwrap();

        let waiter = {
            let pool = std::sync::Arc::clone(&pool);
            tokio::spawn(async move {
                let lease = pool.acquire().await.unwrap();
                lease.id()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        assert_eq!(waiter.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn close_rejects_acquire_and_zeroes_used() {
        let pool = pool_of(2);
        assert!(pool.close());
        assert!(!pool.close());
        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.used(), 0);
    }

    #[tokio::test]
    async fn lease_dropped_after_close_discards_entity() {
        let pool = pool_of(1);
        let lease = pool.acquire().await.unwrap();
        pool.close();
        drop(lease);
        assert!(pool.acquire().await.is_err());
    }

    #[tokio::test]
    async fn registry_gates_access_on_lifecycle() {
        let mut config = EngineConfig::default();
        config.downloader_pool_size = 2;
        config.analyzer_pool_size = 1;
        let registry = PoolRegistry::new(&config, reqwest::Client::new()).unwrap();
        assert_eq!(registry.downloader().unwrap().total(), 2);
        assert_eq!(registry.analyzer().unwrap().total(), 1);
        assert_eq!(registry.summary(), "downloaderPool: 0/2, analyzerPool: 0/1");

        assert!(registry.close());
        assert!(!registry.close());
        assert!(registry.downloader().is_err());
        assert!(registry.analyzer().is_err());
    }
}
