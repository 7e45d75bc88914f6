//! UsedTxOuts - Registry of outputs reserved by in-flight transactions
//!
//! Every action sharing one [`ContractEnv`](crate::ContractEnv) shares one
//! registry. Builders lock the inputs they are about to spend for the
//! duration of balance + sign + submit, so a concurrent builder never picks
//! the same output. Only identifiers are tracked.
//!
//! Outputs spent by parties outside this runtime are not coordinated here.

use crate::core::types::{OutputId, UtxoMap};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct UsedTxOuts {
    locked: Mutex<HashSet<OutputId>>,
    released: Notify,
}

impl UsedTxOuts {
    pub fn new() -> Self { Self::default() }

    /// Insert all `ids` in one critical section.
    ///
    /// Returns the ids this call newly reserved. Two overlapping concurrent
    /// calls never both get the same id back.
    pub fn lock<I>(&self, ids: I) -> BTreeSet<OutputId>
    where
        I: IntoIterator<Item = OutputId>,
    {
        let mut locked = self.locked.lock();
        ids.into_iter().filter(|id| locked.insert(*id)).collect()
    }

    /// Idempotent: ids that are not locked are ignored
    pub fn unlock<I>(&self, ids: I)
    where
        I: IntoIterator<Item = OutputId>,
    {
        {
            let mut locked = self.locked.lock();
            for id in ids {
                locked.remove(&id);
            }
        }
        self.released.notify_waiters();
    }

    pub fn is_locked(&self, id: &OutputId) -> bool {
        self.locked.lock().contains(id)
    }

    /// Copy of the locked set, for diagnostics
    pub fn snapshot(&self) -> BTreeSet<OutputId> {
        self.locked.lock().iter().copied().collect()
    }

    /// Drop locked outputs before handing a UTxO set to coin selection
    pub fn filter_unlocked(&self, mut utxos: UtxoMap) -> UtxoMap {
        let locked = self.locked.lock();
        utxos.retain(|id, _| !locked.contains(id));
        utxos
    }

    /// Lock every id in `ids` or none of them.
    ///
    /// Returns `None` when any id is already held elsewhere.
    pub fn try_guard(&self, ids: BTreeSet<OutputId>) -> Option<LockedTxOuts<'_>> {
        let mut locked = self.locked.lock();
        if ids.iter().any(|id| locked.contains(id)) {
            return None;
        }
        locked.extend(ids.iter().copied());
        Some(LockedTxOuts { registry: self, ids })
    }

    /// Wait until every id in `ids` is free, then hold all of them.
    ///
    /// Nothing is held while waiting, so two callers waiting on each other's
    /// ids cannot deadlock. Dropping the future while it waits is harmless.
    pub async fn acquire(&self, ids: BTreeSet<OutputId>) -> LockedTxOuts<'_> {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            // register before checking so a release in between is not missed
            released.as_mut().enable();
            if let Some(guard) = self.try_guard(ids.clone()) {
                return guard;
            }
            released.await;
        }
    }

    /// Hold `ids` locked while `action` runs.
    ///
    /// Waits for ids held by another bracket; `action` only ever runs with
    /// the whole set reserved to it. The ids are released on every exit
    /// path: normal return, error result, panic, or the returned future
    /// being dropped mid-flight.
    pub async fn with_locked<T, F, Fut>(&self, ids: BTreeSet<OutputId>, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire(ids).await;
        action().await
    }
}

/// RAII hold on a set of output ids, all acquired by this guard.
/// Unlocks exactly that set on drop.
#[derive(Debug)]
pub struct LockedTxOuts<'a> {
    registry: &'a UsedTxOuts,
    ids: BTreeSet<OutputId>,
}

impl LockedTxOuts<'_> {
    /// Ids reserved by this guard and by nobody else
    pub fn ids(&self) -> &BTreeSet<OutputId> { &self.ids }
}

impl Drop for LockedTxOuts<'_> {
    fn drop(&mut self) {
        self.registry.unlock(self.ids.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Address, TransactionOutput, TxHash};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    fn id(n: u8, index: u32) -> OutputId {
        OutputId::new(TxHash::from_bytes([n; 32]), index)
    }

    #[test]
    fn test_lock_unlock_snapshot() {
        let registry = UsedTxOuts::new();
        let newly = registry.lock([id(1, 0), id(1, 1)]);
        assert_eq!(newly.len(), 2);
        assert!(registry.is_locked(&id(1, 0)));

        registry.unlock([id(1, 0), id(9, 9)]);
        assert_eq!(registry.snapshot(), BTreeSet::from([id(1, 1)]));

        // second unlock is a no-op
        registry.unlock([id(1, 0)]);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_relock_reports_nothing_new() {
        let registry = UsedTxOuts::new();
        registry.lock([id(1, 0)]);
        let newly = registry.lock([id(1, 0), id(2, 0)]);
        assert_eq!(newly, BTreeSet::from([id(2, 0)]));
    }

    #[test]
    fn test_disjoint_concurrent_locks_union() {
        let registry = Arc::new(UsedTxOuts::new());
        let a: BTreeSet<_> = (0..50).map(|i| id(1, i)).collect();
        let b: BTreeSet<_> = (0..50).map(|i| id(2, i)).collect();

        let handles: Vec<_> = [a.clone(), b.clone()]
            .into_iter()
            .map(|ids| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.lock(ids))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().len(), 50);
        }

        let expected: BTreeSet<_> = a.union(&b).copied().collect();
        assert_eq!(registry.snapshot(), expected);
    }

    #[test]
    fn test_overlapping_locks_reserve_shared_id_once() {
        for _ in 0..100 {
            let registry = Arc::new(UsedTxOuts::new());
            let barrier = Arc::new(Barrier::new(2));
            let shared = id(7, 7);

            let handles: Vec<_> = [id(1, 0), id(2, 0)]
                .into_iter()
                .map(|own| {
                    let (registry, barrier) = (registry.clone(), barrier.clone());
                    std::thread::spawn(move || {
                        barrier.wait();
                        registry.lock([own, shared])
                    })
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|newly| newly.contains(&shared))
                .count();
            assert_eq!(winners, 1);
        }
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let registry = UsedTxOuts::new();
        let ids = BTreeSet::from([id(3, 0), id(3, 1)]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = registry.try_guard(ids.clone()).expect("free ids");
            assert_eq!(registry.snapshot(), ids);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_try_guard_is_all_or_nothing() {
        let registry = UsedTxOuts::new();
        let held = registry.try_guard(BTreeSet::from([id(3, 0)])).expect("free ids");

        assert!(registry.try_guard(BTreeSet::from([id(3, 0), id(3, 1)])).is_none());
        assert!(!registry.is_locked(&id(3, 1)));

        drop(held);
        let guard = registry.try_guard(BTreeSet::from([id(3, 0), id(3, 1)])).expect("released");
        assert_eq!(guard.ids().len(), 2);
    }

    #[test]
    fn test_overlapping_with_locked_waits_for_earlier_holder() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let registry = Arc::new(UsedTxOuts::new());
        let shared = id(8, 0);

        rt.block_on(async {
            let (started_tx, started_rx) = tokio::sync::oneshot::channel();
            let first = {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .with_locked(BTreeSet::from([shared]), move || async move {
                            let _ = started_tx.send(());
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        })
                        .await
                })
            };
            started_rx.await.expect("first bracket started");

            let second = {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.with_locked(BTreeSet::from([shared, id(8, 1)]), || async {}).await
                })
            };

            tokio::time::sleep(Duration::from_millis(30)).await;
            assert!(!second.is_finished());
            assert!(registry.is_locked(&shared));
            // the waiter holds nothing while it waits
            assert!(!registry.is_locked(&id(8, 1)));

            first.await.expect("first bracket");
            second.await.expect("second bracket");
        });

        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_overlapping_brackets_never_share_an_id() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let registry = Arc::new(UsedTxOuts::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        rt.block_on(async {
            let brackets: Vec<_> = (0..8u32)
                .map(|n| {
                    let (registry, inside, overlapped) = (registry.clone(), inside.clone(), overlapped.clone());
                    tokio::spawn(async move {
                        let ids = BTreeSet::from([id(9, 0), id(10, n)]);
                        registry
                            .with_locked(ids, || async {
                                if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                                    overlapped.store(true, Ordering::SeqCst);
                                }
                                tokio::time::sleep(Duration::from_millis(5)).await;
                                inside.fetch_sub(1, Ordering::SeqCst);
                            })
                            .await
                    })
                })
                .collect();
            for bracket in brackets {
                bracket.await.expect("bracket");
            }
        });

        assert!(!overlapped.load(Ordering::SeqCst));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_cancelled_waiter_leaves_holder_untouched() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let registry = UsedTxOuts::new();

        rt.block_on(async {
            let held = registry.acquire(BTreeSet::from([id(11, 0)])).await;
            let waiting = registry.acquire(BTreeSet::from([id(11, 0), id(11, 1)]));
            assert!(tokio::time::timeout(Duration::from_millis(20), waiting).await.is_err());

            assert_eq!(registry.snapshot(), BTreeSet::from([id(11, 0)]));
            drop(held);
        });

        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_with_locked_releases_on_error() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let registry = UsedTxOuts::new();
        let ids = BTreeSet::from([id(4, 0)]);

        let result: anyhow::Result<()> = rt.block_on(registry.with_locked(ids.clone(), || async {
            assert!(registry.is_locked(&id(4, 0)));
            anyhow::bail!("submit failed")
        }));

        assert!(result.is_err());
        assert!(registry.snapshot().is_disjoint(&ids));
    }

    #[test]
    fn test_with_locked_releases_when_cancelled() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let registry = UsedTxOuts::new();

        rt.block_on(async {
            let pending = registry.with_locked(BTreeSet::from([id(5, 0)]), || async {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            });
            let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), pending).await;
            assert!(timed_out.is_err());
        });

        assert!(!registry.is_locked(&id(5, 0)));
    }

    #[test]
    fn test_filter_unlocked() {
        let registry = UsedTxOuts::new();
        let addr = Address::new("addr_test1qz");
        let utxos: UtxoMap = (0..3)
            .map(|i| (id(6, i), TransactionOutput::ada_only(addr.clone(), 1_000_000)))
            .collect();
        registry.lock([id(6, 1)]);

        let free = registry.filter_unlocked(utxos);
        assert_eq!(free.keys().copied().collect::<Vec<_>>(), vec![id(6, 0), id(6, 2)]);
    }
}
