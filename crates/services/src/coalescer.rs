//! Per-key debouncing of remote writes.
//!
//! Each `schedule` call for a key replaces the queued write for that key and
//! restarts its quiet period. Keys never delay or merge with each other.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

type BoxedWrite = Pin<Box<dyn Future<Output = ()> + Send>>;
type QueuedWrite<K> = Box<dyn FnOnce(K) -> BoxedWrite + Send>;

struct Slot<K> {
    generation: u64,
    due: Instant,
    write: QueuedWrite<K>,
}

struct Queue<K> {
    // Shared across keys so a timer outliving a flush can never match a
    // later generation of the same key.
    next_generation: u64,
    slots: HashMap<K, Slot<K>>,
}

#[derive(Clone)]
pub struct WriteCoalescer<K> {
    window: Duration,
    queue: Arc<Mutex<Queue<K>>>,
}

impl<K> WriteCoalescer<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
{
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            queue: Arc::new(Mutex::new(Queue {
                next_generation: 0,
                slots: HashMap::new(),
            })),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, Queue<K>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `write` for `key`, superseding any write already queued for it.
    ///
    /// The write runs once `window` passes without another `schedule` for the
    /// same key, and receives the key it is queued under at that moment.
    /// Outside a Tokio runtime no timer is started and the write waits for
    /// [`flush`](Self::flush).
    pub fn schedule<F, Fut>(&self, key: K, write: F)
    where
        F: FnOnce(K) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let due = Instant::now() + self.window;
        let generation = {
            let mut queue = self.lock();
            queue.next_generation += 1;
            let generation = queue.next_generation;
            let superseded = queue
                .slots
                .insert(
                    key.clone(),
                    Slot {
                        generation,
                        due,
                        write: Box::new(move |key| -> BoxedWrite { Box::pin(write(key)) }),
                    },
                )
                .is_some();
            if superseded {
                debug!(?key, "superseded queued write");
            }
            generation
        };
        self.arm(key, generation, due);
    }

    /// Move the write queued under `from` to `to`, keeping its deadline.
    /// Returns true if one was queued.
    pub fn rekey(&self, from: &K, to: K) -> bool {
        let armed = {
            let mut queue = self.lock();
            match queue.slots.remove(from) {
                Some(slot) => {
                    let armed = (slot.generation, slot.due);
                    queue.slots.insert(to.clone(), slot);
                    Some(armed)
                }
                None => None,
            }
        };
        match armed {
            Some((generation, due)) => {
                debug!(?from, ?to, "moved queued write to new key");
                self.arm(to, generation, due);
                true
            }
            None => false,
        }
    }

    fn arm(&self, key: K, generation: u64, due: Instant) {
        let Ok(handle) = Handle::try_current() else {
            debug!(?key, "no runtime; write waits for flush");
            return;
        };
        let queue = Arc::clone(&self.queue);
        handle.spawn(async move {
            sleep_until(due).await;
            let ready = {
                let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
                let current = queue
                    .slots
                    .get(&key)
                    .is_some_and(|slot| slot.generation == generation);
                if current { queue.slots.remove(&key) } else { None }
            };
            if let Some(slot) = ready {
                debug!(?key, "running debounced write");
                (slot.write)(key).await;
            }
        });
    }

    /// Drop the queued write for `key`. Returns true if one was queued.
    pub fn cancel(&self, key: &K) -> bool {
        self.lock().slots.remove(key).is_some()
    }

    #[must_use]
    pub fn is_queued(&self, key: &K) -> bool {
        self.lock().slots.contains_key(key)
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.lock().slots.len()
    }

    /// Run every queued write now, one after another.
    pub async fn flush(&self) {
        let writes: Vec<(K, QueuedWrite<K>)> = {
            let mut queue = self.lock();
            queue.slots.drain().map(|(key, slot)| (key, slot.write)).collect()
        };
        for (key, write) in writes {
            write(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<(&'static str, &'static str)>>>;

    fn record(
        log: &Log,
        key: &'static str,
        value: &'static str,
    ) -> impl Future<Output = ()> + Send + 'static + use<> {
        let log = Arc::clone(log);
        async move {
            log.lock().unwrap().push((key, value));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_to_last_value() {
        let coalescer = WriteCoalescer::new(Duration::from_millis(500));
        let log: Log = Arc::default();

        let l = Arc::clone(&log);
        coalescer.schedule("a", move |_| record(&l, "a", "first"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        let l = Arc::clone(&log);
        coalescer.schedule("a", move |_| record(&l, "a", "second"));

        // The first timer would have fired at 500 ms.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(log.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*log.lock().unwrap(), vec![("a", "second")]);
        assert_eq!(coalescer.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let coalescer = WriteCoalescer::new(Duration::from_millis(500));
        let log: Log = Arc::default();

        let l = Arc::clone(&log);
        coalescer.schedule("a", move |_| record(&l, "a", "1"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        let l = Arc::clone(&log);
        coalescer.schedule("b", move |_| record(&l, "b", "1"));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*log.lock().unwrap(), vec![("a", "1")]);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*log.lock().unwrap(), vec![("a", "1"), ("b", "1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_write_never_runs() {
        let coalescer = WriteCoalescer::new(Duration::from_millis(500));
        let runs = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&runs);
        coalescer.schedule(1_u32, move |_| async move {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert!(coalescer.is_queued(&1));
        assert!(coalescer.cancel(&1));
        assert!(!coalescer.cancel(&1));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rekeyed_write_fires_on_original_deadline_under_new_key() {
        let coalescer = WriteCoalescer::new(Duration::from_millis(500));
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::default();

        let s = Arc::clone(&seen);
        coalescer.schedule("temp-1", move |key| async move {
            s.lock().unwrap().push(key);
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(coalescer.rekey(&"temp-1", "srv-9"));
        assert!(!coalescer.rekey(&"temp-1", "srv-9"));
        assert!(coalescer.is_queued(&"srv-9"));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["srv-9"]);
        assert_eq!(coalescer.queued(), 0);
    }

    #[test]
    fn schedule_outside_runtime_waits_for_flush() {
        let coalescer = WriteCoalescer::new(Duration::from_millis(500));
        let runs = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&runs);
        coalescer.schedule("a", move |_| async move {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert!(coalescer.is_queued(&"a"));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(coalescer.flush());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_now_and_stale_timer_stays_quiet() {
        let coalescer = WriteCoalescer::new(Duration::from_millis(500));
        let log: Log = Arc::default();

        let l = Arc::clone(&log);
        coalescer.schedule("a", move |_| record(&l, "a", "flushed"));
        coalescer.flush().await;
        assert_eq!(*log.lock().unwrap(), vec![("a", "flushed")]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let l = Arc::clone(&log);
        coalescer.schedule("a", move |_| record(&l, "a", "later"));

        // The flushed write's timer fires at 500 ms and must not run "later" early.
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(log.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *log.lock().unwrap(),
            vec![("a", "flushed"), ("a", "later")]
        );
    }
}
