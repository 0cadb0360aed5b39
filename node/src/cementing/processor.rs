//! The confirmation height processor: a dedicated thread feeding confirmed
//! hashes to the [`CementationEngine`].

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use orv_ledger::Ledger;
use orv_types::{Block, BlockHash};
use orv_utils::Stats;
use tracing::{debug, error};

use super::{CementObservers, CementationEngine};
use crate::config::ConfirmationHeightConfig;
use crate::NodeError;

#[derive(Default)]
struct ProcessorState {
    awaiting: VecDeque<BlockHash>,
    awaiting_set: HashSet<BlockHash>,
    /// Hash the engine is working on right now.
    current: Option<BlockHash>,
    paused: bool,
    stopped: bool,
}

struct Shared {
    state: Mutex<ProcessorState>,
    condition: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ProcessorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct ConfirmationHeightProcessor {
    shared: Arc<Shared>,
    observers: Arc<CementObservers>,
    /// Checked by the walkers so a long chain does not delay shutdown.
    stopped: Arc<AtomicBool>,
    /// Owned here until `start` moves it onto the thread.
    engine: Mutex<Option<CementationEngine>>,
    thread: Mutex<Option<JoinHandle<CementationEngine>>>,
}

impl ConfirmationHeightProcessor {
    pub fn new(ledger: Arc<Ledger>, stats: Arc<Stats>, config: &ConfirmationHeightConfig) -> Self {
        let observers = Arc::new(CementObservers::default());
        let stopped = Arc::new(AtomicBool::new(false));
        let engine = CementationEngine::new(
            ledger,
            stats,
            Arc::clone(&stopped),
            config,
            Arc::clone(&observers),
        );
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ProcessorState::default()),
                condition: Condvar::new(),
            }),
            observers,
            stopped,
            engine: Mutex::new(Some(engine)),
            thread: Mutex::new(None),
        }
    }

    /// Spawn the processing thread. Allowed again after [`stop`](Self::stop).
    pub fn start(&self) -> Result<(), NodeError> {
        let mut thread = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        if thread.is_some() {
            return Err(NodeError::AlreadyStarted);
        }
        let Some(engine) = self
            .engine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return Err(NodeError::AlreadyStarted);
        };
        // a processor stopped earlier may be started again
        self.stopped.store(false, Ordering::SeqCst);
        self.shared.lock().stopped = false;
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("conf_height".into())
            .spawn(move || run(shared, engine))?;
        *thread = Some(handle);
        Ok(())
    }

    /// Stop intake, let the in-flight hash and pending writes finish, and
    /// join the thread.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.shared.lock().stopped = true;
        self.shared.condition.notify_all();
        let handle = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            match handle.join() {
                Ok(engine) => {
                    *self.engine.lock().unwrap_or_else(|e| e.into_inner()) = Some(engine);
                }
                Err(_) => error!("confirmation height thread panicked"),
            }
        }
    }

    /// Queue a confirmed hash. Duplicates of queued hashes are ignored.
    pub fn add(&self, hash: BlockHash) {
        {
            let mut state = self.shared.lock();
            if !state.awaiting_set.insert(hash) {
                return;
            }
            state.awaiting.push_back(hash);
        }
        self.shared.condition.notify_all();
    }

    /// Hold queued hashes back. The hash in flight is not interrupted.
    pub fn pause(&self) {
        self.shared.lock().paused = true;
    }

    pub fn unpause(&self) {
        self.shared.lock().paused = false;
        self.shared.condition.notify_all();
    }

    pub fn awaiting_processing_len(&self) -> usize {
        self.shared.lock().awaiting.len()
    }

    pub fn is_processing_block(&self, hash: &BlockHash) -> bool {
        let state = self.shared.lock();
        state.current == Some(*hash) || state.awaiting_set.contains(hash)
    }

    pub fn current(&self) -> Option<BlockHash> {
        self.shared.lock().current
    }

    pub fn add_cemented_observer(&self, observer: impl Fn(&Arc<Block>) + Send + Sync + 'static) {
        self.observers.cemented.subscribe(observer);
    }

    pub fn add_already_cemented_observer(
        &self,
        observer: impl Fn(&BlockHash) + Send + Sync + 'static,
    ) {
        self.observers.already_cemented.subscribe(observer);
    }
}

impl Drop for ConfirmationHeightProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: Arc<Shared>, mut engine: CementationEngine) -> CementationEngine {
    debug!("confirmation height processor started");
    let awaiting = || shared.lock().awaiting.len();
    let mut state = shared.lock();
    while !state.stopped {
        let next = if state.paused {
            None
        } else {
            state.awaiting.pop_front()
        };
        match next {
            Some(hash) => {
                state.awaiting_set.remove(&hash);
                state.current = Some(hash);
                drop(state);

                if !engine.has_pending_writes() {
                    engine.clear_process_vars();
                }
                engine.process(&hash, &awaiting);

                state = shared.lock();
                state.current = None;
            }
            None if engine.has_pending_writes() => {
                drop(state);
                engine.write_pending();
                state = shared.lock();
            }
            None => {
                state = shared
                    .condition
                    .wait_while(state, |s| {
                        !s.stopped && (s.paused || s.awaiting.is_empty())
                    })
                    .unwrap_or_else(|e| e.into_inner());
            }
        }
    }
    drop(state);

    if engine.has_pending_writes() {
        engine.write_pending();
    }
    debug!("confirmation height processor stopped");
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cementing::test_chain::Fixture;
    use orv_types::Account;
    use std::time::{Duration, Instant};

    fn assert_timely(timeout: Duration, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + timeout;
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in {timeout:?}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn processor(fixture: &Fixture) -> ConfirmationHeightProcessor {
        ConfirmationHeightProcessor::new(
            Arc::clone(&fixture.ledger),
            Arc::new(Stats::new()),
            &ConfirmationHeightConfig::default(),
        )
    }

    #[test]
    fn add_deduplicates_queued_hashes() {
        let fixture = Fixture::new();
        let processor = processor(&fixture);
        let hash = BlockHash::from_u64(1);
        processor.add(hash);
        processor.add(hash);
        assert_eq!(processor.awaiting_processing_len(), 1);
        assert!(processor.is_processing_block(&hash));
        assert_eq!(processor.current(), None);
    }

    #[test]
    fn cements_on_its_own_thread() {
        let fixture = Fixture::new();
        let genesis = fixture.genesis();
        let send = fixture.send(genesis, Account::from_u64(3), 1);
        let processor = processor(&fixture);
        processor.start().unwrap();
        processor.add(send.hash());
        assert_timely(Duration::from_secs(5), || fixture.height(&genesis) == 2);
        processor.stop();
        assert!(!processor.is_processing_block(&send.hash()));
    }

    #[test]
    fn paused_processor_holds_work() {
        let fixture = Fixture::new();
        let genesis = fixture.genesis();
        let send = fixture.send(genesis, Account::from_u64(3), 1);
        let processor = processor(&fixture);
        processor.pause();
        processor.start().unwrap();
        processor.add(send.hash());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(fixture.height(&genesis), 1);
        assert_eq!(processor.awaiting_processing_len(), 1);

        processor.unpause();
        assert_timely(Duration::from_secs(5), || fixture.height(&genesis) == 2);
        assert_eq!(processor.awaiting_processing_len(), 0);
    }

    #[test]
    fn restarts_after_stop() {
        let fixture = Fixture::new();
        let genesis = fixture.genesis();
        let processor = processor(&fixture);
        processor.start().unwrap();
        processor.stop();

        let send = fixture.send(genesis, Account::from_u64(3), 1);
        processor.start().unwrap();
        processor.add(send.hash());
        assert_timely(Duration::from_secs(5), || fixture.height(&genesis) == 2);
        processor.stop();
    }

    #[test]
    fn start_twice_is_rejected() {
        let fixture = Fixture::new();
        let processor = processor(&fixture);
        processor.start().unwrap();
        assert!(matches!(processor.start(), Err(NodeError::AlreadyStarted)));
        processor.stop();
    }
}
