// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The change feed. Every committed write lands in the backend's change log; `watch` tails that
//! log from a known position, so a listener sees every write from every handle in commit order,
//! and picks up where it left off after the backend was unreachable.

use crate::config::FeedConfig;
use crate::store::ObjectStore;
use flume::{Receiver, RecvTimeoutError, Sender};
use protocosm_common::model::{ChangeEvent, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fan-out of writes committed through one store handle. Senders whose receiver went away are
/// pruned on the next publish.
#[derive(Default)]
pub struct ChangeFeed {
    subscribers: Mutex<Vec<Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    pub fn publish(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|s| s.send(event.clone()).is_ok());
    }

    /// Drop every subscription, as a lost connection to the backend would.
    pub fn disconnect_all(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

/// Receives change events from a watcher thread.
pub trait ChangeListener: Send + Sync + 'static {
    fn on_change(&self, event: ChangeEvent);

    /// Called when events may have been missed: the watcher could not learn its starting position
    /// when it was created, or the log was trimmed past the last event it delivered. Anything
    /// derived from stored state should be discarded.
    fn on_resync(&self) {}
}

impl<F> ChangeListener for F
where
    F: Fn(ChangeEvent) + Send + Sync + 'static,
{
    fn on_change(&self, event: ChangeEvent) {
        self(event)
    }
}

/// Handle to a running watcher thread. Dropping it stops the thread.
pub struct FeedWatcher {
    kill_switch: Arc<AtomicBool>,
    jh: Mutex<Option<JoinHandle<()>>>,
}

impl FeedWatcher {
    pub fn stop(&self) {
        self.kill_switch.store(true, Ordering::SeqCst);
        let jh = self.jh.lock().unwrap().take();
        if let Some(jh) = jh
            && jh.join().is_err()
        {
            warn!("Change feed watcher panicked");
        }
    }
}

impl Drop for FeedWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Attach `listener` to the store's change log.
///
/// The starting position is read before this returns, so no write committed after `watch`
/// returns is missed. Backend failures are logged and retried with backoff; they never reach the
/// caller.
pub fn watch<L: ChangeListener>(
    store: Arc<dyn ObjectStore>,
    config: FeedConfig,
    listener: L,
) -> Result<FeedWatcher, StoreError> {
    let cursor = match store.latest_sequence() {
        Ok(sequence) => Some(sequence),
        Err(e) => {
            warn!(error = %e, "Could not read change log position; will retry");
            None
        }
    };
    let wake = store.subscribe().ok();
    let kill_switch = Arc::new(AtomicBool::new(false));
    let tail = Tail {
        store,
        config,
        listener,
        cursor,
        wake,
        kill_switch: kill_switch.clone(),
    };
    let jh = std::thread::Builder::new()
        .name("protocosm-feed".to_string())
        .spawn(move || tail.run())
        .map_err(|e| StoreError::Transport(format!("could not spawn feed watcher: {e}")))?;
    Ok(FeedWatcher {
        kill_switch,
        jh: Mutex::new(Some(jh)),
    })
}

struct Tail<L> {
    store: Arc<dyn ObjectStore>,
    config: FeedConfig,
    listener: L,
    /// Sequence of the last event delivered, or `None` until a position is established.
    cursor: Option<u64>,
    /// Live events from this handle's own writes, used only to wake early.
    wake: Option<Receiver<ChangeEvent>>,
    kill_switch: Arc<AtomicBool>,
}

impl<L: ChangeListener> Tail<L> {
    fn killed(&self) -> bool {
        self.kill_switch.load(Ordering::SeqCst)
    }

    fn run(mut self) {
        let mut backoff = self.config.initial_backoff;
        let mut failing = false;
        while !self.killed() {
            match self.poll() {
                Ok(more) => {
                    if failing {
                        info!(cursor = ?self.cursor, "Change feed resumed");
                        failing = false;
                    }
                    backoff = self.config.initial_backoff;
                    if !more {
                        self.wait();
                    }
                }
                Err(e) => {
                    warn!(error = %e, ?backoff, "Change log unavailable; retrying");
                    failing = true;
                    sleep_unless_killed(backoff, self.config.poll_interval, &self.kill_switch);
                    backoff = self.config.next_backoff(backoff);
                }
            }
        }
    }

    /// Deliver the next batch of logged events. Returns whether more are probably waiting.
    fn poll(&mut self) -> Result<bool, StoreError> {
        let Some(cursor) = self.cursor else {
            let latest = self.store.latest_sequence()?;
            info!(latest, "Change log position established");
            self.listener.on_resync();
            self.cursor = Some(latest);
            return Ok(false);
        };

        let events = self.store.changes_since(cursor, self.config.batch_size)?;
        let (Some(first), Some(last)) = (events.first(), events.last()) else {
            return Ok(false);
        };
        if first.sequence != cursor + 1 {
            warn!(
                expected = cursor + 1,
                found = first.sequence,
                "Change log was trimmed past this watcher"
            );
            self.listener.on_resync();
        }
        let last_sequence = last.sequence;
        let more = events.len() >= self.config.batch_size;
        for event in events {
            debug!(
                sequence = event.sequence,
                id = ?event.document_id,
                operation = %event.operation,
                "Change event"
            );
            self.listener.on_change(event);
        }
        self.cursor = Some(last_sequence);
        Ok(more)
    }

    /// Block until a live event arrives or the poll interval passes.
    fn wait(&mut self) {
        let poll_interval = self.config.poll_interval;
        let Some(rx) = &self.wake else {
            std::thread::sleep(poll_interval);
            self.wake = self.store.subscribe().ok();
            return;
        };
        let disconnected = match rx.recv_timeout(poll_interval) {
            Ok(_) => {
                rx.drain().for_each(drop);
                false
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => true,
        };
        if disconnected {
            debug!("Live change stream dropped; polling the log");
            self.wake = None;
        }
    }
}

fn sleep_unless_killed(duration: Duration, step: Duration, kill_switch: &AtomicBool) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline || kill_switch.load(Ordering::SeqCst) {
            return;
        }
        std::thread::sleep(step.min(deadline - now));
    }
}
