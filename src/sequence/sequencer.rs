//! FIFO sequencer over eagerly started async tasks.

use super::ticket::Ticket;
use crate::error::{MapError, MapResult};
use futures_channel::oneshot;
use futures_util::future::{self, FutureExt, LocalBoxFuture, Shared};
use futures_util::task::{LocalSpawn, LocalSpawnExt};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

/// Completes once every ticket submitted before it was taken has resolved.
pub type Ready = Shared<LocalBoxFuture<'static, ()>>;

/// Serializes the results of concurrently running tasks.
///
/// Every submitted task is spawned immediately, so fetches overlap. The
/// result of the Nth task is released (and its `on_turn` callback runs) only
/// after the (N-1)th ticket has resolved, whichever task finished first.
/// A failed task rejects its own ticket and releases its successors.
pub struct Sequencer {
    /// Name used in log messages ("geometry", "data", ...)
    name: &'static str,
    spawner: Rc<dyn LocalSpawn>,
    /// Completion signal of the most recently submitted ticket
    tail: RefCell<Ready>,
    submitted: Cell<u64>,
    settled: Rc<Cell<u64>>,
}

impl Sequencer {
    /// Creates a sequencer that spawns its tasks on `spawner`.
    pub fn new(name: &'static str, spawner: Rc<dyn LocalSpawn>) -> Self {
        Self {
            name,
            spawner,
            tail: RefCell::new(future::ready(()).boxed_local().shared()),
            submitted: Cell::new(0),
            settled: Rc::new(Cell::new(0)),
        }
    }

    /// Returns the name this sequencer logs under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of tickets submitted but not yet resolved.
    pub fn in_flight(&self) -> u64 {
        self.submitted.get() - self.settled.get()
    }

    /// Returns true if every submitted ticket has resolved.
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Submits a task whose result is handed back in submission order.
    pub fn submit<T, F>(&self, task: F) -> Ticket<T>
    where
        T: 'static,
        F: Future<Output = MapResult<T>> + 'static,
    {
        self.submit_with(task, |result| result)
    }

    /// Submits a task and a callback that runs on the task's turn.
    ///
    /// `on_turn` receives the task's result (including failures) after all
    /// earlier tickets have resolved and before any later one is released.
    /// Its return value becomes the ticket's result.
    pub fn submit_with<T, U, F, C>(&self, task: F, on_turn: C) -> Ticket<U>
    where
        T: 'static,
        U: 'static,
        F: Future<Output = MapResult<T>> + 'static,
        C: FnOnce(MapResult<T>) -> MapResult<U> + 'static,
    {
        let position = self.submitted.get();
        self.submitted.set(position + 1);
        let name = self.name;

        // Start the work now; only the release of its result waits.
        let (work_tx, work_rx) = oneshot::channel();
        if let Err(e) = self.spawner.spawn_local(async move {
            let _ = work_tx.send(task.await);
        }) {
            log::error!("{} #{}: failed to spawn task: {}", name, position, e);
        }

        let (turn_tx, turn_rx) = oneshot::channel::<()>();
        let turn_done: Ready = turn_rx.map(|_| ()).boxed_local().shared();
        let predecessor = self.tail.replace(turn_done);

        let (result_tx, result_rx) = oneshot::channel();
        let settled = self.settled.clone();
        let turn = async move {
            predecessor.await;

            let outcome = on_turn(work_rx.await.unwrap_or(Err(MapError::Abandoned)));
            match &outcome {
                Ok(_) => log::debug!("{} #{} resolved", name, position),
                Err(e) => log::warn!("{} #{} rejected: {}", name, position, e),
            }

            settled.set(settled.get() + 1);
            let _ = turn_tx.send(());
            let _ = result_tx.send(outcome);
        };
        if let Err(e) = self.spawner.spawn_local(turn) {
            log::error!("{} #{}: failed to spawn turn: {}", name, position, e);
        }

        Ticket::new(position, result_rx)
    }

    /// Chains this sequencer behind `upstream`.
    ///
    /// Tickets submitted after this call are not released before `upstream`
    /// completes. Used to order data merges after the geometry they need.
    pub fn after<F>(&self, upstream: F) -> Ticket<()>
    where
        F: Future<Output = ()> + 'static,
    {
        self.submit(async move {
            upstream.await;
            Ok(())
        })
    }

    /// Returns a future that completes when every ticket submitted so far
    /// has resolved, successfully or not.
    pub fn ready(&self) -> Ready {
        self.tail.borrow().clone()
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("name", &self.name)
            .field("submitted", &self.submitted.get())
            .field("settled", &self.settled.get())
            .finish()
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use futures_executor::LocalPool;

    /// A task whose completion is controlled by the test.
    fn controlled<T: 'static>(
        rx: oneshot::Receiver<MapResult<T>>,
    ) -> impl Future<Output = MapResult<T>> {
        async move { rx.await.unwrap_or(Err(MapError::Abandoned)) }
    }

    fn recording(
        log: &Rc<RefCell<Vec<&'static str>>>,
        label: &'static str,
    ) -> impl FnOnce(MapResult<&'static str>) -> MapResult<&'static str> {
        let log = log.clone();
        move |result| {
            log.borrow_mut().push(label);
            result
        }
    }

    #[test]
    fn test_results_released_in_submission_order() {
        let mut pool = LocalPool::new();
        let seq = Sequencer::new("test", Rc::new(pool.spawner()));
        let log = Rc::new(RefCell::new(Vec::new()));

        let (tx_slow, rx_slow) = oneshot::channel();
        let (tx_fast, rx_fast) = oneshot::channel();
        let mut slow = seq.submit_with(controlled(rx_slow), recording(&log, "slow"));
        let mut fast = seq.submit_with(controlled(rx_fast), recording(&log, "fast"));

        // The later task finishes first but must wait for its predecessor.
        tx_fast.send(Ok("fast")).unwrap();
        pool.run_until_stalled();
        assert!(log.borrow().is_empty());
        assert!(fast.try_recv().is_none());
        assert_eq!(seq.in_flight(), 2);

        tx_slow.send(Ok("slow")).unwrap();
        pool.run_until_stalled();
        assert_eq!(*log.borrow(), vec!["slow", "fast"]);
        assert_eq!(slow.try_recv(), Some(Ok("slow")));
        assert_eq!(fast.try_recv(), Some(Ok("fast")));
        assert!(seq.is_idle());
    }

    #[test]
    fn test_many_results_released_in_order_whatever_the_completion_order() {
        let mut pool = LocalPool::new();
        let seq = Sequencer::new("test", Rc::new(pool.spawner()));
        let log = Rc::new(RefCell::new(Vec::new()));
        let labels = ["t0", "t1", "t2", "t3", "t4", "t5"];

        let mut senders = Vec::new();
        let mut tickets = Vec::new();
        for label in labels {
            let (tx, rx) = oneshot::channel();
            senders.push(Some(tx));
            tickets.push(seq.submit_with(controlled(rx), recording(&log, label)));
        }

        let mut released = 0;
        for index in [3, 5, 0, 4, 2, 1] {
            if let Some(tx) = senders[index].take() {
                tx.send(Ok(labels[index])).unwrap();
            }
            pool.run_until_stalled();

            // Turns are only ever released as a prefix of the submission order.
            let log = log.borrow();
            assert_eq!(*log, labels[..log.len()].to_vec());
            assert!(log.len() >= released);
            released = log.len();
        }

        assert_eq!(*log.borrow(), labels.to_vec());
        for (ticket, label) in tickets.iter_mut().zip(labels) {
            assert_eq!(ticket.try_recv(), Some(Ok(label)));
        }
        assert!(seq.is_idle());
    }

    #[test]
    fn test_tasks_start_eagerly() {
        let mut pool = LocalPool::new();
        let seq = Sequencer::new("test", Rc::new(pool.spawner()));

        let (_tx_blocking, rx_blocking) = oneshot::channel::<MapResult<()>>();
        let _first = seq.submit(controlled(rx_blocking));

        let started = Rc::new(Cell::new(false));
        let flag = started.clone();
        let _second = seq.submit(async move {
            flag.set(true);
            Ok(())
        });

        pool.run_until_stalled();
        assert!(started.get());
        assert_eq!(seq.in_flight(), 2);
    }

    #[test]
    fn test_failed_task_rejects_without_stalling_successors() {
        let mut pool = LocalPool::new();
        let seq = Sequencer::new("test", Rc::new(pool.spawner()));

        let failing = seq.submit::<u32, _>(async { Err(MapError::Fetch("404".to_string())) });
        let (tx, rx) = oneshot::channel();
        let after = seq.submit(controlled(rx));

        assert_eq!(
            pool.run_until(failing),
            Err(MapError::Fetch("404".to_string()))
        );

        tx.send(Ok(7)).unwrap();
        assert_eq!(pool.run_until(after), Ok(7));
    }

    #[test]
    fn test_dropped_ticket_does_not_hold_up_successors() {
        let mut pool = LocalPool::new();
        let seq = Sequencer::new("test", Rc::new(pool.spawner()));

        drop(seq.submit(async { Ok(1) }));
        let second = seq.submit(async { Ok(2) });

        assert_eq!(pool.run_until(second), Ok(2));
    }

    #[test]
    fn test_abandoned_task_rejects_ticket() {
        let mut pool = LocalPool::new();
        let seq = Sequencer::new("test", Rc::new(pool.spawner()));

        let (tx, rx) = oneshot::channel::<MapResult<()>>();
        let ticket = seq.submit(async move { rx.await.unwrap_or(Err(MapError::Abandoned)) });
        drop(tx);

        assert_eq!(pool.run_until(ticket), Err(MapError::Abandoned));
    }

    #[test]
    fn test_ready_waits_for_all_submitted() {
        let mut pool = LocalPool::new();
        let seq = Sequencer::new("test", Rc::new(pool.spawner()));
        let log = Rc::new(RefCell::new(Vec::new()));

        let (tx, rx) = oneshot::channel();
        let _a = seq.submit_with(controlled(rx), recording(&log, "a"));
        let _b = seq.submit_with(async { Ok("b") }, recording(&log, "b"));

        let ready = seq.ready();
        let _c = seq.submit_with(async { Ok("c") }, recording(&log, "c"));

        tx.send(Ok("a")).unwrap();
        pool.run_until(ready);
        assert!(log.borrow().starts_with(&["a", "b"]));
    }

    #[test]
    fn test_after_orders_behind_other_sequencer() {
        let mut pool = LocalPool::new();
        let spawner: Rc<dyn LocalSpawn> = Rc::new(pool.spawner());
        let upstream = Sequencer::new("upstream", spawner.clone());
        let downstream = Sequencer::new("downstream", spawner);
        let log = Rc::new(RefCell::new(Vec::new()));

        let (tx, rx) = oneshot::channel();
        let _geometry = upstream.submit_with(controlled(rx), recording(&log, "geometry"));
        let _barrier = downstream.after(upstream.ready());
        let data = downstream.submit_with(async { Ok("data") }, recording(&log, "data"));

        pool.run_until_stalled();
        assert!(log.borrow().is_empty());

        tx.send(Ok("geometry")).unwrap();
        assert_eq!(pool.run_until(data), Ok("data"));
        assert_eq!(*log.borrow(), vec!["geometry", "data"]);
    }

    #[test]
    fn test_ticket_positions_count_up() {
        let pool = LocalPool::new();
        let seq = Sequencer::new("test", Rc::new(pool.spawner()));
        let first = seq.submit(async { Ok(()) });
        let second = seq.submit(async { Ok(()) });
        assert_eq!(first.position(), 0);
        assert_eq!(second.position(), 1);
    }
}
