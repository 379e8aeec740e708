use super::*;
use crate::types::{HealthStatus, ProtectionOptions, StatusSnapshot, UploadFile};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One scripted answer to a status query
enum Step {
    Snapshot(TaskStatus, i64, &'static str),
    TransportError,
    ForeignId,
}

/// Backend that replays a fixed script of status answers
///
/// Once the script runs out it keeps answering `processing` at 50%.
struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    period: Duration,
    query_delay: Duration,
    queries: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    query_times: Mutex<Vec<Instant>>,
    released: Mutex<Vec<TaskId>>,
}

impl ScriptedBackend {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            period: Duration::from_millis(100),
            query_delay: Duration::ZERO,
            queries: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            query_times: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }

    fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskBackend for ScriptedBackend {
    async fn submit(&self, _files: &[UploadFile], _options: &ProtectionOptions) -> Result<TaskId> {
        Ok(TaskId::from("scripted"))
    }

    async fn status(&self, task_id: &TaskId) -> Result<StatusSnapshot> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.query_times.lock().unwrap().push(Instant::now());
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Snapshot(status, progress, message)) => Ok(StatusSnapshot {
                id: task_id.clone(),
                status,
                progress,
                message: message.to_string(),
            }),
            Some(Step::TransportError) => Err(Error::PollTransport("connection reset".into())),
            Some(Step::ForeignId) => Ok(StatusSnapshot {
                id: TaskId::from("someone-else"),
                status: TaskStatus::Failed,
                progress: 0,
                message: "not yours".to_string(),
            }),
            None => Ok(StatusSnapshot {
                id: task_id.clone(),
                status: TaskStatus::Processing,
                progress: 50,
                message: "still working".to_string(),
            }),
        }
    }

    async fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "ok".into(),
            message: String::new(),
        })
    }

    fn poll_interval(&self) -> Duration {
        self.period
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn release(&self, task_id: &TaskId) {
        self.released.lock().unwrap().push(task_id.clone());
    }
}

fn collect_updates() -> (Arc<Mutex<Vec<Task>>>, impl FnMut(&Task) + Send + 'static) {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    (updates, move |task: &Task| sink.lock().unwrap().push(task.clone()))
}

#[test]
fn test_next_tick_after_skips_elapsed_ticks() {
    let started = Instant::now();
    let period = Duration::from_millis(100);

    assert_eq!(next_tick_after(started, period, started), started + period);
    assert_eq!(
        next_tick_after(started, period, started + Duration::from_millis(250)),
        started + Duration::from_millis(300)
    );
    assert_eq!(
        next_tick_after(started, period, started + Duration::from_millis(300)),
        started + Duration::from_millis(400)
    );
}

#[tokio::test(start_paused = true)]
async fn test_success_path_reports_each_snapshot_and_one_completion() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Snapshot(TaskStatus::Processing, 10, "Analyzing"),
        Step::Snapshot(TaskStatus::Processing, 40, "Cloaking"),
        Step::Snapshot(TaskStatus::Processing, 70, "Tagging"),
        Step::Snapshot(TaskStatus::Completed, 100, "server says done"),
    ]));
    let tracker = TaskTracker::new(backend.clone());
    let (updates, on_update) = collect_updates();

    let task = tracker.track(TaskId::from("abc"), on_update).await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(task.message, crate::types::COMPLETION_MESSAGE);

    let updates = updates.lock().unwrap();
    let progress: Vec<u8> = updates.iter().map(|t| t.progress).collect();
    assert_eq!(progress, vec![10, 40, 70, 100]);
    assert_eq!(updates.iter().filter(|t| t.is_terminal()).count(), 1);
    assert!(updates.last().unwrap().is_terminal());
    assert_eq!(backend.queries(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_failure_path_surfaces_service_message_once() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Snapshot(TaskStatus::Pending, 0, "Queued"),
        Step::Snapshot(TaskStatus::Processing, 20, "Working"),
        Step::Snapshot(TaskStatus::Failed, 20, "unsupported format"),
    ]));
    let tracker = TaskTracker::new(backend.clone());
    let (updates, on_update) = collect_updates();

    let err = tracker
        .track(TaskId::from("abc"), on_update)
        .await
        .unwrap_err();

    match err {
        Error::ProcessingFailed { task_id, message } => {
            assert_eq!(task_id.as_str(), "abc");
            assert_eq!(message, "unsupported format");
        }
        other => panic!("expected processing failure, got {other:?}"),
    }

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 3);
    assert_eq!(updates[2].status, TaskStatus::Failed);
    assert_eq!(backend.queries(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_never_fail_the_task() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::TransportError,
        Step::Snapshot(TaskStatus::Processing, 20, "Working"),
        Step::TransportError,
        Step::TransportError,
        Step::Snapshot(TaskStatus::Completed, 100, "done"),
    ]));
    let tracker = TaskTracker::new(backend.clone());
    let (updates, on_update) = collect_updates();

    let task = tracker.track(TaskId::from("abc"), on_update).await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|t| t.status != TaskStatus::Failed));
    assert_eq!(backend.queries(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_foreign_snapshot_is_treated_as_transport_error() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::ForeignId,
        Step::Snapshot(TaskStatus::Completed, 100, "done"),
    ]));
    let tracker = TaskTracker::new(backend);
    let (updates, on_update) = collect_updates();

    let task = tracker.track(TaskId::from("abc"), on_update).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(updates.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_configured_consecutive_errors() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::TransportError,
        Step::TransportError,
        Step::TransportError,
    ]));
    let tracker = TaskTracker::new(backend.clone()).with_max_consecutive_errors(Some(3));
    let (updates, on_update) = collect_updates();

    let err = tracker
        .track(TaskId::from("abc"), on_update)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PollTransport(_)));
    assert!(updates.lock().unwrap().is_empty());
    assert_eq!(backend.queries(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_zero_error_limit_keeps_polling() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::TransportError,
        Step::TransportError,
        Step::Snapshot(TaskStatus::Completed, 100, "done"),
    ]));
    let tracker = TaskTracker::new(backend.clone()).with_max_consecutive_errors(Some(0));

    let task = tracker.track(TaskId::from("abc"), |_| {}).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(backend.queries(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_backend_released_whenever_tracking_ends() {
    let completed = Arc::new(ScriptedBackend::new(vec![Step::Snapshot(
        TaskStatus::Completed,
        100,
        "done",
    )]));
    TaskTracker::new(completed.clone())
        .track(TaskId::from("done"), |_| {})
        .await
        .unwrap();
    assert_eq!(*completed.released.lock().unwrap(), vec![TaskId::from("done")]);

    let cancelled = Arc::new(ScriptedBackend::new(vec![]));
    let handle = TaskTracker::new(cancelled.clone()).spawn(TaskId::from("dropped"), |_| {});
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(cancelled.released.lock().unwrap().is_empty());

    drop(handle);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(*cancelled.released.lock().unwrap(), vec![TaskId::from("dropped")]);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_snapshots_still_reported() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Snapshot(TaskStatus::Processing, 30, "same"),
        Step::Snapshot(TaskStatus::Processing, 30, "same"),
        Step::Snapshot(TaskStatus::Processing, 30, "same"),
        Step::Snapshot(TaskStatus::Completed, 100, "done"),
    ]));
    let tracker = TaskTracker::new(backend);
    let (updates, on_update) = collect_updates();

    tracker.track(TaskId::from("abc"), on_update).await.unwrap();
    assert_eq!(updates.lock().unwrap().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_first_query_is_immediate_then_on_interval() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Snapshot(TaskStatus::Pending, 0, "queued"),
        Step::Snapshot(TaskStatus::Processing, 50, "working"),
        Step::Snapshot(TaskStatus::Completed, 100, "done"),
    ]));
    let tracker = TaskTracker::new(backend.clone());
    let started = Instant::now();

    tracker.track(TaskId::from("abc"), |_| {}).await.unwrap();

    let offsets: Vec<Duration> = backend
        .query_times
        .lock()
        .unwrap()
        .iter()
        .map(|t| t.duration_since(started))
        .collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_millis(100),
            Duration::from_millis(200)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_queries_skip_ticks_instead_of_overlapping() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![
            Step::Snapshot(TaskStatus::Processing, 10, "a"),
            Step::Snapshot(TaskStatus::Processing, 20, "b"),
            Step::Snapshot(TaskStatus::Processing, 30, "c"),
            Step::Snapshot(TaskStatus::Completed, 100, "done"),
        ])
        .with_query_delay(Duration::from_millis(250)),
    );
    let tracker = TaskTracker::new(backend.clone());
    let started = Instant::now();

    tracker.track(TaskId::from("abc"), |_| {}).await.unwrap();

    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    let offsets: Vec<Duration> = backend
        .query_times
        .lock()
        .unwrap()
        .iter()
        .map(|t| t.duration_since(started))
        .collect();
    // Each 250ms query swallows the ticks at +100 and +200; the next query waits for +300.
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_millis(300),
            Duration::from_millis(600),
            Duration::from_millis(900)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_in_flight_response() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![Step::Snapshot(TaskStatus::Completed, 100, "late")])
            .with_query_delay(Duration::from_secs(1)),
    );
    let tracker = TaskTracker::new(backend.clone());
    let (updates, on_update) = collect_updates();

    let handle = tracker.spawn(TaskId::from("abc"), on_update);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(backend.queries(), 1);

    handle.cancel();
    let result = handle.join().await;
    assert!(matches!(result, Err(Error::Cancelled)));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(updates.lock().unwrap().is_empty());
    assert_eq!(backend.queries(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_ticks_stops_updates() {
    let backend = Arc::new(ScriptedBackend::new(vec![]));
    let tracker = TaskTracker::new(backend.clone());
    let (updates, on_update) = collect_updates();

    let handle = tracker.spawn(TaskId::from("abc"), on_update);
    tokio::time::sleep(Duration::from_millis(350)).await;
    handle.cancel();
    assert!(matches!(handle.join().await, Err(Error::Cancelled)));

    let seen = updates.lock().unwrap().len();
    let queried = backend.queries();
    assert_eq!(seen, 4);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(updates.lock().unwrap().len(), seen);
    assert_eq!(backend.queries(), queried);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_polling() {
    let backend = Arc::new(ScriptedBackend::new(vec![]));
    let tracker = TaskTracker::new(backend.clone());

    let handle = tracker.spawn(TaskId::from("abc"), |_| {});
    tokio::time::sleep(Duration::from_millis(250)).await;
    drop(handle);
    tokio::time::sleep(Duration::from_millis(1)).await;

    let queried = backend.queries();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.queries(), queried);
}

#[tokio::test(start_paused = true)]
async fn test_handle_exposes_latest_state() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Snapshot(TaskStatus::Processing, 40, "working"),
        Step::Snapshot(TaskStatus::Completed, 100, "done"),
    ]));
    let tracker = TaskTracker::new(backend);

    let handle = tracker.spawn(TaskId::from("abc"), |_| {});
    assert_eq!(handle.task_id().as_str(), "abc");
    assert_eq!(handle.current().status, TaskStatus::Pending);

    let state = handle.subscribe();
    let task = handle.join().await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(*state.borrow(), task);
}
