use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::time::{sleep, timeout};

use playground_dispatch::{
    common::{
        Capability, CapabilityLoader, DispatchConfig, DispatchError, JobKind, ModelInfo, TaskData,
        TaskOutcome, TaskResult,
    },
    persistence::{MemoryPersistence, TaskQueue},
    scheduler::{Engine, EngineBuilder, PollStatus, TaskClient},
};

// ==========================================
// 测试用能力实现
// ==========================================

/// 按文件名给出标签；文件名为 `boom` 时 panic，为 `bad` 时返回错误
struct FakeClassifier {
    seen: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl Capability for FakeClassifier {
    fn execute(&mut self, task: &TaskData) -> anyhow::Result<TaskOutcome> {
        self.seen.lock().push(task.id.clone());
        std::thread::sleep(self.delay);

        let name = task
            .filename
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        match name.as_str() {
            "boom" => panic!("model exploded"),
            "bad" => anyhow::bail!("unreadable image"),
            _ => Ok(TaskOutcome::Classified {
                label: name,
                score: 97.5,
                model_info: ModelInfo {
                    name: "fake".into(),
                    version: "1".into(),
                    extra: Default::default(),
                },
            }),
        }
    }
}

/// 记录并发度的分割器
struct FakeSegmenter {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    delay: Duration,
}

impl Capability for FakeSegmenter {
    fn execute(&mut self, task: &TaskData) -> anyhow::Result<TaskOutcome> {
        assert!(task.mask.is_some());
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(TaskOutcome::Segmented {
            points: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
            error: String::new(),
        })
    }
}

/// 只装分割池的引擎，分割器共享并发计数
fn segmentation_builder(
    pool: usize,
    mem: &MemoryPersistence,
    current: &Arc<AtomicUsize>,
    peak: &Arc<AtomicUsize>,
    delay: Duration,
) -> EngineBuilder {
    let (c, p) = (current.clone(), peak.clone());
    Engine::builder()
        .config(config_with(&[(JobKind::Segmentation, pool)]))
        .persistence(mem.clone())
        .with_loader(JobKind::Segmentation, move |_: &Path| -> anyhow::Result<Box<dyn Capability>> {
            Ok(Box::new(FakeSegmenter {
                current: c.clone(),
                peak: p.clone(),
                delay,
            }))
        })
}

fn broken_loader(_: &Path) -> anyhow::Result<Box<dyn Capability>> {
    anyhow::bail!("weights file is truncated")
}

// ==========================================
// 辅助函数
// ==========================================

/// 只启用给定的池，轮询间隔压到 10ms
fn config_with(pools: &[(JobKind, usize)]) -> DispatchConfig {
    let mut cfg = DispatchConfig::default();
    cfg.worker.classification_workers = 0;
    cfg.worker.nsfw_workers = 0;
    cfg.worker.segmentation_workers = 0;
    for (kind, size) in pools {
        match kind {
            JobKind::Classification => cfg.worker.classification_workers = *size,
            JobKind::NsfwClassification => cfg.worker.nsfw_workers = *size,
            JobKind::Segmentation => cfg.worker.segmentation_workers = *size,
            JobKind::Unknown => {}
        }
    }
    cfg.policy.poll_interval_ms = 10;
    cfg
}

#[derive(Clone)]
struct FakeClassifierLoader {
    seen: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl CapabilityLoader for FakeClassifierLoader {
    fn load(&self, _model_dir: &Path) -> anyhow::Result<Box<dyn Capability>> {
        Ok(Box::new(FakeClassifier {
            seen: self.seen.clone(),
            delay: self.delay,
        }))
    }
}

fn classifier_builder(
    cfg: DispatchConfig,
    mem: &MemoryPersistence,
    seen: Arc<Mutex<Vec<String>>>,
    delay: Duration,
) -> EngineBuilder {
    let loader = FakeClassifierLoader { seen, delay };
    Engine::builder()
        .config(cfg)
        .persistence(mem.clone())
        .node_id("test-node")
        .with_loader(JobKind::Classification, loader.clone())
        .with_loader(JobKind::NsfwClassification, loader)
}

async fn wait_for_result(client: &TaskClient, kind: JobKind, id: &str) -> TaskOutcome {
    timeout(Duration::from_secs(5), async {
        loop {
            if let PollStatus::Ready(result) = client.poll(kind, id).await.unwrap() {
                assert_eq!(result.task_id, id);
                return result.outcome;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("result was never published")
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !check() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

// ==========================================
// 测试用例
// ==========================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nsfw_result_is_published_and_upload_removed() {
    let dir = tempfile::tempdir().unwrap();
    let upload = dir.path().join("safe");
    std::fs::write(&upload, b"jpeg").unwrap();

    let mem = MemoryPersistence::new();
    let engine = classifier_builder(
        config_with(&[(JobKind::NsfwClassification, 3)]),
        &mem,
        Default::default(),
        Duration::ZERO,
    )
    .start()
    .await
    .unwrap();
    let client = engine.client();

    let task = TaskData::with_id("job-1", JobKind::NsfwClassification, &upload);
    client.submit(&task).await.unwrap();

    match wait_for_result(&client, JobKind::NsfwClassification, "job-1").await {
        TaskOutcome::Classified {
            label,
            score,
            model_info,
        } => {
            assert_eq!(label, "safe");
            assert_eq!(score, 97.5);
            assert_eq!(model_info.name, "fake");
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    wait_until(|| !upload.exists()).await;

    let metrics = engine.shutdown_and_wait().await;
    assert_eq!(metrics.total_success, 1);
    assert_eq!(metrics.cleanup_failures, 0);
    assert_eq!(metrics.active_tasks, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn segmentation_pool_never_exceeds_its_size() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mem = MemoryPersistence::new();
    let engine = segmentation_builder(2, &mem, &current, &peak, Duration::from_millis(80))
        .start()
        .await
        .unwrap();
    let client = engine.client();

    let mut ids = Vec::new();
    for i in 0..5 {
        let task = TaskData::new(JobKind::Segmentation, format!("/donations/img-{}", i))
            .with_mask(vec![0, 1, 0], format!("img-{}", i));
        client.submit(&task).await.unwrap();
        ids.push(task.id);
    }

    for id in &ids {
        match wait_for_result(&client, JobKind::Segmentation, id).await {
            TaskOutcome::Segmented { points, error } => {
                assert_eq!(points.len(), 3);
                assert!(error.is_empty());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    // 5 个任务排队时两个 Worker 一定同时忙过
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(mem.live_results(), 5);

    let metrics = engine.shutdown_and_wait().await;
    assert_eq!(metrics.total_success, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn backlog_is_spread_across_the_whole_pool() {
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mem = MemoryPersistence::new();
    let mut ids = Vec::new();
    for i in 0..3 {
        let task = TaskData::new(JobKind::Segmentation, format!("/donations/img-{}", i))
            .with_mask(vec![1], format!("img-{}", i));
        mem.push("grabcutme", &serde_json::to_vec(&task).unwrap())
            .await
            .unwrap();
        ids.push(task.id);
    }

    let engine = segmentation_builder(3, &mem, &current, &peak, Duration::from_millis(300))
        .start()
        .await
        .unwrap();
    let started = Instant::now();
    let client = engine.client();

    for id in &ids {
        wait_for_result(&client, JobKind::Segmentation, id).await;
    }
    let elapsed = started.elapsed();

    // 三个 Worker 并行: 串行执行至少要 900ms
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);

    let metrics = engine.shutdown_and_wait().await;
    assert_eq!(metrics.total_success, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_task_is_executed_exactly_once() {
    let mem = MemoryPersistence::new();
    let seen: Arc<Mutex<Vec<String>>> = Default::default();
    let engine = classifier_builder(
        config_with(&[(JobKind::Classification, 4)]),
        &mem,
        seen.clone(),
        Duration::from_millis(20),
    )
    .start()
    .await
    .unwrap();
    let client = engine.client();

    let ids: Vec<String> = (0..20).map(|i| format!("once-{}", i)).collect();
    for id in &ids {
        client
            .submit(&TaskData::with_id(id.clone(), JobKind::Classification, "/uploads/cat"))
            .await
            .unwrap();
    }
    for id in &ids {
        wait_for_result(&client, JobKind::Classification, id).await;
    }

    let metrics = engine.shutdown_and_wait().await;
    assert_eq!(metrics.total_success, 20);

    let seen = seen.lock();
    assert_eq!(seen.len(), 20);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in seen.iter() {
        *counts.entry(id.as_str()).or_default() += 1;
    }
    for id in &ids {
        assert_eq!(counts.get(id.as_str()), Some(&1), "{} not executed exactly once", id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_worker_processes_in_submission_order() {
    let mem = MemoryPersistence::new();
    let seen: Arc<Mutex<Vec<String>>> = Default::default();

    // 引擎启动前就把任务排好
    let ids: Vec<String> = (0..5).map(|i| format!("order-{}", i)).collect();
    for id in &ids {
        let task = TaskData::with_id(id.clone(), JobKind::Classification, "/nonexistent/cat");
        mem.push("predictme", &serde_json::to_vec(&task).unwrap())
            .await
            .unwrap();
    }

    let engine = classifier_builder(
        config_with(&[(JobKind::Classification, 1)]),
        &mem,
        seen.clone(),
        Duration::ZERO,
    )
    .start()
    .await
    .unwrap();

    let client = engine.client();
    wait_for_result(&client, JobKind::Classification, "order-4").await;

    assert_eq!(*seen.lock(), ids);

    // 上传文件不存在只影响回收，结果照样发布
    let metrics = engine.shutdown_and_wait().await;
    assert_eq!(metrics.total_success, 5);
    assert_eq!(metrics.cleanup_failures, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_entries_are_skipped() {
    let mem = MemoryPersistence::new();
    mem.push("predictme", b"{not json").await.unwrap();
    mem.push("predictme", br#"{"uuid":"x","type":"video","filename":"/a"}"#)
        .await
        .unwrap();
    let good = TaskData::with_id("after-garbage", JobKind::Classification, "/tmp/dog");
    mem.push("predictme", &serde_json::to_vec(&good).unwrap())
        .await
        .unwrap();

    let engine = classifier_builder(
        config_with(&[(JobKind::Classification, 1)]),
        &mem,
        Default::default(),
        Duration::ZERO,
    )
    .start()
    .await
    .unwrap();

    wait_for_result(&engine.client(), JobKind::Classification, "after-garbage").await;

    let metrics = engine.shutdown_and_wait().await;
    assert_eq!(metrics.dropped_corrupt, 1);
    assert_eq!(metrics.dropped_unroutable, 1);
    assert_eq!(metrics.total_success, 1);
    assert_eq!(mem.pending_in("predictme"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_stay_pending_by_default() {
    let mem = MemoryPersistence::new();
    let engine = classifier_builder(
        config_with(&[(JobKind::Classification, 1)]),
        &mem,
        Default::default(),
        Duration::ZERO,
    )
    .start()
    .await
    .unwrap();
    let client = engine.client();

    let task = TaskData::with_id("broken", JobKind::Classification, "/uploads/bad");
    client.submit(&task).await.unwrap();

    wait_until(|| engine.metrics().total_failure == 1).await;
    assert_eq!(
        client.poll(JobKind::Classification, "broken").await.unwrap(),
        PollStatus::Pending
    );

    let metrics = engine.shutdown_and_wait().await;
    assert_eq!(metrics.total_success, 0);
    assert_eq!(mem.live_results(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_are_published_when_enabled() {
    let mut cfg = config_with(&[(JobKind::Classification, 1)]);
    cfg.policy.publish_failures = true;

    let mem = MemoryPersistence::new();
    let engine = classifier_builder(cfg, &mem, Default::default(), Duration::ZERO)
        .start()
        .await
        .unwrap();
    let client = engine.client();

    let task = TaskData::with_id("broken", JobKind::Classification, "/uploads/bad");
    client.submit(&task).await.unwrap();

    match wait_for_result(&client, JobKind::Classification, "broken").await {
        TaskOutcome::Failed { error } => assert!(error.contains("unreadable image")),
        other => panic!("unexpected outcome {:?}", other),
    }

    engine.shutdown_and_wait().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_capability_does_not_kill_the_worker() {
    let mem = MemoryPersistence::new();
    let engine = classifier_builder(
        config_with(&[(JobKind::Classification, 1)]),
        &mem,
        Default::default(),
        Duration::ZERO,
    )
    .start()
    .await
    .unwrap();
    let client = engine.client();

    client
        .submit(&TaskData::with_id("p1", JobKind::Classification, "/uploads/boom"))
        .await
        .unwrap();
    client
        .submit(&TaskData::with_id("p2", JobKind::Classification, "/uploads/cat"))
        .await
        .unwrap();

    // 同一个 Worker 在 panic 之后继续处理下一个任务
    wait_for_result(&client, JobKind::Classification, "p2").await;
    assert_eq!(
        client.poll(JobKind::Classification, "p1").await.unwrap(),
        PollStatus::Pending
    );

    let metrics = engine.shutdown_and_wait().await;
    assert_eq!(metrics.total_failure, 1);
    assert_eq!(metrics.total_success, 1);
}

#[tokio::test]
async fn model_load_failure_aborts_start() {
    let mem = MemoryPersistence::new();
    let err = Engine::builder()
        .config(config_with(&[(JobKind::NsfwClassification, 2)]))
        .persistence(mem)
        .with_loader(JobKind::NsfwClassification, broken_loader)
        .start()
        .await
        .err()
        .expect("start should fail");

    match err {
        DispatchError::ModelLoad { kind, worker, reason } => {
            assert_eq!(kind, JobKind::NsfwClassification);
            assert_eq!(worker, 0);
            assert!(reason.contains("truncated"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn enabled_pool_without_loader_is_a_config_error() {
    let err = Engine::builder()
        .config(config_with(&[(JobKind::Segmentation, 1)]))
        .persistence(MemoryPersistence::new())
        .start()
        .await
        .err()
        .expect("start should fail");
    assert!(matches!(err, DispatchError::Config(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn results_expire_after_ttl() {
    let mut cfg = config_with(&[(JobKind::Classification, 1)]);
    cfg.policy.result_ttl_secs = 1;

    let mem = MemoryPersistence::new();
    let engine = classifier_builder(cfg, &mem, Default::default(), Duration::ZERO)
        .start()
        .await
        .unwrap();
    let client = engine.client();

    client
        .submit(&TaskData::with_id("short-lived", JobKind::Classification, "/uploads/cat"))
        .await
        .unwrap();
    wait_for_result(&client, JobKind::Classification, "short-lived").await;

    sleep(Duration::from_millis(1200)).await;
    assert_eq!(
        client
            .poll(JobKind::Classification, "short-lived")
            .await
            .unwrap(),
        PollStatus::Pending
    );

    engine.shutdown_and_wait().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_finishes_in_flight_and_requeues_backlog() {
    let mem = MemoryPersistence::new();
    let engine = classifier_builder(
        config_with(&[(JobKind::Classification, 1)]),
        &mem,
        Default::default(),
        Duration::from_millis(300),
    )
    .start()
    .await
    .unwrap();
    let client = engine.client();

    for i in 0..3 {
        client
            .submit(&TaskData::with_id(
                format!("slow-{}", i),
                JobKind::Classification,
                "/uploads/cat",
            ))
            .await
            .unwrap();
    }

    wait_until(|| engine.metrics().active_tasks == 1).await;
    let metrics = engine.shutdown_and_wait().await;

    // 执行中的任务做完并发布，其余任务回到入站队列
    assert_eq!(metrics.total_success, 1);
    assert_eq!(
        client.poll(JobKind::Classification, "slow-0").await.unwrap(),
        PollStatus::Ready(TaskResult::new(
            "slow-0",
            TaskOutcome::Classified {
                label: "cat".into(),
                score: 97.5,
                model_info: ModelInfo {
                    name: "fake".into(),
                    version: "1".into(),
                    extra: Default::default(),
                },
            },
        ))
    );
    assert_eq!(mem.pending_in("predictme"), 2);
}

#[tokio::test]
async fn cancelled_token_refuses_to_start() {
    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();
    let err = Engine::builder()
        .config(config_with(&[(JobKind::Classification, 1)]))
        .persistence(MemoryPersistence::new())
        .with_loader(JobKind::Classification, broken_loader)
        .shutdown_token(token)
        .start()
        .await
        .err()
        .expect("start should fail");
    assert!(matches!(err, DispatchError::Shutdown));
}
