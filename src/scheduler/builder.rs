use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    common::{
        CapabilityLoader, DispatchConfig, DispatchError, JobKind, Result, get_hostname,
    },
    driver::{DriverContext, DriverMetrics, IngestDriver},
    persistence::{ResultStore, TaskQueue},
    policy::{self, WaitStrategy},
    scheduler::{
        client::TaskClient, context::PoolContext, dispatcher::Dispatcher, engine::Engine,
        publisher::ResultPublisher,
    },
};

/// 引擎构建器
///
/// 用于一步步配置并启动调度引擎。
pub struct EngineBuilder {
    /// 选填: 全局配置 (默认 `DispatchConfig::default()`)
    config: Option<DispatchConfig>,
    /// 任务队列 (必须)
    queue: Option<Arc<dyn TaskQueue>>,
    /// 结果存储 (必须)
    store: Option<Arc<dyn ResultStore>>,
    /// 每个启用的任务类型都必须注册一个加载器
    loaders: HashMap<JobKind, Arc<dyn CapabilityLoader>>,
    /// 选填: 空闲轮询策略 (默认按配置生成)
    wait_strategy: Option<Arc<dyn WaitStrategy>>,
    /// 选填: 节点 ID (默认主机名)
    node_id: Option<String>,
    /// 选填: 全局停机信号 (用于多组件协同)
    shutdown_token: Option<CancellationToken>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            queue: None,
            store: None,
            loaders: HashMap::new(),
            wait_strategy: None,
            node_id: None,
            shutdown_token: None,
        }
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 同一个后端同时充当队列和结果存储 (Redis / 内存)
    pub fn persistence<P>(mut self, persistence: P) -> Self
    where
        P: TaskQueue + ResultStore + Clone,
    {
        self.queue = Some(Arc::new(persistence.clone()));
        self.store = Some(Arc::new(persistence));
        self
    }

    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 为某个任务类型注册能力加载器
    pub fn with_loader<L: CapabilityLoader>(mut self, kind: JobKind, loader: L) -> Self {
        self.loaders.insert(kind, Arc::new(loader));
        self
    }

    pub fn with_strategy<S: WaitStrategy>(mut self, strategy: S) -> Self {
        self.wait_strategy = Some(Arc::new(strategy));
        self
    }

    pub fn node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = Some(token);
        self
    }

    /// [核心] 加载模型并启动引擎
    ///
    /// 组装顺序: 校验配置 -> 逐个池加载能力实例 -> 启动 Worker 与配对循环 -> 启动 Ingest。
    /// 任何一个池的模型加载失败都会直接返回错误，此时还没有任何后台任务被启动。
    pub async fn start(self) -> Result<Engine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let queue = self
            .queue
            .ok_or_else(|| DispatchError::Config("task queue is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| DispatchError::Config("result store is required".into()))?;

        let shutdown = self.shutdown_token.unwrap_or_default();
        if shutdown.is_cancelled() {
            return Err(DispatchError::Shutdown);
        }

        let node_id = self.node_id.unwrap_or_else(get_hostname);
        let wait_strategy = self
            .wait_strategy
            .unwrap_or_else(|| Arc::from(policy::from_config(&config.policy)));
        let config = Arc::new(config);
        let metrics = Arc::new(DriverMetrics::default());

        let base = DriverContext::new(
            node_id.clone(),
            queue.clone(),
            config.clone(),
            metrics.clone(),
            shutdown.clone(),
        );
        let publisher = ResultPublisher::new(
            store.clone(),
            Duration::from_secs(config.policy.result_ttl_secs),
        );

        info!(
            "[Engine-{}] Result TTL {}s, idle poll {}ms ({:?}).",
            node_id,
            publisher.ttl().as_secs(),
            config.policy.poll_interval_ms,
            config.policy.poll_strategy
        );

        // 1. 先把所有池的模型加载完，失败就整体放弃
        let mut routes = HashMap::new();
        let mut dispatchers = Vec::new();
        for kind in JobKind::ALL {
            let pool_size = config.worker.pool_size(kind);
            if pool_size == 0 {
                continue;
            }
            let loader = self.loaders.get(&kind).cloned().ok_or_else(|| {
                DispatchError::Config(format!("no capability loader registered for {}", kind))
            })?;
            let model_dir = config
                .models
                .dir_for(kind)
                .cloned()
                .ok_or_else(|| DispatchError::Config(format!("no model directory for {}", kind)))?;

            let (task_tx, task_rx) = mpsc::channel(config.worker.queue_capacity);
            let ctx = PoolContext::new(kind, base.clone(), publisher.clone());
            let dispatcher = Dispatcher::load(ctx, pool_size, model_dir, loader, task_rx).await?;

            routes.insert(kind, task_tx);
            dispatchers.push(dispatcher);
        }

        // 2. 启动各个池
        let mut tasks = JoinSet::new();
        for dispatcher in dispatchers {
            info!(
                "[Engine-{}] Pool '{}' up with {} worker(s).",
                node_id,
                dispatcher.kind(),
                config.worker.pool_size(dispatcher.kind())
            );
            dispatcher.spawn(&mut tasks);
        }

        // 3. 最后启动 Ingest，开始消费入站队列
        let ingest = IngestDriver::new(base, routes, wait_strategy);
        tasks.spawn(ingest.run());

        let client = TaskClient::new(queue, store, config.queues.clone());
        Ok(Engine::new(node_id, shutdown, metrics, client, tasks))
    }
}
