//! Lector - 有声书生成服务
//!
//! 启动顺序: 配置 -> 日志 -> SQLite -> 缓存 -> 共享 SynthesisClient -> Worker -> HTTP

use std::sync::Arc;
use std::time::Duration;

use lector::application::ports::{AudioCachePort, SpeechProviderPort};
use lector::application::{ChapterAssembler, JobCoordinator, SynthesisClient};
use lector::config::{load_config, print_config, AppConfig};
use lector::domain::TextChunker;
use lector::infrastructure::adapters::{
    FakeSpeechClient, FileArtifactStorage, FileTextSource, HttpSpeechClient,
    HttpSpeechClientConfig,
};
use lector::infrastructure::http::{AppState, HttpServer, ServerConfig};
use lector::infrastructure::memory::{InMemoryAudioCache, InMemoryJobRegistry};
use lector::infrastructure::persistence::sled::{SledAudioCache, SledCacheConfig};
use lector::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteJobRepository,
};
use lector::infrastructure::worker::{JobWorker, JobWorkerConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},lector={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_speech_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn SpeechProviderPort>> {
    if config.speech.is_fake() {
        tracing::warn!("Using fake speech provider, audio is synthetic");
        return Ok(Arc::new(FakeSpeechClient::with_defaults()));
    }

    let speech_config = HttpSpeechClientConfig::new(&config.speech.url, &config.speech.api_key)
        .with_timeout(config.speech.timeout_secs);
    Ok(Arc::new(HttpSpeechClient::new(speech_config)?))
}

fn build_audio_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn AudioCachePort>> {
    if config.storage.cache_backend.eq_ignore_ascii_case("memory") {
        return Ok(Arc::new(InMemoryAudioCache::new()));
    }

    let cache_config = SledCacheConfig {
        db_path: config.storage.cache_path.to_string_lossy().to_string(),
        max_size_bytes: config.storage.cache_max_size_bytes,
    };
    Ok(Arc::new(SledAudioCache::new(&cache_config)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("Lector - 有声书生成服务");
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.audio_dir).await?;
    tokio::fs::create_dir_all(&config.storage.uploads_dir).await?;
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;
    let repository = Arc::new(SqliteJobRepository::new(pool));

    // 适配器
    let speech_provider = build_speech_provider(&config)?;
    let audio_cache = build_audio_cache(&config)?;
    let storage = Arc::new(
        FileArtifactStorage::new(
            &config.storage.audio_dir,
            config.server.public_base_url(),
            &config.audio.extension,
        )
        .await?,
    );
    let text_source = Arc::new(FileTextSource::new(&config.storage.uploads_dir));

    // 全局共享的合成客户端：令牌桶与并发上限对所有任务生效
    let synthesis_client = Arc::new(SynthesisClient::new(
        speech_provider.clone(),
        audio_cache.clone(),
        config.synthesis_client_config(),
    ));
    let assembler = Arc::new(ChapterAssembler::new(
        TextChunker::new(config.synthesis.max_chunk_size)?,
        synthesis_client.clone(),
        config.synthesis.fan_out,
    ));

    // 任务队列与登记表
    let (job_tx, job_rx) = mpsc::channel(config.worker.queue_capacity);
    let registry = Arc::new(InMemoryJobRegistry::new(job_tx));

    let coordinator = Arc::new(JobCoordinator::new(
        assembler,
        storage,
        registry.clone(),
        repository.clone(),
    ));

    // 启动 Worker
    let shutdown = CancellationToken::new();
    let worker = JobWorker::new(
        JobWorkerConfig {
            max_concurrent_jobs: config.worker.max_concurrent_jobs,
        },
        job_rx,
        coordinator,
    );
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    // 创建 HTTP 服务器
    let server_config = ServerConfig {
        body_limit_bytes: config.server.body_limit_bytes,
        ..ServerConfig::new(
            &config.server.host,
            config.server.port,
            &config.storage.audio_dir,
        )
    };
    let state = AppState::new(
        text_source,
        registry,
        repository,
        audio_cache.clone(),
        speech_provider,
        synthesis_client,
    );
    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    // 停止领取新任务，等待进行中的任务
    shutdown.cancel();
    let grace = Duration::from_secs(config.worker.shutdown_timeout_secs);
    if tokio::time::timeout(grace, worker_handle).await.is_err() {
        tracing::warn!(
            timeout_secs = config.worker.shutdown_timeout_secs,
            "Worker did not drain in time"
        );
    }

    if let Err(e) = audio_cache.flush().await {
        tracing::error!(error = %e, "Failed to flush audio cache");
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}
