//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::ports::{
    AudioCachePort, JobRegistryPort, JobRepositoryPort, SpeechProviderPort, TextSourcePort,
};
use crate::application::{
    // Command handlers
    CancelJobHandler, ResumeJobHandler, SubmitJobHandler,
    // Query handlers
    GetJobHandler, ListJobsHandler,
    SynthesisClient,
};

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub audio_cache: Arc<dyn AudioCachePort>,
    pub speech_provider: Arc<dyn SpeechProviderPort>,
    pub synthesis_client: Arc<SynthesisClient>,

    // ========== Command Handlers ==========
    pub submit_job_handler: SubmitJobHandler,
    pub cancel_job_handler: CancelJobHandler,
    pub resume_job_handler: ResumeJobHandler,

    // ========== Query Handlers ==========
    pub get_job_handler: GetJobHandler,
    pub list_jobs_handler: ListJobsHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        text_source: Arc<dyn TextSourcePort>,
        registry: Arc<dyn JobRegistryPort>,
        repository: Arc<dyn JobRepositoryPort>,
        audio_cache: Arc<dyn AudioCachePort>,
        speech_provider: Arc<dyn SpeechProviderPort>,
        synthesis_client: Arc<SynthesisClient>,
    ) -> Self {
        Self {
            // Ports
            audio_cache,
            speech_provider,
            synthesis_client,

            // Command handlers
            submit_job_handler: SubmitJobHandler::new(
                text_source,
                registry.clone(),
                repository.clone(),
            ),
            cancel_job_handler: CancelJobHandler::new(registry.clone(), repository.clone()),
            resume_job_handler: ResumeJobHandler::new(registry.clone(), repository.clone()),

            // Query handlers
            get_job_handler: GetJobHandler::new(registry.clone(), repository.clone()),
            list_jobs_handler: ListJobsHandler::new(registry, repository),
        }
    }
}
