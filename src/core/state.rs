use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::repositories::curriculum::PgCurriculumStore;
use crate::repositories::learning_summary_queue::PgLearningSummaryStore;
use crate::services::learning_summary::LearningSummaryStore;
use crate::services::openai::{GenerationService, OpenAiClient};
use crate::services::reconciler::CurriculumStore;

/// External collaborators the pipeline talks to, behind their seams.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) generator: Arc<dyn GenerationService>,
    pub(crate) curriculum: Arc<dyn CurriculumStore>,
    pub(crate) learning: Arc<dyn LearningSummaryStore>,
}

impl Services {
    pub(crate) fn postgres(settings: &Settings, db: PgPool) -> anyhow::Result<Self> {
        let generator = OpenAiClient::from_settings(settings)?;
        Ok(Self {
            generator: Arc::new(generator),
            curriculum: Arc::new(PgCurriculumStore::new(db.clone())),
            learning: Arc::new(PgLearningSummaryStore::new(db)),
        })
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    services: Services,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        services: Services,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, services }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn generator(&self) -> &dyn GenerationService {
        self.inner.services.generator.as_ref()
    }

    pub(crate) fn curriculum(&self) -> &dyn CurriculumStore {
        self.inner.services.curriculum.as_ref()
    }

    pub(crate) fn learning(&self) -> &dyn LearningSummaryStore {
        self.inner.services.learning.as_ref()
    }
}
