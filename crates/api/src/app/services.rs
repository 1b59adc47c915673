use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use procura_ai::{TemplateTextGenerator, TextGenerator, WithFallback};
use procura_events::{EventBus, EventEnvelope, InMemoryEventBus};
use procura_infra::pipeline::{CycleEvent, spawn_event_log};
use procura_infra::{
    CycleOrchestrator, CycleOutcome, HttpRelayTransport, InMemoryProcurementStore, LogTransport,
    MessageTransport, OllamaTextGenerator, PipelineContext, PipelineSettings,
    PostgresProcurementStore, ProcuraConfig, ProcurementStore, ReconcileReport, StoreError,
};

/// Shared collaborators handed to every handler through an `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub ctx: PipelineContext,
}

impl AppServices {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Wire the production collaborators described by `config`.
    ///
    /// Without a database URL the service runs against an in-memory store, empty unless
    /// `seed_demo` is set; without a relay URL outbound messages are only logged.
    pub async fn from_config(config: &ProcuraConfig, seed_demo: bool) -> anyhow::Result<Self> {
        let settings = PipelineSettings::from(config);

        let store: Arc<dyn ProcurementStore> = match &config.database_url {
            Some(_) if seed_demo => {
                anyhow::bail!("--seed-demo only applies to the in-memory store; unset DATABASE_URL")
            }
            Some(url) => {
                let store = PostgresProcurementStore::connect(url)
                    .await
                    .context("connecting to the procurement database")?;
                store
                    .run_migrations()
                    .await
                    .context("running database migrations")?;
                info!("using postgres procurement store");
                Arc::new(store)
            }
            None => {
                let store = InMemoryProcurementStore::new();
                if seed_demo {
                    let item = store.seed_demo().context("seeding demo data")?;
                    info!(item = %item, "DATABASE_URL not set; using an in-memory store with demo data");
                } else {
                    warn!("DATABASE_URL not set; using an empty in-memory store (pass --seed-demo for sample data)");
                }
                Arc::new(store)
            }
        };

        let template: Arc<dyn TextGenerator> = Arc::new(TemplateTextGenerator::new());
        let text: Arc<dyn TextGenerator> = match &config.ollama_url {
            Some(url) => {
                let ollama: Arc<dyn TextGenerator> = Arc::new(OllamaTextGenerator::new(
                    url.as_str(),
                    config.ollama_model.as_str(),
                    config.collaborator_timeout,
                )?);
                if config.text_fallback {
                    Arc::new(WithFallback::new(ollama, template))
                } else {
                    ollama
                }
            }
            None => template,
        };

        let transport: Arc<dyn MessageTransport> = match &config.mail_relay_url {
            Some(url) => Arc::new(HttpRelayTransport::new(
                url.as_str(),
                config.collaborator_timeout,
            )?),
            None => {
                warn!("MAIL_RELAY_URL not set; outbound messages are only logged");
                Arc::new(LogTransport)
            }
        };

        let bus = Arc::new(InMemoryEventBus::<EventEnvelope<CycleEvent>>::new());
        spawn_event_log(bus.subscribe()).context("starting the event log")?;
        info!(text = text.name(), "pipeline collaborators ready");
        Ok(Self::new(PipelineContext::new(
            store, text, transport, bus, settings,
        )))
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        CycleOrchestrator::new(self.ctx.clone()).run_cycle().await
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport, StoreError> {
        procura_infra::reconcile(
            self.ctx.store.as_ref(),
            &self.ctx.ledger,
            self.ctx.settings.intent_stale_after,
        )
        .await
    }
}
