//! Shared application state assembled from configuration.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use kestrel_bandit::ThompsonBandit;
use kestrel_config::KestrelConfig;
use kestrel_core::Genome;
use kestrel_evolve::{ImprovementDaemon, PopulationLoop};
use kestrel_llm::{Executor, Generator, HttpGenerator, MockGenerator, RubricRewriter};
use kestrel_retrieval::{
    load_corpus, Embedder, HashEmbedder, HttpEmbedder, HybridRetriever, MemoryLexicalIndex,
    MemoryVectorIndex, OverlapReranker, QueryCache, RagService,
};
use kestrel_router::Router as BanditRouter;

/// Immutable state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<KestrelConfig>,
    pub rag: Arc<RagService>,
    pub bandit: Arc<ThompsonBandit>,
    pub router: Arc<BanditRouter>,
    pub population_loop: Arc<PopulationLoop>,
    pub daemon: Arc<ImprovementDaemon>,
    pub baseline: Genome,
    pub generator_name: &'static str,
}

impl AppState {
    pub async fn new(config: KestrelConfig) -> anyhow::Result<Self> {
        let generator: Arc<dyn Generator> = match &config.models.generator_url {
            Some(url) => {
                info!(url, "using OpenAI-compatible generator endpoint");
                Arc::new(HttpGenerator::new(url.clone()))
            }
            None => {
                info!("no generator endpoint configured; using the scripted mock");
                Arc::new(MockGenerator::echo())
            }
        };
        let generator_name = generator.name();

        let embedder: Arc<dyn Embedder> = match &config.retrieval.embedding_url {
            Some(url) => {
                info!(url, "using embedding endpoint");
                Arc::new(HttpEmbedder::new(
                    url.clone(),
                    config.retrieval.embedding_model.clone(),
                    1024,
                ))
            }
            None => Arc::new(HashEmbedder::default()),
        };

        let docs = match &config.retrieval.corpus_path {
            Some(path) => load_corpus(path)
                .with_context(|| format!("loading corpus from {}", path.display()))?,
            None => Vec::new(),
        };
        info!(count = docs.len(), "document corpus loaded");

        let vector = MemoryVectorIndex::index(embedder.clone(), docs.clone())
            .await
            .context("building vector index")?;
        let lexical = MemoryLexicalIndex::index(docs);
        let retriever = HybridRetriever::new(
            Arc::new(vector),
            Arc::new(lexical),
            embedder,
            Arc::new(OverlapReranker),
            config.retrieval.clone(),
        );
        let rag = Arc::new(RagService::new(
            retriever,
            QueryCache::new(config.cache),
            config.server.max_inflight_queries,
        ));

        let executor = Arc::new(
            Executor::new(generator.clone(), config.executor.clone()).with_rag(rag.clone()),
        );

        let bandit = Arc::new(
            ThompsonBandit::new(config.bandit).with_snapshot_path(config.bandit_snapshot_path()),
        );

        let rewriter = Arc::new(RubricRewriter::new(
            generator,
            config.models.baseline_model.clone(),
        ));
        let population_loop = Arc::new(
            PopulationLoop::new(
                executor.clone(),
                config.fitness,
                config.population.clone(),
                config.models.allow_list.clone(),
            )
            .with_rewriter(rewriter),
        );

        let baseline = Genome::new(
            config.models.baseline_rubric.clone(),
            false,
            0.3,
            512,
            0,
            false,
            config.models.baseline_model.clone(),
        )
        .context("baseline genome invalid")?;

        let daemon = Arc::new(ImprovementDaemon::new(
            population_loop.clone(),
            baseline.clone(),
            config.golden_path(),
            config.history_dir(),
            config.daemon,
        ));

        let router = Arc::new(BanditRouter::new(
            bandit.clone(),
            executor,
            config.fitness,
            baseline.clone(),
        ));
        // Promoted genomes flow straight into the live arm set.
        router.clone().watch_promotions(daemon.subscribe());

        if config.daemon.enabled {
            info!(interval_s = config.daemon.interval_s, "improvement daemon enabled");
            daemon.clone().spawn(config.population.generations);
        }

        Ok(Self {
            config: Arc::new(config),
            rag,
            bandit,
            router,
            population_loop,
            daemon,
            baseline,
            generator_name,
        })
    }
}
