use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use roomcore::vocab::{VocabConfig, VocabOnce};
use roomcore::Registry;
use wordvec::word2vec::Word2VecOracle;
use wordvec::EmbeddingOracle;

mod router;

fn usage_and_exit() -> ! {
    eprintln!(
        "warmwordd\n\n\
USAGE:\n  warmwordd [--bind HOST:PORT] [--vocab PATH] [--vectors PATH] [--cors-origin ORIGIN]...\n           [--rank-size N] [--target-pool N] [--pos-lexicon PATH]\n\n\
ENV:\n  WARMWORD_BIND         default 0.0.0.0:8000\n  WARMWORD_CORS         comma-separated origins; unset = permissive\n  WARMWORD_VOCAB        default vocab.txt (newline-separated lowercase words)\n  WARMWORD_VECTORS      default vectors.txt (word2vec text format)\n  WARMWORD_RANK_SIZE    optional cap on words fed into ranking\n  WARMWORD_TARGET_POOL  default 2000 (head of the list targets are drawn from)\n  WARMWORD_POS_LEXICON  optional word<TAB>TAG lexicon for the oracle\n"
    );
    std::process::exit(2);
}

#[derive(Clone, Debug)]
struct Config {
    bind: SocketAddr,
    cors_origins: Vec<String>,
    vocab_path: PathBuf,
    vectors_path: PathBuf,
    pos_lexicon: Option<PathBuf>,
    rank_size: Option<usize>,
    target_pool: usize,
}

fn parse_args() -> Config {
    let mut bind: SocketAddr = std::env::var("WARMWORD_BIND")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());

    let mut cors_origins: Vec<String> = std::env::var("WARMWORD_CORS")
        .ok()
        .map(|v| {
            v.split(',')
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut vocab_path: PathBuf = std::env::var("WARMWORD_VOCAB")
        .unwrap_or_else(|_| "vocab.txt".to_string())
        .into();
    let mut vectors_path: PathBuf = std::env::var("WARMWORD_VECTORS")
        .unwrap_or_else(|_| "vectors.txt".to_string())
        .into();
    let mut pos_lexicon: Option<PathBuf> = std::env::var("WARMWORD_POS_LEXICON").ok().map(Into::into);

    let mut rank_size: Option<usize> = std::env::var("WARMWORD_RANK_SIZE")
        .ok()
        .and_then(|v| v.parse().ok());
    let mut target_pool: usize = std::env::var("WARMWORD_TARGET_POOL")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2000);

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "--cors-origin" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                cors_origins.push(v);
            }
            "--vocab" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                vocab_path = v.into();
            }
            "--vectors" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                vectors_path = v.into();
            }
            "--pos-lexicon" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                pos_lexicon = Some(v.into());
            }
            "--rank-size" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                rank_size = Some(v.parse().unwrap_or_else(|_| usage_and_exit()));
            }
            "--target-pool" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                target_pool = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        bind,
        cors_origins,
        vocab_path,
        vectors_path,
        pos_lexicon,
        rank_size,
        target_pool,
    }
}

/// Shared handles for every connection. Cloning is cheap; everything heavy
/// sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub vocab: Arc<VocabOnce>,
    pub vocab_cfg: VocabConfig,
    pub oracle: Arc<dyn EmbeddingOracle>,
    pub sessions: Arc<router::Sessions>,
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    let mut vals = Vec::with_capacity(origins.len());
    for o in origins {
        vals.push(
            o.parse::<HeaderValue>()
                .with_context(|| format!("bad cors origin {o:?}"))?,
        );
    }
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(vals))
        .allow_methods(Any)
        .allow_headers(Any))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warmwordd=info".into()),
        )
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cfg = parse_args();

    // The vector table is the expensive part of startup; the vocabulary
    // cache itself waits for the first room.
    let mut oracle = Word2VecOracle::load(&cfg.vectors_path)?;
    if let Some(p) = &cfg.pos_lexicon {
        oracle = oracle.with_pos_lexicon(p)?;
    }

    let state = AppState {
        registry: Arc::new(Registry::new()),
        vocab: Arc::new(VocabOnce::new()),
        vocab_cfg: VocabConfig {
            vocab_path: cfg.vocab_path.clone(),
            target_pool_size: cfg.target_pool,
            rank_size: cfg.rank_size,
            ..VocabConfig::default()
        },
        oracle: Arc::new(oracle),
        sessions: Arc::new(router::Sessions::new()),
    };

    let app = Router::new()
        .route("/ws", get(router::ws_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(cors_layer(&cfg.cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    info!(bind = %cfg.bind, "warmwordd listening");
    axum::serve(listener, app).await?;
    Ok(())
}
