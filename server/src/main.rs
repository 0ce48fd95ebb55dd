use anyhow::{Context, Result};
use clap::Parser;
use funnel_ledger::{FunnelConfig, Memory};
use funnel_server::{parse_origins, Api, Backend, RedisStore, Server, ServerConfig};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() -> Result<()> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        });

    if let Some(endpoint) = endpoint {
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "funnel-server".to_string());
        let rate = std::env::var("OTEL_SAMPLING_RATE")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("failed to build OTLP exporter")?;
        let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(rate))
            .with_resource(
                opentelemetry_sdk::Resource::builder_empty()
                    .with_attributes([opentelemetry::KeyValue::new("service.name", service_name)])
                    .build(),
            )
            .with_batch_exporter(exporter)
            .build();
        let tracer = tracer_provider.tracer("funnel-server");
        opentelemetry::global::set_tracer_provider(tracer_provider);

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(LevelFilter::INFO))
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Redis URL for player records (in-memory store when omitted).
    #[arg(long)]
    redis_url: Option<String>,

    /// Prefix prepended to every Redis key.
    #[arg(long)]
    redis_prefix: Option<String>,

    /// HTTP rate limit per IP in requests per second (0 disables rate limiting).
    #[arg(long)]
    http_rate_limit_per_second: Option<u64>,

    /// HTTP rate limit burst size (0 disables rate limiting).
    #[arg(long)]
    http_rate_limit_burst: Option<u32>,

    /// Postback rate limit per IP in requests per minute (0 disables).
    #[arg(long)]
    postback_rate_limit_per_minute: Option<u64>,

    /// Postback rate limit burst size (0 disables).
    #[arg(long)]
    postback_rate_limit_burst: Option<u32>,

    /// Max request body size in bytes (0 disables limit).
    #[arg(long)]
    http_body_limit_bytes: Option<usize>,
}

fn is_production() -> bool {
    matches!(
        std::env::var("NODE_ENV").as_deref(),
        Ok("production") | Ok("prod")
    )
}

/// Maps an optional arg value to Option: 0 => None, Some(v) => Some(v), None => default
fn map_optional_limit<T: Copy + PartialEq + From<u8>>(
    arg: Option<T>,
    default: Option<T>,
) -> Option<T> {
    match arg {
        Some(v) if v == T::from(0) => None,
        Some(v) => Some(v),
        None => default,
    }
}

fn parse_env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn parse_env_u32(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn build_config(args: &Args) -> Result<ServerConfig> {
    let defaults = ServerConfig::default();
    if let Some(url) = &args.redis_url {
        if url.trim().is_empty() {
            anyhow::bail!("redis_url must not be empty when set");
        }
    }
    // Environment overrides flags for the general HTTP limiter.
    let http_rate_limit_per_second = parse_env_u64("RATE_LIMIT_HTTP_PER_SEC")
        .or(args.http_rate_limit_per_second);
    let http_rate_limit_burst =
        parse_env_u32("RATE_LIMIT_HTTP_BURST").or(args.http_rate_limit_burst);
    Ok(ServerConfig {
        redis_url: args.redis_url.clone(),
        redis_prefix: args
            .redis_prefix
            .clone()
            .unwrap_or_else(|| defaults.redis_prefix.clone()),
        http_rate_limit_per_second: map_optional_limit(
            http_rate_limit_per_second,
            defaults.http_rate_limit_per_second,
        ),
        http_rate_limit_burst: map_optional_limit(
            http_rate_limit_burst,
            defaults.http_rate_limit_burst,
        ),
        postback_rate_limit_per_minute: map_optional_limit(
            args.postback_rate_limit_per_minute,
            defaults.postback_rate_limit_per_minute,
        ),
        postback_rate_limit_burst: map_optional_limit(
            args.postback_rate_limit_burst,
            defaults.postback_rate_limit_burst,
        ),
        http_body_limit_bytes: map_optional_limit(
            args.http_body_limit_bytes,
            defaults.http_body_limit_bytes,
        ),
        allowed_origins: std::env::var("ALLOWED_HTTP_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or(defaults.allowed_origins),
        metrics_auth_token: non_empty_env("METRICS_AUTH_TOKEN"),
    })
}

fn funnel_config() -> FunnelConfig {
    let config = FunnelConfig::new(
        std::env::var("ADMIN_PASSWORD").ok(),
        std::env::var("AFFILIATE_LINK").ok(),
    );
    if config.admin_password.is_none() {
        warn!("ADMIN_PASSWORD is not set; admin operations are disabled");
    }
    if config.affiliate_link.is_none() {
        warn!("AFFILIATE_LINK is not set; the registration link endpoint will return 404");
    }
    config
}

fn require_env(var: &str) -> Result<String> {
    non_empty_env(var).with_context(|| format!("Missing required env: {var}"))
}

fn ensure_production_env(config: &ServerConfig) -> Result<()> {
    if !is_production() {
        return Ok(());
    }
    require_env("METRICS_AUTH_TOKEN")?;
    if config.redis_url.is_none() {
        anyhow::bail!("--redis-url is required in production");
    }
    Ok(())
}

fn open_backend(config: &ServerConfig) -> Result<Backend> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::new(url, config.redis_prefix.clone())
                .context("invalid redis url")?;
            Ok(Backend::Redis(store))
        }
        None => {
            warn!("no --redis-url given; player records are kept in memory only");
            Ok(Backend::Memory(Memory::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    init_tracing()?;

    let config = build_config(&args)?;
    ensure_production_env(&config)?;
    let backend = open_backend(&config)?;
    info!(
        store = backend.name(),
        config = %serde_json::to_string(&config).unwrap_or_default(),
        "funnel server configured"
    );

    let server = Arc::new(Server::new(backend, funnel_config(), config));
    let app = Api::new(server).router();

    // Start server
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}
