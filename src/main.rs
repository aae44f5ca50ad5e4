use dotenvy::dotenv;
use music_inline_bot::bot::{handle_inline_query, InlineQueryService, QueryCache, TelegramUploader};
use music_inline_bot::catalog::{Catalog, HttpCatalog};
use music_inline_bot::config::{
    get_inline_cache_time, get_query_cache_max_size, get_query_cache_ttl, Settings,
};
use music_inline_bot::ingest::BulkIngestion;
use music_inline_bot::media::{HttpMediaFetcher, MediaResolver};
use music_inline_bot::storage::{JsonTokenStore, TokenStorage};
use music_inline_bot::utils::create_http_client;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting the bot token from logs
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.token1.replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self.token2.replace_all(&output, "[TELEGRAM_TOKEN]");
        self.token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .into_owned()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the input length; the redacted text may differ in size
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: Arc::clone(&self.patterns),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Compile redaction patterns before any log line can carry the token
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting music inline bot...");

    let settings = init_settings();

    let store: Arc<dyn TokenStorage> =
        Arc::new(JsonTokenStore::load(&settings.file_ids_path).await);
    info!(tokens = store.len(), "Token store ready.");

    let bot = Bot::new(settings.bot_token.clone());
    let http = create_http_client();

    let resolver = Arc::new(MediaResolver::new(
        store,
        Arc::new(HttpMediaFetcher::with_client(http.clone())),
        Arc::new(TelegramUploader::new(
            bot.clone(),
            ChatId(settings.upload_chat_id),
        )),
        settings.site_url.clone(),
    ));
    let catalog: Arc<dyn Catalog> = Arc::new(HttpCatalog::with_client(
        http,
        settings.api_base_url.clone(),
    ));

    let shutdown = CancellationToken::new();
    if settings.upload_songs {
        spawn_ingestion(Arc::clone(&catalog), Arc::clone(&resolver), shutdown.clone());
    }

    let service = Arc::new(init_inline_service(catalog, resolver));

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![service])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error while handling an update",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    info!("Bot stopped.");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_inline_service(catalog: Arc<dyn Catalog>, resolver: Arc<MediaResolver>) -> InlineQueryService {
    let ttl = get_query_cache_ttl();
    let max_size = get_query_cache_max_size();
    let cache_time = get_inline_cache_time();

    info!(
        "Initializing QueryCache (ttl: {}s, max_size: {}, inline cache_time: {}s)",
        ttl, max_size, cache_time
    );

    InlineQueryService::new(
        catalog,
        resolver,
        QueryCache::new(Duration::from_secs(ttl), max_size),
    )
    .with_cache_time(cache_time)
}

fn spawn_ingestion(
    catalog: Arc<dyn Catalog>,
    resolver: Arc<MediaResolver>,
    shutdown: CancellationToken,
) {
    info!("Uploading songs...");
    let job = BulkIngestion::new(catalog, resolver).with_cancellation(shutdown);
    tokio::spawn(async move {
        match job.run().await {
            Ok(uploaded) => info!(uploaded, "Song upload finished."),
            Err(e) => warn!(error = %e, "Song upload did not start"),
        }
    });
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().branch(Update::filter_inline_query().endpoint(handle_inline_query))
}
