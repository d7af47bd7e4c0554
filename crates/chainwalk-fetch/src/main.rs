mod config;
mod feed;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{error, info};

use chainwalk_chain::{
    ChainFetcher, ChainListener, ChainSchema, DiscoveryChainFetcher, DiscoverySchema, Fragment,
    PayloadField,
};

use config::{parse_list, Config};
use feed::FeedScript;

struct PrintListener {
    done: Mutex<bool>,
    notify: Notify,
}

impl PrintListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            done: Mutex::new(false),
            notify: Notify::new(),
        })
    }

    fn mark_done(&self) {
        *self.done.lock().unwrap() = true;
        self.notify.notify_waiters();
    }

    async fn wait_done(&self) {
        loop {
            let notified = self.notify.notified();
            if *self.done.lock().unwrap() {
                return;
            }
            notified.await;
        }
    }
}

impl ChainListener for PrintListener {
    fn on_fragment(&self, fragment: &Fragment) {
        info!(
            key = %fragment.key,
            bytes = fragment.payload.len(),
            tabular = fragment.tabular,
            "fragment"
        );
        println!("{}", String::from_utf8_lossy(&fragment.payload));
    }

    fn on_complete(&self) {
        self.mark_done();
    }

    fn on_error(&self, message: &str) {
        error!(error = %message, "chain failed");
        self.mark_done();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chainwalk_fetch=info,chainwalk_chain=info".into()),
        )
        .init();

    let config = Config::parse();
    let script = FeedScript::load(&config.feed)?;
    let directory = script.directory();
    let feed = script.build_feed()?;
    info!(
        feed = %config.feed.display(),
        fields = script.fields.len(),
        keys = script.records.len(),
        "feed script loaded"
    );

    let listener = PrintListener::new();
    let deadline = Duration::from_secs(config.timeout_secs);

    if let Some(keys) = &config.keys {
        let schema = DiscoverySchema {
            fragment_slots: parse_list(&config.fragment_slots),
            link_slots: parse_list(&config.link_slots),
            continuation_marker: config.marker,
            max_keys: config.max_keys,
        };
        let initial = parse_list(keys);
        let initial: Vec<&str> = initial.iter().map(String::as_str).collect();
        let fetcher = DiscoveryChainFetcher::start(
            feed,
            Some(listener.clone() as Arc<dyn ChainListener>),
            &directory,
            schema,
            &initial,
        )
        .await;
        if fetcher.is_error().await {
            anyhow::bail!("{}", chain_error(fetcher.error_text().await));
        }
        if timeout(deadline, listener.wait_done()).await.is_err() {
            fetcher.cleanup().await;
            anyhow::bail!("discovery walk did not finish within {}s", config.timeout_secs);
        }
        if fetcher.is_error().await {
            anyhow::bail!("{}", chain_error(fetcher.error_text().await));
        }
        info!(keys = fetcher.known_keys().await, "discovery walk finished");
    } else if let Some(start) = &config.start {
        let schema = ChainSchema {
            payload: PayloadField::Text {
                field: config.payload_field.clone(),
            },
            next_field: config.next_field.clone(),
            format_field: config.format_field.clone(),
        };
        let fetcher = ChainFetcher::start(
            feed,
            Some(listener.clone() as Arc<dyn ChainListener>),
            &directory,
            schema,
            start,
            config.limit,
        )
        .await;
        if fetcher.is_error().await {
            anyhow::bail!("{}", chain_error(fetcher.error_text().await));
        }
        if timeout(deadline, listener.wait_done()).await.is_err() {
            fetcher.cleanup().await;
            anyhow::bail!("chain walk did not finish within {}s", config.timeout_secs);
        }
        if fetcher.is_error().await {
            anyhow::bail!("{}", chain_error(fetcher.error_text().await));
        }
        info!(records = fetcher.count().await, "chain walk finished");
    } else {
        anyhow::bail!("one of --start or --keys is required");
    }

    Ok(())
}

fn chain_error(text: Option<String>) -> String {
    text.unwrap_or_else(|| "chain failed without diagnostic".to_string())
}
