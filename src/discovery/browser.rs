// src/discovery/browser.rs - render-capable sessions for pages that only
// show an email after client-side scripts run
use crate::discovery::fetch::{FetchFailure, FetchResult};
use crate::models::DiscoveryError;
use headless_chrome::{Browser, LaunchOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One live render session. Belongs to exactly one worker and is released
/// when that worker's fetcher drops. Calls may block the current thread;
/// `HeavyFetcher` keeps them off the async runtime.
pub trait RenderSession: Send + Sync + 'static {
    fn render(&self, url: &str, ready_timeout: Duration) -> FetchResult;
}

pub trait SessionFactory: Send + Sync + 'static {
    type Session: RenderSession;

    fn create(&self) -> Result<Self::Session, DiscoveryError>;
}

/// Lazy per-worker handle around an expensive render session. The session is
/// launched on the first `render` call, reused for every request after that,
/// and released exactly once when this handle is dropped with the worker.
/// Session launch and rendering are blocking CDP I/O, so both run on the
/// blocking pool; only the issuing worker waits on them.
pub struct HeavyFetcher<F: SessionFactory> {
    factory: Arc<F>,
    ready_timeout: Duration,
    session: Option<Arc<F::Session>>,
}

impl<F: SessionFactory> HeavyFetcher<F> {
    pub fn new(factory: Arc<F>, ready_timeout: Duration) -> Self {
        Self {
            factory,
            ready_timeout,
            session: None,
        }
    }

    pub async fn render(&mut self, url: &str) -> Result<FetchResult, DiscoveryError> {
        let session = match self.session.as_ref() {
            Some(session) => Arc::clone(session),
            None => {
                info!("Launching render session on first use");
                let factory = Arc::clone(&self.factory);
                let created = tokio::task::spawn_blocking(move || factory.create())
                    .await
                    .map_err(|e| {
                        DiscoveryError::Session(format!("session launch task failed: {}", e))
                    })??;
                let created = Arc::new(created);
                self.session = Some(Arc::clone(&created));
                created
            }
        };

        let target = url.to_string();
        let ready_timeout = self.ready_timeout;
        match tokio::task::spawn_blocking(move || session.render(&target, ready_timeout)).await {
            Ok(result) => Ok(result),
            // A panicked render loses that page, not the worker's session.
            Err(e) => {
                warn!("Render task panicked for {}: {}", url, e);
                Ok(FetchResult::Failed(FetchFailure::Network(format!(
                    "render task panicked: {}",
                    e
                ))))
            }
        }
    }
}

/// Launches headless Chrome processes.
pub struct ChromeSessionFactory;

impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    fn create(&self) -> Result<ChromeSession, DiscoveryError> {
        let browser = Browser::new(LaunchOptions {
            headless: true,
            sandbox: false,
            // Workers hold their session across many records; the default
            // 30s idle kill would tear it down between slow light fetches.
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        })
        .map_err(|e| DiscoveryError::Session(e.to_string()))?;
        debug!("Headless Chrome launched");
        Ok(ChromeSession { browser })
    }
}

/// A headless Chrome process. The underlying browser is killed when this is
/// dropped, so release follows worker shutdown even on panic unwind.
pub struct ChromeSession {
    browser: Browser,
}

impl RenderSession for ChromeSession {
    fn render(&self, url: &str, ready_timeout: Duration) -> FetchResult {
        let tab = match self.browser.new_tab() {
            Ok(tab) => tab,
            Err(e) => return FetchResult::Failed(FetchFailure::Network(e.to_string())),
        };
        tab.set_default_timeout(ready_timeout);

        if let Err(e) = tab.navigate_to(url) {
            let _ = tab.close(true);
            return FetchResult::Failed(FetchFailure::Network(e.to_string()));
        }
        // Readiness never firing is tolerated: proceed with whatever the
        // page managed to render.
        if let Err(e) = tab.wait_until_navigated() {
            debug!("Readiness wait gave up for {}: {}", url, e);
        }

        let content = tab.get_content();
        let _ = tab.close(true);
        match content {
            Ok(html) => {
                debug!("Rendered {} bytes from {}", html.len(), url);
                FetchResult::Content(html)
            }
            Err(e) => {
                warn!("Failed to read rendered content from {}: {}", url, e);
                FetchResult::Failed(FetchFailure::Network(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts session creations and releases so lifecycle rules are checkable.
    pub(crate) struct CountingFactory {
        pub created: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
        pub renders: Arc<AtomicUsize>,
    }

    impl CountingFactory {
        pub(crate) fn new() -> Self {
            Self {
                created: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicUsize::new(0)),
                renders: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    pub(crate) struct CountingSession {
        released: Arc<AtomicUsize>,
        renders: Arc<AtomicUsize>,
    }

    impl SessionFactory for CountingFactory {
        type Session = CountingSession;

        fn create(&self) -> Result<CountingSession, DiscoveryError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(CountingSession {
                released: Arc::clone(&self.released),
                renders: Arc::clone(&self.renders),
            })
        }
    }

    impl RenderSession for CountingSession {
        fn render(&self, _url: &str, _ready_timeout: Duration) -> FetchResult {
            self.renders.fetch_add(1, Ordering::SeqCst);
            FetchResult::Content("<html>rendered info@acme.com</html>".to_string())
        }
    }

    impl Drop for CountingSession {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Refuses every launch, as when no browser binary is installed.
    pub(crate) struct FailingFactory;

    impl SessionFactory for FailingFactory {
        type Session = CountingSession;

        fn create(&self) -> Result<CountingSession, DiscoveryError> {
            Err(DiscoveryError::Session("chrome not installed".to_string()))
        }
    }

    #[tokio::test]
    async fn one_session_across_many_renders() {
        let factory = Arc::new(CountingFactory::new());
        let (created, released, renders) = (
            Arc::clone(&factory.created),
            Arc::clone(&factory.released),
            Arc::clone(&factory.renders),
        );
        {
            let mut fetcher = HeavyFetcher::new(factory, Duration::from_secs(1));
            for i in 0..7 {
                let url = format!("https://facebook.com/page{}", i);
                assert!(matches!(
                    fetcher.render(&url).await,
                    Ok(FetchResult::Content(_))
                ));
            }
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(renders.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn unused_fetcher_never_launches_a_session() {
        let factory = Arc::new(CountingFactory::new());
        let (created, released) = (Arc::clone(&factory.created), Arc::clone(&factory.released));
        {
            let _fetcher = HeavyFetcher::new(factory, Duration::from_secs(1));
        }
        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn creation_failure_surfaces_as_session_error() {
        let mut fetcher = HeavyFetcher::new(Arc::new(FailingFactory), Duration::from_secs(1));
        assert!(matches!(
            fetcher.render("https://facebook.com/acme").await,
            Err(DiscoveryError::Session(_))
        ));
    }
}
