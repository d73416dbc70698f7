//! Integration tests for crawl runs
//!
//! These tests use wiremock to create mock HTTP servers and drive complete
//! runs through the service and the coordinator.

use futures::stream::{self, StreamExt};
use kumo_crawl::config::Config;
use kumo_crawl::crawler::{
    EngineError, EngineEvent, EventStream, FetchStrategy, FetchedPage, NativeEngine,
};
use kumo_crawl::{CrawlService, RequestBody, StopReason};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Configuration with retry delays short enough for tests
fn test_config() -> Config {
    let mut config = Config::default();
    config.retry.backoff_ms = 10;
    config.retry.rate_limit_backoff_ms = 10;
    config.crawler.fetch_timeout_ms = 5_000;
    config.crawler.connect_timeout_ms = 1_000;
    config
}

fn html(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn multipage(url: &str, max_pages: i64) -> RequestBody {
    RequestBody {
        mode: Some("multipage".to_string()),
        max_pages: Some(max_pages),
        ..RequestBody::for_url(url)
    }
}

fn direct_service(config: Config) -> CrawlService {
    CrawlService::with_engine(config, None).unwrap()
}

#[tokio::test]
async fn test_single_mode_flags_external_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html(
            "Home",
            r#"<a href="/about">About</a>
               <a href="https://elsewhere.example/page">Elsewhere</a>
               <img src="/logo.png" alt="Logo">
               <meta name="description" content="home page">"#,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("About", ""))
        .expect(0)
        .mount(&server)
        .await;

    let service = direct_service(test_config());
    let reply = service.handle(RequestBody::for_url(server.uri())).await;

    assert_eq!(reply.status, 200);
    let body = reply.body;
    assert_eq!(body["mode"], "single");
    assert_eq!(body["summary"]["totalPages"], 1);
    assert_eq!(body["pages"][0]["title"], "Home");

    let links = body["pages"][0]["links"].as_array().unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0]["href"], format!("{}/about", server.uri()));
    assert_eq!(links[0]["isExternal"], false);
    assert_eq!(links[1]["isExternal"], true);

    assert_eq!(body["extractedData"]["images"][0]["alt"], "Logo");
    assert!(body["responseTime"].is_u64());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_multipage_respects_page_budget() {
    let server = MockServer::start().await;
    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", html("Home", &links)).await;
    for i in 1..=5 {
        mount_page(&server, &format!("/p{}", i), html(&format!("Page {}", i), "")).await;
    }

    let service = direct_service(test_config());
    let request = service.validate(&multipage(&server.uri(), 3)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(run.pages().len(), 3);
    assert_eq!(run.stop_reason(), StopReason::PageBudget);
    assert!(run.unvisited_remaining() >= 2);
    assert!(run.visited_count() >= run.pages().len());

    let unique: HashSet<&str> = run.pages().iter().map(|p| p.url.as_str()).collect();
    assert_eq!(unique.len(), run.pages().len());
}

#[tokio::test]
async fn test_frontier_exhaustion_visits_each_page_once() {
    let server = MockServer::start().await;
    // every page links to every other page, plus fragment and case variants
    let nav = r#"<a href="/">Home</a><a href="/a">A</a><a href="/A#top">A top</a><a href="/b/">B</a>"#;
    for route in ["/", "/a", "/b/"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(route, nav))
            .expect(1)
            .mount(&server)
            .await;
    }

    let service = direct_service(test_config());
    let request = service.validate(&multipage(&server.uri(), 20)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(run.pages().len(), 3);
    assert_eq!(run.stop_reason(), StopReason::FrontierExhausted);
    assert_eq!(run.unvisited_remaining(), 0);
    assert_eq!(run.error_count(), 0);
}

#[tokio::test]
async fn test_rate_limited_page_counts_one_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let service = direct_service(test_config());
    let request = service.validate(&RequestBody::for_url(server.uri())).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert!(run.pages().is_empty());
    assert_eq!(run.error_count(), 1);
    assert_eq!(run.stop_reason(), StopReason::SingleModeComplete);
}

#[tokio::test]
async fn test_failed_seed_is_still_a_success_reply() {
    let server = MockServer::start().await;
    mount_page(&server, "/", ResponseTemplate::new(503)).await;

    let service = direct_service(test_config());
    let reply = service.handle(multipage(&server.uri(), 5)).await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["summary"]["totalPages"], 0);
    assert_eq!(reply.body["pages"].as_array().unwrap().len(), 0);
    assert_eq!(reply.body["performance"]["stopReason"], "frontier_exhausted");
}

#[tokio::test]
async fn test_deadline_stops_run() {
    let server = MockServer::start().await;
    let links: String = (1..=10).map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i)).collect();
    mount_page(
        &server,
        "/",
        html("Home", &links).set_delay(Duration::from_millis(200)),
    )
    .await;
    for i in 1..=10 {
        mount_page(
            &server,
            &format!("/p{}", i),
            html("Slow", "").set_delay(Duration::from_millis(200)),
        )
        .await;
    }

    let mut config = test_config();
    config.crawler.max_crawl_duration_ms = 300;
    let service = direct_service(config);
    let request = service.validate(&multipage(&server.uri(), 50)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(run.stop_reason(), StopReason::Deadline);
    assert!(run.stop_reason().is_aborted());
    assert!(!run.pages().is_empty());
    assert!(run.pages().len() < 11);
}

#[tokio::test]
async fn test_error_budget_stops_run() {
    let server = MockServer::start().await;
    let links: String = (1..=6).map(|i| format!(r#"<a href="/bad{}">{}</a>"#, i, i)).collect();
    mount_page(&server, "/", html("Home", &links)).await;
    for i in 1..=6 {
        mount_page(&server, &format!("/bad{}", i), ResponseTemplate::new(500)).await;
    }

    // 10 pages -> error budget of 3
    let service = direct_service(test_config());
    let request = service.validate(&multipage(&server.uri(), 10)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(run.stop_reason(), StopReason::ErrorBudget);
    assert_eq!(run.error_count(), 3);
    assert_eq!(run.pages().len(), 1);
    assert_eq!(run.unvisited_remaining(), 3);
}

#[tokio::test]
async fn test_oversized_page_skipped_without_error() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html("Home", r#"<a href="/big">Big</a><a href="/small">Small</a>"#),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(html("Big", &"x".repeat(4096)))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/small", html("Small", "tiny")).await;

    let mut config = test_config();
    config.crawler.max_response_bytes = 1024;
    let service = direct_service(config);
    let request = service.validate(&multipage(&server.uri(), 10)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    let titles: Vec<&str> = run.pages().iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "Small"]);
    assert_eq!(run.error_count(), 0);
    assert_eq!(run.visited_count(), 3);
}

#[tokio::test]
async fn test_links_flag_only_hides_links() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("Home", r#"<a href="/next">Next</a>"#)).await;
    mount_page(&server, "/next", html("Next", "")).await;

    let service = direct_service(test_config());
    let body = RequestBody {
        extract_links: Some(false),
        extract_images: Some(false),
        ..multipage(&server.uri(), 5)
    };
    let reply = service.handle(body).await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["summary"]["totalPages"], 2);
    assert_eq!(reply.body["summary"]["totalLinks"], 0);
    assert_eq!(reply.body["pages"][0]["links"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_detection_runs_on_sealed_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html(
            "Blog",
            r#"<link rel="stylesheet" href="/wp-content/themes/t/style.css">
               <script src="/js/jquery-3.7.1.min.js"></script>"#,
        ),
    )
    .await;

    let service = direct_service(test_config());
    let reply = service.handle(RequestBody::for_url(server.uri())).await;
    assert_eq!(reply.body["summary"]["cmsDetected"], "WordPress");
    assert_eq!(reply.body["summary"]["technologiesFound"], 1);
    assert_eq!(reply.body["extractedData"]["technologies"][0], "jQuery");

    let body = RequestBody {
        detect_technologies: Some(false),
        detect_cms: Some(false),
        ..RequestBody::for_url(server.uri())
    };
    let reply = service.handle(body).await;
    assert!(reply.body["summary"]["cmsDetected"].is_null());
    assert_eq!(reply.body["summary"]["technologiesFound"], 0);
}

#[tokio::test]
async fn test_native_engine_crawls_site() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("Home", r#"<a href="/a">A</a><a href="/b">B</a>"#)).await;
    mount_page(&server, "/a", html("A", r#"<a href="/">Home</a>"#)).await;
    mount_page(&server, "/b", html("B", r#"<a href="https://elsewhere.example/">X</a>"#)).await;

    let service = CrawlService::new(test_config()).unwrap();
    let request = service.validate(&multipage(&server.uri(), 10)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(run.strategy(), FetchStrategy::Native);
    assert!(!run.fell_back());
    assert_eq!(run.pages().len(), 3);
    assert_eq!(run.stop_reason(), StopReason::EngineExhausted);
}

#[tokio::test]
async fn test_native_error_budget_stops_run() {
    let server = MockServer::start().await;
    let links: String = (1..=8).map(|i| format!(r#"<a href="/bad{}">{}</a>"#, i, i)).collect();
    mount_page(&server, "/", html("Home", &links)).await;
    // 3 pages reach the error budget, each tried twice
    Mock::given(method("GET"))
        .and(path_regex("^/bad"))
        .respond_with(ResponseTemplate::new(500))
        .expect(6)
        .mount(&server)
        .await;

    let service = CrawlService::new(test_config()).unwrap();
    let request = service.validate(&multipage(&server.uri(), 10)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(run.strategy(), FetchStrategy::Native);
    assert!(!run.fell_back());
    assert_eq!(run.stop_reason(), StopReason::ErrorBudget);
    assert_eq!(run.error_count(), 3);
    assert_eq!(run.pages().len(), 1);
    assert_eq!(run.unvisited_remaining(), 5);
}

#[tokio::test]
async fn test_native_rate_limited_page_counts_one_error() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("Home", r#"<a href="/limited">Limited</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let service = CrawlService::new(test_config()).unwrap();
    let request = service.validate(&multipage(&server.uri(), 10)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(run.strategy(), FetchStrategy::Native);
    assert_eq!(run.pages().len(), 1);
    assert_eq!(run.error_count(), 1);
    assert_eq!(run.stop_reason(), StopReason::EngineExhausted);
}

#[tokio::test]
async fn test_native_respects_page_budget() {
    let server = MockServer::start().await;
    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", html("Home", &links)).await;
    for i in 1..=5 {
        Mock::given(method("GET"))
            .and(path(format!("/p{}", i)))
            .respond_with(html(&format!("Page {}", i), ""))
            .expect(if i <= 2 { 1 } else { 0 })
            .mount(&server)
            .await;
    }

    let service = CrawlService::new(test_config()).unwrap();
    let request = service.validate(&multipage(&server.uri(), 3)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(run.strategy(), FetchStrategy::Native);
    assert_eq!(run.pages().len(), 3);
    assert_eq!(run.stop_reason(), StopReason::PageBudget);
    assert_eq!(run.unvisited_remaining(), 3);
}

/// Site where /home redirects back to the seed
async fn mount_redirect_alias(server: &MockServer) {
    mount_page(
        server,
        "/",
        html("Home", r#"<a href="/home">Home</a><a href="/about">About</a>"#),
    )
    .await;
    mount_page(
        server,
        "/home",
        ResponseTemplate::new(301).insert_header("location", format!("{}/", server.uri()).as_str()),
    )
    .await;
    mount_page(server, "/about", html("About", "")).await;
}

#[tokio::test]
async fn test_redirect_alias_recorded_once() {
    let server = MockServer::start().await;
    mount_redirect_alias(&server).await;

    let service = direct_service(test_config());
    let request = service.validate(&multipage(&server.uri(), 2)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    let titles: Vec<&str> = run.pages().iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "About"]);
    assert_eq!(run.stop_reason(), StopReason::PageBudget);
    assert_eq!(run.error_count(), 0);
}

#[tokio::test]
async fn test_native_redirect_alias_recorded_once() {
    let server = MockServer::start().await;
    mount_redirect_alias(&server).await;

    let service = CrawlService::new(test_config()).unwrap();
    let request = service.validate(&multipage(&server.uri(), 2)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    let titles: Vec<&str> = run.pages().iter().map(|p| p.title.as_str()).collect();
    assert_eq!(run.strategy(), FetchStrategy::Native);
    assert_eq!(titles, vec!["Home", "About"]);
    assert_eq!(run.stop_reason(), StopReason::PageBudget);
}

/// Engine that reports one page and then gives up
struct FlakyEngine {
    page: FetchedPage,
    calls: Arc<AtomicUsize>,
}

impl NativeEngine for FlakyEngine {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn crawl(&self, _seed: &Url, _budget: usize) -> Result<EventStream, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let events = vec![
            Ok(EngineEvent::Page(self.page.clone())),
            Err(EngineError::Aborted("browser crashed".to_string())),
            Ok(EngineEvent::Page(self.page.clone())),
        ];
        Ok(stream::iter(events).boxed())
    }
}

#[tokio::test]
async fn test_engine_failure_falls_back_to_direct() {
    let server = MockServer::start().await;
    let seed = format!("{}/", server.uri());
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("Home", ""))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/a", html("A", "")).await;
    mount_page(&server, "/b", html("B", "")).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let engine = FlakyEngine {
        page: FetchedPage {
            url: seed.clone(),
            final_url: seed.clone(),
            status: 200,
            headers: Default::default(),
            body: r#"<title>Home</title><a href="/a">A</a><a href="/b">B</a>"#.to_string(),
        },
        calls: calls.clone(),
    };

    let service = CrawlService::with_engine(test_config(), Some(Arc::new(engine))).unwrap();
    let request = service.validate(&multipage(&seed, 10)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(run.strategy(), FetchStrategy::Direct);
    assert!(run.fell_back());
    let titles: Vec<&str> = run.pages().iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "A", "B"]);
    assert_eq!(run.stop_reason(), StopReason::FrontierExhausted);
}

/// Engine that cannot start at all
struct BrokenEngine;

impl NativeEngine for BrokenEngine {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn crawl(&self, _seed: &Url, _budget: usize) -> Result<EventStream, EngineError> {
        Err(EngineError::Setup("no browser available".to_string()))
    }
}

#[tokio::test]
async fn test_engine_setup_failure_falls_back_to_direct() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("Home", "")).await;

    let service = CrawlService::with_engine(test_config(), Some(Arc::new(BrokenEngine))).unwrap();
    let request = service.validate(&multipage(&server.uri(), 10)).unwrap();
    let run = service.crawl(&request).await.unwrap();

    assert!(run.fell_back());
    assert_eq!(run.pages().len(), 1);
}

#[tokio::test]
async fn test_concurrent_runs_share_gate() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html("Home", "").set_delay(Duration::from_millis(50)),
    )
    .await;

    let mut config = test_config();
    config.service.max_active_runs = 1;
    let service = direct_service(config);

    let (first, second) = tokio::join!(
        service.handle(RequestBody::for_url(server.uri())),
        service.handle(RequestBody::for_url(server.uri()))
    );

    assert_eq!(first.status, 200);
    assert_eq!(second.status, 200);
    assert_eq!(service.gate().active(), 0);
    assert_eq!(service.gate().waiting(), 0);
}
