//! Tests for provider routing, fallback and usage accounting
//!
//! The adapters here are scripted doubles that still run every upstream call
//! through a real `Resilience`, so breaker and retry behavior is exercised
//! end to end. Time is paused; backoff sleeps and cooldowns advance instantly.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::protocol::{GenerationResult, Message, ProviderId, ToolDefinition};
use switchboard_core::providers::{
    CircuitSnapshot, Credentials, ModelParameters, ProviderAdapter, ProviderError,
    ProviderResult, Resilience, ResiliencePolicy,
};
use switchboard_core::router::{Router, RouterConfig, RouterError};

#[derive(Debug, Clone, Copy)]
enum Step {
    Succeed,
    Fail,
    Hang,
}

#[derive(Debug, Clone, Copy)]
enum Health {
    Up,
    Down,
    Panics,
    Hangs,
}

struct MockAdapter {
    name: String,
    initialized: bool,
    script: Mutex<VecDeque<Step>>,
    otherwise: Step,
    health: Health,
    upstream_calls: AtomicUsize,
    resilience: Resilience,
}

impl MockAdapter {
    fn new(name: &str, otherwise: Step) -> Self {
        Self {
            name: name.to_string(),
            initialized: true,
            script: Mutex::new(VecDeque::new()),
            otherwise,
            health: Health::Up,
            upstream_calls: AtomicUsize::new(0),
            resilience: Resilience::new(name, single_attempt()),
        }
    }

    fn succeeding(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Step::Succeed))
    }

    fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Step::Fail))
    }

    fn uninitialized(name: &str) -> Arc<Self> {
        Arc::new(Self {
            initialized: false,
            ..Self::new(name, Step::Succeed)
        })
    }

    fn scripted(name: &str, steps: &[Step], otherwise: Step, policy: ResiliencePolicy) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.iter().copied().collect()),
            resilience: Resilience::new(name, policy),
            ..Self::new(name, otherwise)
        })
    }

    fn with_health(name: &str, health: Health) -> Arc<Self> {
        Arc::new(Self {
            health,
            ..Self::new(name, Step::Succeed)
        })
    }

    fn calls(&self) -> usize {
        self.upstream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, credentials: Credentials, _parameters: ModelParameters) {
        self.initialized = !credentials.api_key.is_empty();
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn generate_response(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
        _system_prompt: Option<&str>,
    ) -> ProviderResult<GenerationResult> {
        if !self.initialized {
            return Err(ProviderError::NotInitialized(self.name.clone()));
        }

        let (calls, script, otherwise, name) =
            (&self.upstream_calls, &self.script, self.otherwise, self.name.as_str());

        self.resilience
            .call(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let step = script.lock().pop_front().unwrap_or(otherwise);
                match step {
                    Step::Succeed => Ok(GenerationResult::text(format!("reply from {}", name))),
                    Step::Fail => Err(ProviderError::Http {
                        status: 503,
                        message: format!("{} unavailable", name),
                    }),
                    Step::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(GenerationResult::text("too late"))
                    }
                }
            })
            .await
    }

    async fn is_healthy(&self) -> bool {
        match self.health {
            Health::Up => true,
            Health::Down => false,
            Health::Panics => panic!("probe for {} blew up", self.name),
            Health::Hangs => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                true
            }
        }
    }

    fn circuit_snapshot(&self) -> Option<CircuitSnapshot> {
        Some(self.resilience.snapshot())
    }
}

fn single_attempt() -> ResiliencePolicy {
    ResiliencePolicy {
        max_attempts: 1,
        ..Default::default()
    }
}

fn ids(names: &[&str]) -> Vec<ProviderId> {
    names.iter().map(|n| ProviderId::from(*n)).collect()
}

fn hello() -> Vec<Message> {
    vec![Message::user("Hello")]
}

fn router_with(primary: &str, fallbacks: &[&str], auto_fallback: bool) -> Router {
    Router::new(
        RouterConfig::new(primary)
            .with_fallbacks(fallbacks.iter().copied())
            .with_auto_fallback(auto_fallback),
    )
}

fn failures(router: &Router, id: &str) -> Option<u32> {
    router
        .list_providers()
        .into_iter()
        .find(|p| p.id.as_str() == id)
        .and_then(|p| p.consecutive_failures)
}

#[tokio::test(start_paused = true)]
async fn test_preferred_success_is_tagged() {
    let a = MockAdapter::succeeding("a");
    let b = MockAdapter::succeeding("b");
    let router = router_with("a", &["b"], true);
    router.register_provider("a", a.clone());
    router.register_provider("b", b.clone());

    let result = router.generate_response(&hello(), None, None).await.unwrap();

    assert_eq!(result.provider, Some(ProviderId::from("a")));
    assert_eq!(result.content, "reply from a");
    assert_eq!(b.calls(), 0);

    let stats = router.get_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.fallbacks_triggered, 0);
    assert_eq!(stats.requests_by_provider.get("a"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_fallback_increments_counter_exactly_once() {
    let a = MockAdapter::failing("a");
    let b = MockAdapter::succeeding("b");
    let router = router_with("a", &["b"], true);
    router.register_provider("a", a.clone());
    router.register_provider("b", b.clone());

    let result = router.generate_response(&hello(), None, None).await.unwrap();

    assert_eq!(result.provider, Some(ProviderId::from("b")));
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);

    let stats = router.get_stats();
    assert_eq!(stats.fallbacks_triggered, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.requests_by_provider.get("b"), Some(&1));
    assert_eq!(stats.requests_by_provider.get("a"), None);
    // A fallback does not change the preferred provider.
    assert_eq!(router.current_provider().as_str(), "a");
}

#[tokio::test(start_paused = true)]
async fn test_auto_fallback_disabled_never_invokes_fallbacks() {
    let a = MockAdapter::failing("a");
    let b = MockAdapter::succeeding("b");
    let router = router_with("a", &["b"], false);
    router.register_provider("a", a.clone());
    router.register_provider("b", b.clone());

    let err = router.generate_response(&hello(), None, None).await.unwrap_err();

    match err {
        RouterError::AllProvidersFailed {
            attempted,
            last_error,
        } => {
            assert_eq!(attempted, ids(&["a"]));
            assert!(matches!(last_error, Some(ProviderError::Http { status: 503, .. })));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(b.calls(), 0);
    assert_eq!(router.get_stats().errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_short_circuits_without_upstream_call() {
    let a = MockAdapter::failing("a");
    let router = router_with("a", &[], false);
    router.register_provider("a", a.clone());

    for _ in 0..3 {
        assert!(router.generate_response(&hello(), None, None).await.is_err());
    }
    assert_eq!(a.calls(), 3);

    let err = router.generate_response(&hello(), None, None).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::AllProvidersFailed {
            last_error: Some(ProviderError::CircuitOpen { .. }),
            ..
        }
    ));
    assert_eq!(a.calls(), 3, "open circuit must not reach the upstream");

    let info = &router.list_providers()[0];
    assert_eq!(info.circuit_open, Some(true));
    assert_eq!(info.consecutive_failures, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_circuit_closes_after_cooldown() {
    let a = MockAdapter::scripted(
        "a",
        &[Step::Fail, Step::Fail, Step::Fail],
        Step::Succeed,
        single_attempt(),
    );
    let router = router_with("a", &[], false);
    router.register_provider("a", a.clone());

    for _ in 0..3 {
        let _ = router.generate_response(&hello(), None, None).await;
    }
    assert!(router.generate_response(&hello(), None, None).await.is_err());
    assert_eq!(a.calls(), 3);

    tokio::time::advance(Duration::from_secs(60)).await;

    let result = router.generate_response(&hello(), None, None).await.unwrap();
    assert_eq!(result.content, "reply from a");
    assert_eq!(failures(&router, "a"), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_failure_count() {
    let a = MockAdapter::scripted("a", &[Step::Fail, Step::Fail], Step::Succeed, single_attempt());
    let router = router_with("a", &[], false);
    router.register_provider("a", a.clone());

    let _ = router.generate_response(&hello(), None, None).await;
    let _ = router.generate_response(&hello(), None, None).await;
    assert_eq!(failures(&router, "a"), Some(2));

    router.generate_response(&hello(), None, None).await.unwrap();
    assert_eq!(failures(&router, "a"), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_retries_within_one_call_count_as_one_success() {
    let a = MockAdapter::scripted(
        "a",
        &[Step::Fail, Step::Fail],
        Step::Succeed,
        ResiliencePolicy::default(),
    );
    let router = router_with("a", &[], false);
    router.register_provider("a", a.clone());

    let started = tokio::time::Instant::now();
    let result = router.generate_response(&hello(), None, None).await.unwrap();

    assert_eq!(result.provider, Some(ProviderId::from("a")));
    assert_eq!(a.calls(), 3);
    // 1s after the first failure, 2s after the second.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    assert_eq!(failures(&router, "a"), Some(0));
    assert_eq!(router.get_stats().requests_by_provider.get("a"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_primary_exhausting_retries_falls_back() {
    let a = MockAdapter::scripted("a", &[], Step::Fail, ResiliencePolicy::default());
    let b = MockAdapter::succeeding("b");
    let router = router_with("a", &["b"], true);
    router.register_provider("a", a.clone());
    router.register_provider("b", b.clone());

    let result = router.generate_response(&hello(), None, None).await.unwrap();

    assert_eq!(result.provider, Some(ProviderId::from("b")));
    assert_eq!(a.calls(), 3);
    assert_eq!(failures(&router, "a"), Some(1));

    let stats = router.get_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.fallbacks_triggered, 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_provider_exhausts_retries() {
    let a = MockAdapter::scripted("a", &[], Step::Fail, ResiliencePolicy::default());
    let router = router_with("a", &["b"], false);
    router.register_provider("a", a.clone());

    let err = router.generate_response(&hello(), None, None).await.unwrap_err();

    match err {
        RouterError::AllProvidersFailed {
            attempted,
            last_error,
        } => {
            assert_eq!(attempted, ids(&["a"]));
            assert!(matches!(last_error, Some(ProviderError::Http { .. })));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(a.calls(), 3);
    assert_eq!(failures(&router, "a"), Some(1));

    let stats = router.get_stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.total_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unregistered_and_uninitialized_candidates_are_skipped() {
    let c = MockAdapter::uninitialized("c");
    let b = MockAdapter::succeeding("b");
    let router = router_with("missing", &["c", "b"], true);
    router.register_provider("c", c.clone());
    router.register_provider("b", b.clone());

    let result = router.generate_response(&hello(), None, None).await.unwrap();

    assert_eq!(result.provider, Some(ProviderId::from("b")));
    assert_eq!(c.calls(), 0);
    assert_eq!(router.get_stats().fallbacks_triggered, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_usable_provider_reports_empty_attempts() {
    let router = router_with("a", &["b"], true);
    router.register_provider("a", MockAdapter::uninitialized("a"));

    let err = router.generate_response(&hello(), None, None).await.unwrap_err();

    assert!(matches!(
        &err,
        RouterError::AllProvidersFailed { attempted, last_error: None } if attempted.is_empty()
    ));
    assert_eq!(err.to_string(), "All providers failed (attempted: none)");

    let stats = router.get_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout_bounds_the_whole_call() {
    let a = MockAdapter::scripted("a", &[], Step::Hang, single_attempt());
    let router = Router::new(
        RouterConfig::new("a").with_request_timeout(Duration::from_secs(5)),
    );
    router.register_provider("a", a.clone());

    let err = router.generate_response(&hello(), None, None).await.unwrap_err();

    match err {
        RouterError::AllProvidersFailed {
            attempted,
            last_error,
        } => {
            assert_eq!(attempted, ids(&["a"]));
            assert!(matches!(last_error, Some(ProviderError::Timeout(d)) if d == Duration::from_secs(5)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(router.get_stats().errors, 1);
    // The abandoned call recorded nothing on the breaker.
    assert_eq!(failures(&router, "a"), Some(0));
}

#[tokio::test]
async fn test_set_provider_validates_target() {
    let router = router_with("a", &[], true);
    router.register_provider("a", MockAdapter::succeeding("a"));
    router.register_provider("b", MockAdapter::succeeding("b"));
    router.register_provider("c", MockAdapter::uninitialized("c"));

    assert!(matches!(
        router.set_provider("zzz"),
        Err(RouterError::UnknownProvider(id)) if id.as_str() == "zzz"
    ));
    assert!(matches!(
        router.set_provider("c"),
        Err(RouterError::ProviderNotReady(id)) if id.as_str() == "c"
    ));
    assert_eq!(router.current_provider().as_str(), "a");

    router.set_provider("b").unwrap();
    assert_eq!(router.current_provider().as_str(), "b");

    let result = router.generate_response(&hello(), None, None).await.unwrap();
    assert_eq!(result.provider, Some(ProviderId::from("b")));
    assert_eq!(router.get_stats().fallbacks_triggered, 0);
}

#[tokio::test]
async fn test_register_provider_replaces_existing_entry() {
    let router = router_with("a", &[], false);
    router.register_provider("a", MockAdapter::failing("first"));
    let replacement = MockAdapter::succeeding("second");
    router.register_provider("a", replacement.clone());

    let result = router.generate_response(&hello(), None, None).await.unwrap();
    assert_eq!(result.content, "reply from second");
    assert_eq!(router.list_providers().len(), 1);
    assert_eq!(router.list_providers()[0].display_name, "second");
}

#[tokio::test(start_paused = true)]
async fn test_health_sweep_isolates_bad_probes() {
    let router = Router::new(
        RouterConfig::new("up").with_health_check_timeout(Duration::from_secs(2)),
    );
    router.register_provider("up", MockAdapter::with_health("up", Health::Up));
    router.register_provider("down", MockAdapter::with_health("down", Health::Down));
    router.register_provider("panics", MockAdapter::with_health("panics", Health::Panics));
    router.register_provider("hangs", MockAdapter::with_health("hangs", Health::Hangs));

    let health = router.check_health().await;

    assert_eq!(health.len(), 4);
    assert_eq!(health.get("up"), Some(&true));
    assert_eq!(health.get("down"), Some(&false));
    assert_eq!(health.get("panics"), Some(&false));
    assert_eq!(health.get("hangs"), Some(&false));

    // Health results never reorder routing.
    let result = router.generate_response(&hello(), None, None).await.unwrap();
    assert_eq!(result.provider, Some(ProviderId::from("up")));
}

#[tokio::test]
async fn test_reads_are_idempotent() {
    let router = router_with("b", &["a"], true);
    router.register_provider("b", MockAdapter::succeeding("b"));
    router.register_provider("a", MockAdapter::uninitialized("a"));
    router.generate_response(&hello(), None, None).await.unwrap();

    let first = (router.get_stats(), router.list_providers());
    let second = (router.get_stats(), router.list_providers());
    assert_eq!(first, second);

    let listed: Vec<_> = first.1.iter().map(|p| p.id.clone()).collect();
    assert_eq!(listed, ids(&["a", "b"]));
    assert_eq!(first.0.available_providers, ids(&["b"]));
    assert_eq!(first.0.current_provider.as_str(), "b");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_counted_independently() {
    let a = MockAdapter::failing("a");
    let b = MockAdapter::succeeding("b");
    let router = router_with("a", &["b"], true);
    router.register_provider("a", a.clone());
    router.register_provider("b", b.clone());

    let messages = hello();
    let (r1, r2) = tokio::join!(
        router.generate_response(&messages, None, None),
        router.generate_response(&messages, None, None),
    );

    assert!(r1.is_ok() && r2.is_ok());
    let stats = router.get_stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.fallbacks_triggered, 2);
    assert_eq!(stats.requests_by_provider.get("b"), Some(&2));
}
