use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use zonepad::pdf::{RenderConfig, RenderError, RenderResponse, RenderService};
use zonepad::test_utils::test_helpers::SlowBackend;

fn slow_service(
    delay_ms: u64,
    timeout_ms: u64,
    workers: usize,
) -> (RenderService, Arc<AtomicUsize>) {
    let backend = SlowBackend::new(Duration::from_millis(delay_ms), 3);
    let finished = Arc::clone(&backend.finished);
    let service = RenderService::open(
        Arc::new(backend),
        Arc::from(&b"ignored"[..]),
        RenderConfig {
            workers,
            cache_size: 4,
            prefetch_radius: 0,
            timeout: Duration::from_millis(timeout_ms),
        },
    )
    .unwrap();
    (service, finished)
}

fn poll_until(service: &mut RenderService, wait: Duration) -> Vec<RenderResponse> {
    let deadline = Instant::now() + wait;
    let mut delivered = Vec::new();
    while Instant::now() < deadline {
        delivered.extend(service.poll_responses());
        std::thread::sleep(Duration::from_millis(10));
    }
    delivered
}

#[test]
fn slow_render_times_out_and_late_result_is_discarded() {
    let (mut service, finished) = slow_service(300, 50, 1);

    let err = service.render(0, 1.0).unwrap_err();
    assert!(matches!(err, RenderError::Timeout { page: 0, .. }));

    // The worker still finishes, but nothing reaches the caller.
    let delivered = poll_until(&mut service, Duration::from_millis(600));
    assert!(finished.load(Ordering::SeqCst) >= 1);
    assert!(
        delivered
            .iter()
            .all(|r| !matches!(r, RenderResponse::Page { .. }))
    );
}

#[test]
fn late_result_still_warms_the_cache() {
    let (mut service, _) = slow_service(200, 50, 1);
    assert!(service.render(1, 1.0).is_err());

    let deadline = Instant::now() + Duration::from_secs(3);
    while !service.is_page_cached(1, 1.0) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(service.is_page_cached(1, 1.0));

    let page = service.render(1, 1.0).unwrap();
    assert!(page.viewport.matches(1, 1.0));
}

#[test]
fn only_newest_page_request_is_delivered_with_two_workers() {
    let (mut service, _) = slow_service(100, 5_000, 2);

    let first = service.request_page(0, 1.0);
    let second = service.request_page(2, 1.0);

    let delivered = poll_until(&mut service, Duration::from_millis(800));
    let ids: Vec<_> = delivered.iter().map(RenderResponse::id).collect();
    assert!(!ids.contains(&first));
    assert_eq!(ids, vec![second]);
}

#[test]
fn invalid_scale_is_reported_not_retried() {
    let (mut service, finished) = slow_service(0, 1_000, 1);
    let err = service.render(0, 0.0).unwrap_err();
    assert!(matches!(err, RenderError::Unknown { .. }));
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[test]
fn prefetch_warms_neighbours() {
    let backend = SlowBackend::new(Duration::ZERO, 3);
    let mut service = RenderService::open(
        Arc::new(backend),
        Arc::from(&b"ignored"[..]),
        RenderConfig {
            prefetch_radius: 1,
            ..RenderConfig::default()
        },
    )
    .unwrap();

    service.render(1, 1.0).unwrap();
    service.schedule_prefetch(1, 1.0);

    let deadline = Instant::now() + Duration::from_secs(3);
    while !(service.is_page_cached(0, 1.0) && service.is_page_cached(2, 1.0))
        && Instant::now() < deadline
    {
        let _ = service.poll_responses();
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(service.is_page_cached(0, 1.0));
    assert!(service.is_page_cached(2, 1.0));
    // Prefetch completions are never handed to the caller.
    assert!(service.poll_responses().is_empty());
}
