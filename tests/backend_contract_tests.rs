//! Behaviour every backend must share, run against each one.

mod common;

use std::time::Duration;

use dblock::{
    Claim, Context, ExponentialBackoff, LimitRetry, LockBackend, LockClient, LockError,
    MemoryBackend, ObtainOptions,
};

use common::{kv_backend, sqlite_backend};

async fn obtain_reports_token_and_ttl<B: LockBackend>(backend: B) {
    let client = LockClient::new(backend);
    let ctx = Context::background();

    let lock = client
        .obtain(&ctx, "k1", Duration::from_millis(100), ObtainOptions::new())
        .await
        .unwrap();
    assert!(!lock.token().is_empty());
    assert_eq!(lock.key(), "k1");

    let ttl = lock.ttl(&ctx).await.unwrap();
    assert!(ttl > Duration::ZERO, "ttl {:?}", ttl);
    assert!(ttl <= Duration::from_millis(100), "ttl {:?}", ttl);
}

async fn second_caller_is_not_obtained<B: LockBackend>(backend: B) {
    let client = LockClient::new(backend);
    let ctx = Context::background();

    let _first = client
        .obtain(&ctx, "k1", Duration::from_secs(5), ObtainOptions::new())
        .await
        .unwrap();
    let err = client
        .obtain(&ctx, "k1", Duration::from_secs(5), ObtainOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::NotObtained), "{err}");
}

async fn released_lock_has_zero_ttl<B: LockBackend>(backend: B) {
    let client = LockClient::new(backend);
    let ctx = Context::background();

    let lock = client
        .obtain(&ctx, "k", Duration::from_secs(5), ObtainOptions::new())
        .await
        .unwrap();
    lock.release(&ctx).await.unwrap();
    assert_eq!(lock.ttl(&ctx).await.unwrap(), Duration::ZERO);

    // The key is free again.
    client
        .obtain(&ctx, "k", Duration::from_secs(5), ObtainOptions::new())
        .await
        .unwrap();
}

async fn stranger_cannot_touch_lock<B: LockBackend>(backend: B) {
    let ctx = Context::background();
    let owner = Claim::new("k", "owner-token-000000000", "meta");
    let stranger = Claim::new("k", "other-token-000000000", "meta");

    // Nothing stored yet.
    assert!(!backend.refresh(&ctx, &stranger, Duration::from_secs(5)).await.unwrap());
    assert!(!backend.release(&ctx, &stranger).await.unwrap());
    assert_eq!(backend.query(&ctx, &stranger).await.unwrap(), None);

    assert!(backend.obtain(&ctx, &owner, Duration::from_secs(5)).await.unwrap());
    assert!(!backend.refresh(&ctx, &stranger, Duration::from_secs(60)).await.unwrap());
    assert!(!backend.release(&ctx, &stranger).await.unwrap());
    assert_eq!(backend.query(&ctx, &stranger).await.unwrap(), None);

    // The owner's record is unchanged.
    let ttl = backend.query(&ctx, &owner).await.unwrap().unwrap();
    assert!(ttl > Duration::ZERO && ttl <= Duration::from_secs(5), "ttl {:?}", ttl);
}

async fn metadata_round_trips<B: LockBackend>(backend: B) {
    let client = LockClient::new(backend);
    let ctx = Context::background();

    let cases = vec![
        String::new(),
        "worker-1".to_string(),
        r#"tok|en:'"%_\"#.to_string(),
        "ключ 🔒".to_string(),
        "a".repeat(512),
        "m".repeat(2000),
    ];
    for (i, meta) in cases.iter().enumerate() {
        let key = format!("meta-{i}");
        let lock = client
            .obtain(&ctx, &key, Duration::from_secs(5), ObtainOptions::new().with_metadata(meta.as_str()))
            .await
            .unwrap();
        assert_eq!(lock.metadata(), meta);
        assert!(lock.ttl(&ctx).await.unwrap() > Duration::ZERO, "meta {:?}", meta);
        lock.release(&ctx).await.unwrap();
    }
}

async fn refresh_extends_lease<B: LockBackend>(backend: B) {
    let client = LockClient::new(backend);
    let ctx = Context::background();

    let lock = client
        .obtain(&ctx, "k", Duration::from_millis(200), ObtainOptions::new())
        .await
        .unwrap();
    lock.refresh(&ctx, Duration::from_secs(30)).await.unwrap();
    assert!(lock.ttl(&ctx).await.unwrap() > Duration::from_secs(20));
}

async fn deadline_bounds_waiting<B: LockBackend>(backend: B) {
    let client = LockClient::new(backend);
    let ctx = Context::background();

    let _held = client
        .obtain(&ctx, "k", Duration::from_secs(30), ObtainOptions::new())
        .await
        .unwrap();

    let start = std::time::Instant::now();
    let options = ObtainOptions::new().with_retry_strategy(LimitRetry::new(
        ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(40)),
        1000,
    ));
    let err = client
        .obtain(&ctx, "k", Duration::from_millis(150), options)
        .await
        .unwrap_err();
    assert!(err.is_cancellation(), "{err}");
    assert!(start.elapsed() < Duration::from_secs(1), "{:?}", start.elapsed());
}

async fn cancellation_aborts_waiting<B: LockBackend>(backend: B) {
    let client = LockClient::new(backend);
    let _held = client
        .obtain(&Context::background(), "k", Duration::from_secs(30), ObtainOptions::new())
        .await
        .unwrap();

    let (ctx, cancel) = Context::background().with_cancel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
    });

    let options = ObtainOptions::new()
        .with_retry_strategy(dblock::LinearBackoff::new(Duration::from_millis(10)));
    let err = client
        .obtain(&ctx, "k", Duration::from_secs(10), options)
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Cancelled), "{err}");
}

macro_rules! backend_contract {
    ($name:ident, $backend:expr) => {
        mod $name {
            use super::*;

            #[tokio::test]
            async fn test_obtain_reports_token_and_ttl() {
                obtain_reports_token_and_ttl($backend).await;
            }

            #[tokio::test]
            async fn test_second_caller_is_not_obtained() {
                second_caller_is_not_obtained($backend).await;
            }

            #[tokio::test]
            async fn test_released_lock_has_zero_ttl() {
                released_lock_has_zero_ttl($backend).await;
            }

            #[tokio::test]
            async fn test_stranger_cannot_touch_lock() {
                stranger_cannot_touch_lock($backend).await;
            }

            #[tokio::test]
            async fn test_metadata_round_trips() {
                metadata_round_trips($backend).await;
            }

            #[tokio::test]
            async fn test_refresh_extends_lease() {
                refresh_extends_lease($backend).await;
            }

            #[tokio::test]
            async fn test_deadline_bounds_waiting() {
                deadline_bounds_waiting($backend).await;
            }

            #[tokio::test]
            async fn test_cancellation_aborts_waiting() {
                cancellation_aborts_waiting($backend).await;
            }
        }
    };
}

backend_contract!(memory, MemoryBackend::new());
backend_contract!(redis_script, kv_backend());
backend_contract!(sqlite, sqlite_backend().await);
