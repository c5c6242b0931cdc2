//! End-to-end delivery from the agent client to an in-process collector.

use agent::accumulator::{Accumulator, GroupReading, RawSample, POLL_COUNT, SYSTEM_GROUP};
use agent::DeliveryClient;
use collector::{create_router, AppState};
use shared::codec::Signer;
use shared::models::Metric;
use std::time::Duration;
use tokio::net::TcpListener;

const KEY: &str = "agent-collector-secret";

async fn spawn_collector(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_signed_gzip_batch_is_stored() {
    let state = AppState::with_in_memory_store().with_signer(Signer::new(KEY).unwrap());
    let url = spawn_collector(state.clone()).await;

    let client = DeliveryClient::new(&url, Duration::from_secs(2))
        .unwrap()
        .with_gzip(true)
        .with_signer(Signer::new(KEY).unwrap());
    client
        .send(&[
            Metric::counter(POLL_COUNT, 4),
            Metric::gauge("Alloc", 512.5),
            Metric::counter(POLL_COUNT, 1),
        ])
        .await
        .unwrap();

    assert_eq!(
        state.store().get(POLL_COUNT).await.unwrap(),
        Some(Metric::counter(POLL_COUNT, 5))
    );
    assert_eq!(
        state.store().get("Alloc").await.unwrap(),
        Some(Metric::gauge("Alloc", 512.5))
    );
}

#[tokio::test]
async fn test_wrong_key_is_rejected_by_collector() {
    let state = AppState::with_in_memory_store().with_signer(Signer::new(KEY).unwrap());
    let url = spawn_collector(state.clone()).await;

    let client = DeliveryClient::new(&url, Duration::from_secs(2))
        .unwrap()
        .with_signer(Signer::new("someone-else").unwrap());
    let err = client.send(&[Metric::gauge("Alloc", 1.0)]).await.unwrap_err();

    assert!(matches!(
        err,
        agent::DeliveryError::Status { status, .. } if status.as_u16() == 400
    ));
    assert!(state.store().get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reported_counters_accumulate_across_reports() {
    let state = AppState::with_in_memory_store();
    let url = spawn_collector(state.clone()).await;
    let client = DeliveryClient::new(&url, Duration::from_secs(2))
        .unwrap()
        .with_gzip(true);
    let accumulator = Accumulator::new();

    for _ in 0..2 {
        for _ in 0..3 {
            accumulator
                .record_poll(vec![GroupReading::new(
                    SYSTEM_GROUP,
                    vec![("FreeMemory".to_string(), RawSample::Unsigned(2048))],
                )])
                .unwrap();
        }
        for batch in accumulator.drain_report(0.5).unwrap() {
            client.send(&batch.metrics).await.unwrap();
        }
    }

    assert_eq!(
        state.store().get(POLL_COUNT).await.unwrap(),
        Some(Metric::counter(POLL_COUNT, 6))
    );
    assert_eq!(
        state.store().get("FreeMemory").await.unwrap(),
        Some(Metric::gauge("FreeMemory", 2048.0))
    );
}
