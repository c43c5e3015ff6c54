use std::time::Duration;

use finch_hub::{Hub, Message};

/// Scenario: one subscriber drains at 1 Hz while the hub is fed at 60 Hz.
/// Over 10 simulated seconds it should receive exactly 10 messages, each
/// with a strictly larger frame number than the one before, and no
/// message should ever be silently duplicated.
#[tokio::test(start_paused = true)]
async fn slow_subscriber_sees_monotone_freshest_frames() {
    let hub = Hub::new();
    let (id, queue) = hub.register();

    let producer = tokio::spawn({
        let hub_ptr = std::sync::Arc::new(hub);
        let hub_ptr2 = hub_ptr.clone();
        async move {
            for frame_number in 0..600u64 {
                hub_ptr2.enqueue(id, Message::Text(frame_number.to_string()));
                tokio::time::sleep(Duration::from_millis(1000 / 60)).await;
            }
            hub_ptr
        }
    });

    let mut received = Vec::new();
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Ok(msg) = tokio::time::timeout(Duration::from_millis(1), queue.recv()).await {
            if let Message::Text(s) = msg {
                received.push(s.parse::<u64>().unwrap());
            }
        }
    }
    producer.await.unwrap();

    assert!((9..=11).contains(&received.len()), "got {received:?}");
    for pair in received.windows(2) {
        assert!(pair[1] > pair[0], "not monotone: {received:?}");
    }
}

#[tokio::test]
async fn one_subscribers_disconnect_does_not_touch_another() {
    let hub = Hub::new();
    let (doomed_id, doomed_queue) = hub.register();
    let (_survivor_id, survivor_queue) = hub.register();

    drop(doomed_queue);
    hub.unregister(doomed_id);

    hub.broadcast(|_id| Some(Message::Text("still alive".into())));

    assert_eq!(survivor_queue.len(), 1);
    if let Message::Text(s) = survivor_queue.recv().await {
        assert_eq!(s, "still alive");
    }
}
