// tests/stream_behaviour.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use scriptcast::errors::ScriptcastError;
use scriptcast::stream::{Publisher, Stream};
use scriptcast_test_utils::recorder::{Event, Recorder};
use scriptcast_test_utils::{TEST_TIMEOUT, init_tracing, wait_until};

fn text_publisher() -> (Publisher<String>, Stream<String>) {
    let publisher = Publisher::new();
    let stream = publisher.stream();
    (publisher, stream)
}

#[test]
fn subscribers_see_values_in_order_then_close() {
    init_tracing();
    let publisher = Publisher::<i32>::new();
    let first = Recorder::attach(&publisher.stream());
    let second = Recorder::attach(&publisher.stream());

    for v in 1..=3 {
        publisher.push(v).unwrap();
    }
    publisher.close();

    let expected = vec![Event::Next(1), Event::Next(2), Event::Next(3), Event::Close];
    assert_eq!(first.events(), expected);
    assert_eq!(second.events(), expected);
}

#[test]
fn push_after_close_is_rejected() {
    let publisher = Publisher::<i32>::new();
    publisher.close();

    assert!(matches!(publisher.push(1), Err(ScriptcastError::StreamClosed)));
    assert!(publisher.is_closed());
}

#[test]
fn close_is_idempotent() {
    let publisher = Publisher::<i32>::new();
    let recorder = Recorder::attach(&publisher.stream());

    publisher.close();
    publisher.close();

    assert_eq!(recorder.close_count(), 1);
}

#[test]
fn late_subscriber_of_plain_stream_only_gets_close() {
    let (publisher, stream) = text_publisher();
    publisher.push("early".to_string()).unwrap();
    publisher.close();

    let late = Recorder::attach(&stream);
    assert_eq!(late.events(), vec![Event::Close]);
}

#[test]
fn late_subscriber_of_replay_stream_gets_full_history() {
    let publisher = Publisher::<i32>::replaying();
    let stream = publisher.stream();
    publisher.push(1).unwrap();
    publisher.push(2).unwrap();
    publisher.close();

    let late = Recorder::attach(&stream);
    assert_eq!(
        late.events(),
        vec![Event::Next(1), Event::Next(2), Event::Close]
    );
}

#[test]
fn replay_view_keeps_history_of_upstream() {
    let (publisher, stream) = text_publisher();
    let replay = stream.replay();

    publisher.push("a".to_string()).unwrap();
    publisher.push("b".to_string()).unwrap();

    let mid = Recorder::attach(&replay);
    publisher.push("c".to_string()).unwrap();
    publisher.close();

    assert_eq!(mid.values(), vec!["a", "b", "c"]);
    assert!(mid.is_closed());
    assert!(replay.is_replaying());
}

#[test]
fn failing_observer_does_not_affect_others() {
    init_tracing();
    let publisher = Publisher::<i32>::new();
    let stream = publisher.stream();

    stream.subscribe_fn(|_: &i32| Err(anyhow::anyhow!("observer failed")), || Ok(()));
    stream.subscribe_fn(
        |v: &i32| -> anyhow::Result<()> {
            if *v == 2 {
                panic!("observer bug");
            }
            Ok(())
        },
        || Ok(()),
    );
    let healthy = Recorder::attach(&stream);

    for v in 1..=3 {
        publisher.push(v).unwrap();
    }
    publisher.close();

    assert_eq!(healthy.values(), vec![1, 2, 3]);
    assert!(healthy.is_closed());
}

#[test]
fn map_transforms_and_propagates_close() {
    let publisher = Publisher::<i32>::new();
    let doubled = publisher.stream().map(|v: &i32| v * 2);
    let recorder = Recorder::attach(&doubled);

    publisher.push(1).unwrap();
    publisher.push(5).unwrap();
    publisher.close();

    assert_eq!(recorder.events(), vec![Event::Next(2), Event::Next(10), Event::Close]);
    assert!(doubled.is_closed());
}

#[test]
fn time_buffer_flushes_pending_values_before_close() {
    let (publisher, stream) = text_publisher();
    let buffered = stream.time_buffered(Duration::from_millis(100));
    let recorder = Recorder::attach(&buffered);

    for chunk in ["a", "b", "c"] {
        publisher.push(chunk.to_string()).unwrap();
    }
    publisher.close();

    let events = recorder.events();
    assert_eq!(events.last(), Some(&Event::Close));
    assert_eq!(recorder.text(), "abc");
}

#[test]
fn time_buffer_merges_values_of_one_window() {
    let (publisher, stream) = text_publisher();
    let buffered = stream.time_buffered(Duration::from_millis(200));
    let recorder = Recorder::attach(&buffered);

    for chunk in ["x", "y", "z"] {
        publisher.push(chunk.to_string()).unwrap();
    }

    assert!(wait_until(TEST_TIMEOUT, || recorder.text() == "xyz"));
    assert!(recorder.values().len() < 3);
    assert!(!recorder.is_closed());

    publisher.close();
    assert!(recorder.is_closed());
}

#[test]
fn time_buffer_with_custom_aggregate() {
    let publisher = Publisher::<i32>::new();
    let sums = publisher
        .stream()
        .time_buffered_with(Duration::from_secs(60), |batch: Vec<i32>| batch.iter().sum());
    let recorder = Recorder::attach(&sums);

    for v in [1, 2, 3, 4] {
        publisher.push(v).unwrap();
    }
    publisher.close();

    assert_eq!(recorder.events(), vec![Event::Next(10), Event::Close]);
}

#[test]
fn dispose_drops_history_for_later_subscribers() {
    let publisher = Publisher::<i32>::replaying();
    let stream = publisher.stream();
    let attached = Recorder::attach(&stream);

    publisher.push(1).unwrap();
    stream.dispose();

    let after_dispose = Recorder::attach(&stream);
    publisher.push(2).unwrap();
    publisher.close();

    assert_eq!(attached.values(), vec![1, 2]);
    assert_eq!(after_dispose.values(), vec![2]);
    assert!(after_dispose.is_closed());
}

#[test]
fn wait_close_times_out_on_open_stream() {
    let (_publisher, stream) = text_publisher();

    let result = stream.wait_close(Some(Duration::from_millis(50)));
    assert!(matches!(result, Err(ScriptcastError::StreamTimeout(_))));
}

#[test]
fn wait_close_returns_once_closed_from_another_thread() {
    let (publisher, stream) = text_publisher();

    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        publisher.close();
    });

    stream.wait_close(Some(TEST_TIMEOUT)).unwrap();
    closer.join().unwrap();
    assert!(stream.is_closed());
}

#[test]
fn drain_until_closed_collects_everything() {
    let publisher = Publisher::<i32>::replaying();
    let stream = publisher.stream();
    publisher.push(1).unwrap();

    let writer = thread::spawn(move || {
        for v in 2..=5 {
            publisher.push(v).unwrap();
        }
        publisher.close();
    });

    let values = stream.drain_until_closed(Some(TEST_TIMEOUT)).unwrap();
    writer.join().unwrap();
    assert_eq!(values, vec![1, 2, 3, 4, 5]);
}

#[test]
fn subscribe_while_pushing_on_another_thread() {
    let publisher = Publisher::<usize>::new();
    let stream = publisher.stream();
    let pushed = Arc::new(AtomicUsize::new(0));

    let writer = {
        let pushed = Arc::clone(&pushed);
        thread::spawn(move || {
            for v in 0..2000 {
                publisher.push(v).unwrap();
                pushed.fetch_add(1, Ordering::SeqCst);
            }
            publisher.close();
        })
    };

    let recorders: Vec<Recorder<usize>> = (0..8)
        .map(|_| {
            thread::sleep(Duration::from_millis(1));
            Recorder::attach(&stream)
        })
        .collect();

    writer.join().unwrap();
    assert_eq!(pushed.load(Ordering::SeqCst), 2000);

    for recorder in recorders.iter() {
        let values = recorder.values();
        assert!(values.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(recorder.close_count(), 1);
    }
}

#[test]
fn observer_can_push_into_its_own_stream() {
    init_tracing();
    let publisher = Publisher::<i32>::new();
    let recorder = Recorder::attach(&publisher.stream());

    let echo = publisher.clone();
    publisher.stream().subscribe_fn(
        move |value: &i32| {
            if *value == 1 {
                echo.push(2)?;
            }
            Ok(())
        },
        || Ok(()),
    );

    publisher.push(1).unwrap();
    publisher.push(3).unwrap();
    publisher.close();

    assert_eq!(
        recorder.events(),
        vec![Event::Next(1), Event::Next(2), Event::Next(3), Event::Close]
    );
}

#[test]
fn observer_can_close_its_own_stream() {
    init_tracing();
    let publisher = Publisher::<i32>::new();

    let closer = publisher.clone();
    publisher.stream().subscribe_fn(
        move |_: &i32| {
            closer.close();
            Ok(())
        },
        || Ok(()),
    );
    // Attached after the closing observer, still sees the value first.
    let recorder = Recorder::attach(&publisher.stream());

    publisher.push(1).unwrap();

    assert!(publisher.is_closed());
    assert!(matches!(publisher.push(2), Err(ScriptcastError::StreamClosed)));
    assert_eq!(recorder.events(), vec![Event::Next(1), Event::Close]);
}

#[test]
fn observer_pushing_during_close_is_rejected() {
    init_tracing();
    let publisher = Publisher::<i32>::new();
    let rejected = Arc::new(AtomicUsize::new(0));

    let late = publisher.clone();
    let counter = Arc::clone(&rejected);
    publisher.stream().subscribe_fn(
        |_: &i32| Ok(()),
        move || {
            if late.push(9).is_err() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        },
    );

    publisher.close();

    assert_eq!(rejected.load(Ordering::SeqCst), 1);
    publisher.stream().wait_close(Some(TEST_TIMEOUT)).unwrap();
}
