// tests/property/main.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use scriptcast::exec::args::build_args;
use scriptcast::exec::masking::{SECURE_MASK, SecretMasker};
use scriptcast::exec::stdin::StdinTrigger;
use scriptcast::process::decode::{Utf8Decoder, normalize_newlines};
use scriptcast::stream::{Observer, Publisher};
use scriptcast::types::{MultiValueMode, ParameterValue};
use scriptcast_test_utils::builders::ParameterBuilder;
use scriptcast_test_utils::recorder::{Event, Recorder};

/// Cut `bytes` at the given (sorted, deduplicated) positions.
fn split_at_positions(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.retain(|&c| c > 0 && c < bytes.len());
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(&bytes[start..cut]);
        start = cut;
    }
    chunks.push(&bytes[start..]);
    chunks
}

proptest! {
    #[test]
    fn early_subscribers_see_every_value_in_order(values in proptest::collection::vec(any::<i64>(), 0..50)) {
        let publisher = Publisher::<i64>::new();
        let recorder = Recorder::attach(&publisher.stream());

        for v in values.iter() {
            publisher.push(*v).unwrap();
        }
        publisher.close();

        let mut expected: Vec<Event<i64>> = values.iter().copied().map(Event::Next).collect();
        expected.push(Event::Close);
        prop_assert_eq!(recorder.events(), expected);
    }

    #[test]
    fn replay_after_close_is_complete(values in proptest::collection::vec(".{0,8}", 0..30)) {
        let publisher = Publisher::<String>::new();
        let replay = publisher.stream().replay();

        for v in values.iter() {
            publisher.push(v.clone()).unwrap();
        }
        publisher.close();

        let late = Recorder::attach(&replay);
        prop_assert_eq!(late.values(), values);
        prop_assert_eq!(late.close_count(), 1);
    }

    #[test]
    fn utf8_survives_arbitrary_chunking(
        text in "\\PC{0,40}",
        cuts in proptest::collection::vec(0usize..200, 0..10),
    ) {
        let bytes = text.as_bytes();
        let mut decoder = Utf8Decoder::new();

        let mut out = String::new();
        for chunk in split_at_positions(bytes, cuts) {
            out.push_str(&decoder.decode(chunk));
        }
        out.push_str(&decoder.finish());

        prop_assert_eq!(out, text);
    }

    #[test]
    fn normalized_text_has_no_crlf(text in "[a-z\r\n]{0,40}") {
        let normalized = normalize_newlines(&text);
        prop_assert!(!normalized.contains("\r\n"));
        prop_assert_eq!(normalized.matches('\n').count(), text.matches('\n').count());
    }

    #[test]
    fn standalone_secret_never_leaks(
        secret in "[0-9][A-Za-z0-9]{2,11}",
        before in "[a-z ]{0,10}",
        after in "[a-z ]{0,10}",
    ) {
        let masker = SecretMasker::new([secret.as_str()]).unwrap().unwrap();
        let text = format!("{before} {secret} {after}");

        let masked = masker.mask(&text);
        prop_assert!(masked.contains(SECURE_MASK));
        prop_assert_eq!(masked, format!("{before} {SECURE_MASK} {after}"));
    }

    #[test]
    fn secret_embedded_in_a_word_is_left_alone(secret in "[a-z]{3,8}") {
        let masker = SecretMasker::new([secret.as_str()]).unwrap().unwrap();
        let text = format!("x{secret}y");
        prop_assert_eq!(masker.mask(&text), text);
    }

    #[test]
    fn stdin_trigger_fires_once_across_any_chunking(
        prefix in "[a-z ]{0,20}",
        suffix in "[a-z ]{0,20}",
        cuts in proptest::collection::vec(0usize..60, 0..8),
    ) {
        let writes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&writes);
        let trigger = StdinTrigger::new("Password:", "secret", move |value: &str| {
            assert_eq!(value, "secret");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let output = format!("{prefix}Password:{suffix}Password:");
        for chunk in split_at_positions(output.as_bytes(), cuts) {
            // ASCII only, so every cut is a char boundary.
            trigger.on_next(&String::from_utf8(chunk.to_vec()).unwrap()).unwrap();
        }

        prop_assert_eq!(writes.load(Ordering::SeqCst), 1);
        prop_assert!(trigger.has_fired());
    }

    #[test]
    fn repeated_flag_doubles_argument_count(items in proptest::collection::vec("[a-z]{1,5}", 1..10)) {
        let parameter = ParameterBuilder::new("item")
            .param("--item")
            .multi_value_mode(MultiValueMode::RepeatParamValue)
            .build();

        let args = build_args(&parameter, &ParameterValue::List(items.clone()));

        prop_assert_eq!(args.len(), items.len() * 2);
        for (pair, item) in args.chunks(2).zip(items.iter()) {
            prop_assert_eq!(pair[0].as_str(), "--item");
            prop_assert_eq!(&pair[1], item);
        }
    }
}
