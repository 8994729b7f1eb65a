use proptest::prelude::*;
use reclaim_core::batch::{BatchJob, ValidationError};
use reclaim_core::config::MAX_BULK_TARGETS;
use reclaim_core::conversation::{Command, InboundEvent};
use reclaim_core::utils::split_long_message;

fn target() -> impl Strategy<Value = String> {
    "[a-z0-9._@]{1,20}"
}

fn padding() -> impl Strategy<Value = String> {
    "[ \t]{0,3}"
}

proptest! {
    #[test]
    fn bulk_parse_keeps_non_empty_lines_in_order(
        entries in prop::collection::vec((padding(), target(), padding()), 1..=MAX_BULK_TARGETS),
        blanks in 0usize..5,
    ) {
        let mut lines: Vec<String> = entries
            .iter()
            .map(|(left, t, right)| format!("{left}{t}{right}"))
            .collect();
        lines.extend(std::iter::repeat(String::from("   ")).take(blanks));

        let job = BatchJob::parse(&lines.join("\n")).expect("valid job");
        let expected: Vec<&str> = entries.iter().map(|(_, t, _)| t.as_str()).collect();

        prop_assert_eq!(job.targets(), expected.as_slice());
    }

    #[test]
    fn bulk_parse_rejects_more_than_cap(
        extra in 1usize..20,
    ) {
        let count = MAX_BULK_TARGETS + extra;
        let input = (0..count).map(|i| format!("user{i}")).collect::<Vec<_>>().join("\n");

        prop_assert_eq!(
            BatchJob::parse(&input),
            Err(ValidationError::TooMany { count, max: MAX_BULK_TARGETS })
        );
    }

    #[test]
    fn plain_targets_are_never_commands(t in target()) {
        let is_text = matches!(InboundEvent::from_text(1, 1, &t), InboundEvent::Text { .. });
        prop_assert!(is_text);
        prop_assert_eq!(Command::parse(&t), None);
    }

    #[test]
    fn split_message_respects_limit(
        lines in prop::collection::vec("[a-z ]{0,120}", 1..80),
        limit in 50usize..400,
    ) {
        let text = lines.join("\n");
        for part in split_long_message(&text, limit) {
            prop_assert!(part.chars().count() <= limit);
            prop_assert!(!part.is_empty());
        }
    }
}
