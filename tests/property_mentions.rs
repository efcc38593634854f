//! Property tests for mention command parsing and ordering.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::Value;

use hookwise::domain::models::{BirdMentionRecord, MentionRejectReason, MentionTriggerSettings};
use hookwise::services::{parse_mention_trigger_command, sort_mentions_oldest_first};

fn mention(id: &str, text: &str, epoch_secs: i64) -> BirdMentionRecord {
    BirdMentionRecord {
        tweet_id: id.to_string(),
        conversation_id: None,
        author: "alice".to_string(),
        text: text.to_string(),
        url: format!("https://x.com/alice/status/{id}"),
        timestamp: Utc.timestamp_opt(epoch_secs, 0).unwrap(),
        raw: Value::Null,
    }
}

fn settings() -> MentionTriggerSettings {
    MentionTriggerSettings {
        prefix: "do:".to_string(),
        allowlist: vec!["alice".to_string()],
    }
}

proptest! {
    #[test]
    fn prefix_glued_to_a_word_never_matches(word in "[a-zA-Z]{1,8}", command in "[a-z ]{0,20}") {
        let text = format!("@agent {word}do: {command}");
        let result = parse_mention_trigger_command(&mention("1", &text, 0), &settings());
        prop_assert_eq!(result.unwrap_err(), MentionRejectReason::MissingPrefix);
    }

    #[test]
    fn prefix_after_whitespace_yields_the_trimmed_command(
        lead in "[a-z@ ]{0,10}",
        upper in any::<bool>(),
        command in "[a-z]{1,10}( [a-z]{1,10}){0,3}",
    ) {
        let prefix = if upper { "DO:" } else { "do:" };
        let text = format!("{lead} {prefix}  {command}  ");
        let parsed = parse_mention_trigger_command(&mention("1", &text, 0), &settings()).unwrap();
        prop_assert_eq!(parsed.command, command);
    }

    #[test]
    fn mentions_sort_oldest_first(times in prop::collection::vec(0i64..2_000_000_000, 0..20)) {
        let mut mentions: Vec<_> = times
            .iter()
            .enumerate()
            .map(|(i, t)| mention(&format!("{i:03}"), "hi", *t))
            .collect();
        sort_mentions_oldest_first(&mut mentions);

        prop_assert_eq!(mentions.len(), times.len());
        for pair in mentions.windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            if pair[0].timestamp == pair[1].timestamp {
                prop_assert!(pair[0].tweet_id < pair[1].tweet_id);
            }
        }
    }
}
