//! Fetching and normalizing mentions from the external feed.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::domain::models::{normalize_handle, BridgeConfig, BirdMentionRecord};
use crate::domain::ports::{MentionFetchError, MentionFetchOutput, MentionFetchRequest, MentionFetcher};

/// Timeout floor for the primary fetch.
pub const PRIMARY_TIMEOUT_FLOOR: Duration = Duration::from_secs(45);
/// Timeout floor for the single retry after a timeout.
pub const RETRY_TIMEOUT_FLOOR: Duration = Duration::from_secs(90);
/// Upper bound on the item count of the retry.
pub const RETRY_FETCH_COUNT: u32 = 10;

/// Keys that may hold the mention array when the payload is an object, in priority order.
const ARRAY_KEYS: &[&str] = &["mentions", "tweets", "data", "results", "items"];

const ID_KEYS: &[&str] = &["id", "tweet_id", "tweetId", "id_str", "rest_id"];
const CONVERSATION_KEYS: &[&str] = &["conversation_id", "conversationId", "conversation_id_str"];
const AUTHOR_KEYS: &[&str] = &[
    "author.username",
    "author.screen_name",
    "author.handle",
    "user.screen_name",
    "user.username",
    "username",
    "screen_name",
    "author_handle",
    "authorHandle",
    "author",
];
const TEXT_KEYS: &[&str] = &["text", "full_text", "fullText", "content", "legacy.full_text"];
const URL_KEYS: &[&str] = &["url", "tweet_url", "tweetUrl", "permalink"];
const TIME_KEYS: &[&str] = &["created_at", "createdAt", "timestamp", "time", "date"];

/// Fetch mentions, retrying once with a smaller batch and a longer timeout
/// when the first attempt times out. Every other failure propagates at once.
pub async fn fetch_mentions_with_retry(
    fetcher: &dyn MentionFetcher,
    settings: &BridgeConfig,
    fetch_count: u32,
) -> Result<Value, MentionFetchError> {
    let configured = Duration::from_millis(settings.timeout_ms);
    let primary = MentionFetchRequest {
        count: fetch_count,
        timeout: configured.max(PRIMARY_TIMEOUT_FLOOR),
    };

    match fetch_once(fetcher, primary).await {
        Err(e) if e.is_timeout() => {
            let retry = MentionFetchRequest {
                count: fetch_count.min(RETRY_FETCH_COUNT),
                timeout: configured.max(RETRY_TIMEOUT_FLOOR),
            };
            tracing::warn!(
                attempt = 2,
                count = retry.count,
                timeout_ms = retry.timeout.as_millis() as u64,
                "mention fetch timed out; retrying with a smaller batch"
            );
            fetch_once(fetcher, retry).await
        }
        other => other,
    }
}

async fn fetch_once(fetcher: &dyn MentionFetcher, request: MentionFetchRequest) -> Result<Value, MentionFetchError> {
    match fetcher.fetch_mentions(request).await? {
        MentionFetchOutput::Structured(value) => Ok(value),
        MentionFetchOutput::Unstructured(_) => Err(MentionFetchError::StructuredOutputUnsupported),
    }
}

/// Normalize a raw payload into mention records. Elements that are not
/// objects are dropped; missing fields become empty strings so the command
/// parser can reject them with a reason.
pub fn parse_bird_mentions(raw: &Value) -> Vec<BirdMentionRecord> {
    parse_bird_mentions_at(raw, Utc::now())
}

fn parse_bird_mentions_at(raw: &Value, now: DateTime<Utc>) -> Vec<BirdMentionRecord> {
    let items: &[Value] = match raw {
        Value::Array(items) => items,
        Value::Object(obj) => ARRAY_KEYS
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array))
            .map_or(&[] as &[Value], Vec::as_slice),
        _ => &[],
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| parse_record(obj, now))
        .collect()
}

fn parse_record(obj: &Map<String, Value>, now: DateTime<Utc>) -> BirdMentionRecord {
    let tweet_id = first_text(obj, ID_KEYS).unwrap_or_default();
    let author = first_text(obj, AUTHOR_KEYS)
        .map(|a| normalize_handle(&a))
        .unwrap_or_default();
    let text = first_text(obj, TEXT_KEYS).unwrap_or_default();
    let conversation_id = first_text(obj, CONVERSATION_KEYS).filter(|c| !c.is_empty());
    let timestamp = TIME_KEYS
        .iter()
        .filter_map(|key| lookup(obj, key))
        .find_map(parse_timestamp)
        .unwrap_or(now);
    let url = first_text(obj, URL_KEYS)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("https://x.com/{author}/status/{tweet_id}"));

    BirdMentionRecord {
        tweet_id,
        conversation_id,
        author,
        text,
        url,
        timestamp,
        raw: Value::Object(obj.clone()),
    }
}

fn lookup<'a>(obj: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = obj.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// First key whose value is a non-empty string or a number.
fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|key| lookup(obj, key)).find_map(|value| match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let n = n.as_i64()?;
            // Anything this large is epoch milliseconds.
            if n > 100_000_000_000 {
                Utc.timestamp_millis_opt(n).single()
            } else {
                Utc.timestamp_opt(n, 0).single()
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
                return Some(dt.with_timezone(&Utc));
            }
            // Twitter legacy format: "Wed Oct 10 20:19:24 +0000 2018"
            if let Ok(dt) = DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y") {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(naive.and_utc());
            }
            s.parse::<i64>().ok().and_then(|n| parse_timestamp(&Value::from(n)))
        }
        _ => None,
    }
}

/// Oldest first, ties broken by id. Stable.
pub fn sort_mentions_oldest_first(mentions: &mut [BirdMentionRecord]) {
    mentions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.tweet_id.cmp(&b.tweet_id)));
}
