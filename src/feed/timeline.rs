//! Parsing of the GraphQL `UserByScreenName` and `UserTweets` responses.
//!
//! The timeline is a list of instructions; `TimelineAddEntries` carries the
//! tweets plus a pair of cursors. Everything else (pins, who-to-follow
//! modules, tombstones) is ignored.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::post::Post;
use crate::error::FeedError;

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Default)]
pub struct TimelinePage {
    pub items: Vec<Result<Post, FeedError>>,
    pub next_cursor: Option<String>,
    /// Tweet entries seen on the page, including the ones filtered out of
    /// `items`.
    pub entries: usize,
}

impl TimelinePage {
    /// Whether paging should stop after this page, given the cursor that
    /// requested it.
    pub fn is_last(&self, requested_with: Option<&str>) -> bool {
        self.entries == 0
            || self.next_cursor.is_none()
            || self.next_cursor.as_deref() == requested_with
    }
}

/// First message of a top-level GraphQL `errors` array.
pub fn graphql_error(v: &Value) -> Option<String> {
    let errors = v.get("errors")?.as_array()?;
    let first = errors.first()?;
    Some(
        first
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| first.to_string()),
    )
}

pub fn parse_user_id(v: &Value) -> Option<String> {
    v.pointer("/data/user/result/rest_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// A response without a timeline is an error, whether or not the server
/// explained itself in `errors`.
pub fn parse_user_tweets(v: &Value) -> Result<TimelinePage, FeedError> {
    let instructions = v
        .pointer("/data/user/result/timeline_v2/timeline/instructions")
        .or_else(|| v.pointer("/data/user/result/timeline/timeline/instructions"))
        .and_then(Value::as_array);

    let Some(instructions) = instructions else {
        return Err(match graphql_error(v) {
            Some(msg) => FeedError::Request(msg),
            None => FeedError::Malformed {
                entry: "timeline".to_string(),
                reason: "no timeline instructions".to_string(),
            },
        });
    };
    if let Some(msg) = graphql_error(v) {
        log::warn!("timeline returned partial errors: {msg}");
    }

    let mut page = TimelinePage::default();

    for ins in instructions {
        if ins.get("type").and_then(Value::as_str) != Some("TimelineAddEntries") {
            continue;
        }
        let Some(entries) = ins.get("entries").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            parse_entry(entry, &mut page);
        }
    }
    Ok(page)
}

fn parse_entry(entry: &Value, page: &mut TimelinePage) {
    let entry_id = entry
        .get("entryId")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if entry_id.starts_with("tweet-") {
        page.entries += 1;
        let result = entry.pointer("/content/itemContent/tweet_results/result");
        if let Some(item) = parse_tweet_result(entry_id, result) {
            page.items.push(item);
        }
    } else if entry_id.starts_with("profile-conversation-") {
        let items = entry
            .pointer("/content/items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for it in items {
            page.entries += 1;
            let result = it.pointer("/item/itemContent/tweet_results/result");
            if let Some(item) = parse_tweet_result(entry_id, result) {
                page.items.push(item);
            }
        }
    } else if entry_id.starts_with("cursor-bottom-") {
        page.next_cursor = entry
            .pointer("/content/value")
            .and_then(Value::as_str)
            .map(str::to_string);
    }
}

/// `None` for entries that are deliberately not posts (tombstones, withheld).
fn parse_tweet_result(entry_id: &str, result: Option<&Value>) -> Option<Result<Post, FeedError>> {
    let malformed = |reason: &str| FeedError::Malformed {
        entry: entry_id.to_string(),
        reason: reason.to_string(),
    };

    let Some(mut result) = result else {
        return Some(Err(malformed("missing tweet_results")));
    };
    match result.get("__typename").and_then(Value::as_str) {
        Some("TweetWithVisibilityResults") => match result.get("tweet") {
            Some(inner) => result = inner,
            None => return Some(Err(malformed("visibility wrapper without tweet"))),
        },
        Some("TweetTombstone") | Some("TweetUnavailable") => return None,
        _ => {}
    }

    Some(tweet_to_post(result).map_err(|reason| malformed(reason.as_str())))
}

fn tweet_to_post(result: &Value) -> Result<Post, String> {
    let legacy = result.get("legacy").ok_or("missing legacy")?;

    let id = legacy
        .get("id_str")
        .or_else(|| result.get("rest_id"))
        .and_then(Value::as_str)
        .ok_or("missing id")?
        .to_string();

    let author = result
        .pointer("/core/user_results/result/legacy/screen_name")
        .or_else(|| result.pointer("/core/user_results/result/core/screen_name"))
        .and_then(Value::as_str)
        .ok_or("missing screen_name")?
        .to_string();

    // Long posts carry their full text outside `legacy`.
    let text = result
        .pointer("/note_tweet/note_tweet_results/result/text")
        .or_else(|| legacy.get("full_text"))
        .and_then(Value::as_str)
        .ok_or("missing full_text")?
        .to_string();

    let created_at = legacy
        .get("created_at")
        .and_then(Value::as_str)
        .ok_or("missing created_at")?;
    let timestamp = parse_created_at(created_at)?;

    let permalink = format!("https://twitter.com/{author}/status/{id}");

    Ok(Post {
        id,
        author,
        text,
        timestamp,
        permalink,
    })
}

pub fn parse_created_at(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_str(s, CREATED_AT_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad created_at {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn tweet(id: &str, user: &str, text: &str) -> Value {
        json!({
            "__typename": "Tweet",
            "rest_id": id,
            "core": { "user_results": { "result": { "legacy": { "screen_name": user } } } },
            "legacy": {
                "id_str": id,
                "full_text": text,
                "created_at": "Wed Oct 10 20:19:24 +0000 2018"
            }
        })
    }

    fn entry(id: &str, result: Value) -> Value {
        json!({
            "entryId": format!("tweet-{id}"),
            "content": { "itemContent": { "tweet_results": { "result": result } } }
        })
    }

    fn timeline(entries: Vec<Value>) -> Value {
        json!({
            "data": { "user": { "result": { "timeline_v2": { "timeline": { "instructions": [
                { "type": "TimelineClearCache" },
                { "type": "TimelineAddEntries", "entries": entries }
            ] } } } } }
        })
    }

    #[test]
    fn test_parse_user_id() {
        let v = json!({ "data": { "user": { "result": { "rest_id": "783214" } } } });
        assert_eq!(parse_user_id(&v).as_deref(), Some("783214"));
        assert_eq!(parse_user_id(&json!({ "data": { "user": {} } })), None);
    }

    #[test]
    fn test_parse_entries_and_cursor() {
        let v = timeline(vec![
            entry("2", tweet("2", "jack", "second")),
            entry("1", tweet("1", "jack", "first")),
            json!({ "entryId": "cursor-top-1", "content": { "value": "TOP" } }),
            json!({ "entryId": "cursor-bottom-1", "content": { "value": "BOTTOM" } }),
        ]);

        let page = parse_user_tweets(&v).unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("BOTTOM"));
        let posts: Vec<Post> = page.items.into_iter().map(Result::unwrap).collect();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "2");
        assert_eq!(posts[0].author, "jack");
        assert_eq!(posts[0].text, "second");
        assert_eq!(posts[0].permalink, "https://twitter.com/jack/status/2");
        assert_eq!(
            posts[0].timestamp,
            Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap()
        );
    }

    #[test]
    fn test_visibility_wrapper_and_tombstone() {
        let v = timeline(vec![
            entry(
                "3",
                json!({ "__typename": "TweetWithVisibilityResults", "tweet": tweet("3", "a", "x") }),
            ),
            entry("4", json!({ "__typename": "TweetTombstone" })),
        ]);
        let page = parse_user_tweets(&v).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].as_ref().unwrap().id, "3");
    }

    #[test]
    fn test_note_tweet_text_preferred() {
        let mut t = tweet("5", "a", "truncated…");
        t["note_tweet"] = json!({ "note_tweet_results": { "result": { "text": "the whole thing" } } });
        let page = parse_user_tweets(&timeline(vec![entry("5", t)])).unwrap();
        assert_eq!(page.items[0].as_ref().unwrap().text, "the whole thing");
    }

    #[test]
    fn test_broken_entry_is_an_error_item() {
        let mut t = tweet("6", "a", "x");
        t["legacy"]["created_at"] = json!("yesterday");
        let page = parse_user_tweets(&timeline(vec![entry("6", t), entry("7", tweet("7", "a", "y"))])).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(matches!(
            &page.items[0],
            Err(FeedError::Malformed { entry, .. }) if entry == "tweet-6"
        ));
        assert!(page.items[1].is_ok());
    }

    #[test]
    fn test_conversation_module_items() {
        let v = timeline(vec![json!({
            "entryId": "profile-conversation-99",
            "content": { "items": [
                { "item": { "itemContent": { "tweet_results": { "result": tweet("8", "a", "one") } } } },
                { "item": { "itemContent": { "tweet_results": { "result": tweet("9", "a", "two") } } } }
            ] }
        })]);
        let ids: Vec<String> = parse_user_tweets(&v)
            .unwrap()
            .items
            .into_iter()
            .map(|p| p.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["8", "9"]);
    }

    #[test]
    fn test_error_body_is_request_error() {
        let v = json!({ "errors": [{ "code": 88, "message": "Rate limit exceeded" }] });
        assert_eq!(
            parse_user_tweets(&v).unwrap_err(),
            FeedError::Request("Rate limit exceeded".into())
        );
    }

    #[test]
    fn test_missing_timeline_is_malformed() {
        assert!(matches!(
            parse_user_tweets(&json!({ "data": {} })),
            Err(FeedError::Malformed { .. })
        ));
    }

    #[test]
    fn test_partial_errors_keep_the_page() {
        let mut v = timeline(vec![entry("1", tweet("1", "a", "x"))]);
        v["errors"] = json!([{ "message": "one item failed" }]);
        assert_eq!(parse_user_tweets(&v).unwrap().items.len(), 1);
    }

    #[test]
    fn test_tombstone_only_page_is_not_last() {
        let v = timeline(vec![
            entry("4", json!({ "__typename": "TweetTombstone" })),
            json!({ "entryId": "cursor-bottom-1", "content": { "value": "NEXT" } }),
        ]);
        let page = parse_user_tweets(&v).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.entries, 1);
        assert!(!page.is_last(None));
        assert!(page.is_last(Some("NEXT")));
    }

    #[test]
    fn test_page_without_entries_is_last() {
        let v = timeline(vec![json!({ "entryId": "cursor-bottom-1", "content": { "value": "NEXT" } })]);
        assert!(parse_user_tweets(&v).unwrap().is_last(None));
    }
}
