use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use reqwest::Method;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, COOKIE};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use crate::domain::cookie::{Cookie, CookieJar};
use crate::domain::post::Post;
use crate::error::{AuthError, FeedError};
use crate::feed::timeline::{self, TimelinePage};
use crate::feed::{FeedSource, PostStream};

/// Public bearer token of the twitter.com web client.
const BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const GUEST_ACTIVATE_URL: &str = "https://api.twitter.com/1.1/guest/activate.json";
const LOGIN_FLOW_URL: &str = "https://api.twitter.com/1.1/onboarding/task.json";
const VERIFY_CREDENTIALS_URL: &str = "https://api.twitter.com/1.1/account/verify_credentials.json";
const USER_BY_SCREEN_NAME_URL: &str =
    "https://twitter.com/i/api/graphql/G3KGOASz96M-Qu0nwmGXNg/UserByScreenName";
const USER_TWEETS_URL: &str = "https://twitter.com/i/api/graphql/V7H0Ap3_Hh2FyS75OCDO3Q/UserTweets";

const GRAPHQL_FEATURES: &str = r#"{"rweb_lists_timeline_redesign_enabled":true,"responsive_web_graphql_exclude_directive_enabled":true,"verified_phone_label_enabled":false,"creator_subscriptions_tweet_preview_api_enabled":true,"responsive_web_graphql_timeline_navigation_enabled":true,"responsive_web_graphql_skip_user_profile_image_extensions_enabled":false,"tweetypie_unmention_optimization_enabled":true,"responsive_web_edit_tweet_api_enabled":true,"graphql_is_translatable_rweb_tweet_is_translatable_enabled":true,"view_counts_everywhere_api_enabled":true,"longform_notetweets_consumption_enabled":true,"responsive_web_twitter_article_tweet_consumption_enabled":false,"tweet_awards_web_tipping_enabled":false,"freedom_of_speech_not_reach_fetch_enabled":true,"standardized_nudges_misinfo":true,"tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled":true,"longform_notetweets_rich_text_read_enabled":true,"longform_notetweets_inline_media_enabled":true,"responsive_web_media_download_video_enabled":false,"responsive_web_enhance_cards_enabled":false,"hidden_profile_likes_enabled":false,"hidden_profile_subscriptions_enabled":false,"highlights_tweets_tab_ui_enabled":true,"subscriptions_verification_info_verified_since_enabled":true}"#;

/// Largest page the timeline endpoint honours.
const MAX_PAGE_SIZE: usize = 40;
/// Upper bound on onboarding round trips before giving up.
const MAX_LOGIN_STEPS: usize = 10;

/// Blocking client for the twitter.com web API, carrying its own cookie jar so
/// the session can be exported and restored between runs.
pub struct TwitterClient {
    http: Client,
    cookies: CookieJar,
    guest_token: Option<String>,
}

impl TwitterClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            cookies: CookieJar::new(),
            guest_token: None,
        })
    }

    fn call(&mut self, method: Method, url: Url, body: Option<&Value>) -> Result<Value> {
        let now = Utc::now().timestamp();
        let host = url.host_str().unwrap_or_default().to_string();
        let secure = url.scheme() == "https";

        let mut req = self
            .http
            .request(method, url.clone())
            .header(AUTHORIZATION, format!("Bearer {BEARER_TOKEN}"))
            .header("x-twitter-active-user", "yes")
            .header("x-twitter-client-language", "en");
        if let Some(csrf) = self.cookies.value("ct0", now) {
            req = req.header("x-csrf-token", csrf);
        }
        if self.cookies.value("auth_token", now).is_some() {
            req = req.header("x-twitter-auth-type", "OAuth2Session");
        } else if let Some(gt) = &self.guest_token {
            req = req.header("x-guest-token", gt.as_str());
        }
        if let Some(c) = self.cookies.header_for(&host, secure, now) {
            req = req.header(COOKIE, c);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .with_context(|| format!("request to {} failed", url.path()))?;
        self.absorb_cookies(&resp, &host);

        let status = resp.status();
        let text = resp.text().context("reading response body")?;
        if !status.is_success() {
            bail!("{} returned {status}: {}", url.path(), snippet(&text));
        }
        serde_json::from_str(&text).with_context(|| format!("{} returned invalid JSON", url.path()))
    }

    fn absorb_cookies(&mut self, resp: &Response, host: &str) {
        let now = Utc::now().timestamp();
        for c in resp.cookies() {
            let expiration = expiry_epoch(c.max_age(), c.expires(), now);
            let cookie = Cookie {
                name: c.name().to_string(),
                value: c.value().to_string(),
                domain: c.domain().unwrap_or(host).to_string(),
                path: c.path().unwrap_or("/").to_string(),
                expiration,
                secure: c.secure(),
                http_only: c.http_only(),
            };
            log::debug!("set-cookie {} for {}", cookie.name, cookie.domain);
            self.cookies.merge(cookie, now);
        }
    }

    fn activate_guest(&mut self) -> Result<()> {
        let url = Url::parse(GUEST_ACTIVATE_URL)?;
        let v = self.call(Method::POST, url, None)?;
        let token = v
            .get("guest_token")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("guest/activate returned no guest_token"))?;
        self.guest_token = Some(token.to_string());
        Ok(())
    }

    fn flow_step(&mut self, flow_name: Option<&str>, body: &Value) -> Result<FlowState, AuthError> {
        let mut url = Url::parse(LOGIN_FLOW_URL).map_err(|e| AuthError::Request(e.to_string()))?;
        if let Some(name) = flow_name {
            url.query_pairs_mut().append_pair("flow_name", name);
        }
        let v = self
            .call(Method::POST, url, Some(body))
            .map_err(|e| AuthError::Request(format!("{e:#}")))?;
        parse_flow_response(&v)
    }

    fn resolve_user_id(&mut self, screen_name: &str) -> Result<String, FeedError> {
        let variables = json!({
            "screen_name": screen_name,
            "withSafetyModeUserFields": true,
        });
        let v = self
            .graphql(USER_BY_SCREEN_NAME_URL, &variables)
            .map_err(|e| FeedError::Request(format!("{e:#}")))?;
        match timeline::parse_user_id(&v) {
            Some(id) => Ok(id),
            None => Err(match timeline::graphql_error(&v) {
                Some(msg) => FeedError::Request(msg),
                None => FeedError::UnknownAccount(screen_name.to_string()),
            }),
        }
    }

    fn user_tweets(
        &mut self,
        user_id: &str,
        count: usize,
        cursor: Option<&str>,
    ) -> Result<TimelinePage, FeedError> {
        let mut variables = json!({
            "userId": user_id,
            "count": count,
            "includePromotedContent": false,
            "withQuickPromoteEligibilityTweetFields": false,
            "withVoice": true,
            "withV2Timeline": true,
        });
        if let Some(c) = cursor {
            variables["cursor"] = json!(c);
        }
        let v = self
            .graphql(USER_TWEETS_URL, &variables)
            .map_err(|e| FeedError::Request(format!("{e:#}")))?;
        timeline::parse_user_tweets(&v)
    }

    fn graphql(&mut self, endpoint: &str, variables: &Value) -> Result<Value> {
        let mut url = Url::parse(endpoint)?;
        url.query_pairs_mut()
            .append_pair("variables", &variables.to_string())
            .append_pair("features", GRAPHQL_FEATURES);
        if self.cookies.value("auth_token", Utc::now().timestamp()).is_none()
            && self.guest_token.is_none()
        {
            self.activate_guest()?;
        }
        self.call(Method::GET, url, None)
    }
}

impl FeedSource for TwitterClient {
    fn import_session(&mut self, jar: CookieJar) {
        self.cookies = jar;
        self.guest_token = None;
    }

    fn is_authenticated(&mut self) -> bool {
        let now = Utc::now().timestamp();
        if self.cookies.value("auth_token", now).is_none() || self.cookies.value("ct0", now).is_none()
        {
            return false;
        }
        let url = match Url::parse(VERIFY_CREDENTIALS_URL) {
            Ok(u) => u,
            Err(_) => return false,
        };
        match self.call(Method::GET, url, None) {
            Ok(v) => {
                if let Some(name) = v.get("screen_name").and_then(Value::as_str) {
                    log::debug!("session valid for @{name}");
                }
                true
            }
            Err(e) => {
                log::debug!("session check failed: {e:#}");
                false
            }
        }
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), AuthError> {
        log::info!("logging in as {username}");
        self.activate_guest()
            .map_err(|e| AuthError::Request(format!("{e:#}")))?;

        let start = json!({
            "flow_token": null,
            "input_flow_data": {
                "flow_context": {
                    "debug_overrides": {},
                    "start_location": { "location": "splash_screen" }
                }
            }
        });
        let mut state = self.flow_step(Some("login"), &start)?;

        for _ in 0..MAX_LOGIN_STEPS {
            let Some(subtask) = state.subtask.as_deref() else {
                break;
            };
            log::debug!("login subtask {subtask}");
            let input = match subtask {
                "LoginSuccessSubtask" => break,
                "LoginJsInstrumentationSubtask" => json!({
                    "subtask_id": subtask,
                    "js_instrumentation": { "response": "{}", "link": "next_link" }
                }),
                "LoginEnterUserIdentifierSSO" => json!({
                    "subtask_id": subtask,
                    "settings_list": {
                        "setting_responses": [{
                            "key": "user_identifier",
                            "response_data": { "text_data": { "result": username } }
                        }],
                        "link": "next_link"
                    }
                }),
                "LoginEnterPassword" => json!({
                    "subtask_id": subtask,
                    "enter_password": { "password": password, "link": "next_link" }
                }),
                "AccountDuplicationCheck" => json!({
                    "subtask_id": subtask,
                    "check_logged_in_account": { "link": "AccountDuplicationCheck_false" }
                }),
                "DenyLoginSubtask" => {
                    return Err(AuthError::Rejected("login denied by server".to_string()));
                }
                other => return Err(AuthError::UnsupportedStep(other.to_string())),
            };
            let body = json!({ "flow_token": state.token, "subtask_inputs": [input] });
            state = self.flow_step(None, &body)?;
        }

        self.guest_token = None;
        if self.cookies.value("auth_token", Utc::now().timestamp()).is_none() {
            return Err(AuthError::Rejected(
                "login finished without a session cookie".to_string(),
            ));
        }
        Ok(())
    }

    fn fetch_recent(&mut self, account: &str, limit: usize) -> PostStream<'_> {
        Box::new(UserTweets {
            client: self,
            account: account.trim_start_matches('@').to_string(),
            user_id: None,
            cursor: None,
            buffered: VecDeque::new(),
            remaining: limit,
            exhausted: false,
        })
    }

    fn export_session(&self) -> CookieJar {
        self.cookies.clone()
    }
}

#[derive(Debug, PartialEq, Eq)]
struct FlowState {
    token: String,
    subtask: Option<String>,
}

fn parse_flow_response(v: &Value) -> Result<FlowState, AuthError> {
    if let Some(msg) = v
        .pointer("/errors/0/message")
        .and_then(Value::as_str)
    {
        return Err(AuthError::Rejected(msg.to_string()));
    }
    let token = v
        .get("flow_token")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::Request("login flow returned no flow_token".to_string()))?
        .to_string();
    let subtask = v
        .pointer("/subtasks/0/subtask_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(FlowState { token, subtask })
}

/// Absolute expiry of a received cookie. `Max-Age` wins over `Expires`; both
/// saturate instead of overflowing, and an `Expires` before the epoch means
/// already expired.
fn expiry_epoch(max_age: Option<Duration>, expires: Option<SystemTime>, now: i64) -> Option<i64> {
    let secs = |d: Duration| i64::try_from(d.as_secs()).unwrap_or(i64::MAX);
    if let Some(d) = max_age {
        return Some(now.saturating_add(secs(d)));
    }
    let t = expires?;
    Some(t.duration_since(UNIX_EPOCH).map(secs).unwrap_or(0))
}

fn snippet(s: &str) -> String {
    s.chars().take(200).collect()
}

/// Pages through the timeline on demand, never yielding more than `remaining`
/// items.
struct UserTweets<'a> {
    client: &'a mut TwitterClient,
    account: String,
    user_id: Option<String>,
    cursor: Option<String>,
    buffered: VecDeque<Result<Post, FeedError>>,
    remaining: usize,
    exhausted: bool,
}

impl UserTweets<'_> {
    fn fill(&mut self) -> Result<(), FeedError> {
        let user_id = match &self.user_id {
            Some(id) => id.clone(),
            None => {
                let id = self.client.resolve_user_id(&self.account)?;
                log::debug!("@{} is user {id}", self.account);
                self.user_id = Some(id.clone());
                id
            }
        };

        let count = self.remaining.min(MAX_PAGE_SIZE);
        let page = self
            .client
            .user_tweets(&user_id, count, self.cursor.as_deref())?;

        if page.is_last(self.cursor.as_deref()) {
            self.exhausted = true;
        }
        self.cursor = page.next_cursor;
        self.buffered.extend(page.items);
        Ok(())
    }
}

impl Iterator for UserTweets<'_> {
    type Item = Result<Post, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        // A page may hold only filtered entries, so keep going while the
        // cursor advances.
        while self.buffered.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                self.remaining = 0;
                return Some(Err(e));
            }
        }
        let item = self.buffered.pop_front()?;
        self.remaining -= 1;
        Some(item)
    }
}
