//! Sticky comment protocol.
//!
//! The bot maintains at most one status comment per item. Each rendered body
//! embeds an HTML-comment marker encoding the item it belongs to; lookups
//! paginate the thread and match on the marker plus the author class, which
//! is what distinguishes the bot's own status comment from a user comment
//! that happens to contain similar text.

use regex::Regex;
use std::sync::LazyLock;

/// Longest issue title the tracker accepts before warning the author.
pub const MAX_TITLE_LENGTH: usize = 65;

/// Distinctive fragment of the bug-report warning, used to find a previously
/// posted warning without a marker.
pub const BUG_WARNING_FRAGMENT: &str = "please use git blame";

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9][A-Za-z0-9-]*)").expect("mention pattern compiles"));

/// Marker embedded in the sticky comment of a pull request.
pub fn pull_request_marker(item_id: u64) -> String {
    format!("<!-- Sticky Pull Request Comment{item_id} -->")
}

/// Marker embedded in the sticky comment of an issue.
pub fn issue_marker(issue_id: u64) -> String {
    format!("<!-- Sticky Issue Comment{issue_id} -->")
}

/// Render a comment body with its trailing marker.
pub fn body_with_marker(body: &str, marker: &str) -> String {
    format!("{body}\n{marker}")
}

/// Warning posted when an issue title exceeds [`MAX_TITLE_LENGTH`].
pub fn issue_title_warning(sender_login: &str) -> String {
    format!(
        "@{sender_login} please change the title of this issue to make sure the length doesn't exceed {MAX_TITLE_LENGTH} characters."
    )
}

/// Body of the "submit your hours" sticky comment.
///
/// Callers keep the mention list non-empty; an empty list means the comment
/// should be deleted instead of rendered.
pub fn submit_hours_body(mentions: &[String], details_url: &str) -> String {
    let handles: Vec<String> = mentions
        .iter()
        .map(|login| format!("@{login}"))
        .collect();
    format!(
        "{} please submit the time spent on this pull request via the [PR Time Tracker]({details_url}) app.",
        handles.join(" ")
    )
}

/// Warning posted on a fix pull request that is missing its bug-report
/// comment.
pub fn bug_report_warning(sender_login: &str) -> String {
    format!(
        "@{sender_login} please use git blame and specify the link to the commit link that has introduced this bug. Send the following message in this PR: `@pr-time-tracker bug commit [link] && bug author @name`"
    )
}

/// Extract the mentioned logins from a sticky hours comment.
///
/// Mentions form the head of the body, before the "please submit" sentence;
/// anything past that point is prose and ignored so logins inside the
/// sentence never leak into the list.
pub fn parse_mentions(body: &str) -> Vec<String> {
    let head = body.split(" please").next().unwrap_or(body);
    let mut logins = Vec::new();
    for capture in MENTION.captures_iter(head) {
        let login = capture[1].to_string();
        if !logins.contains(&login) {
            logins.push(login);
        }
    }
    logins
}

/// Add a login to a mention list, keeping order and uniqueness.
pub fn add_mention(mentions: &mut Vec<String>, login: &str) {
    if !mentions.iter().any(|existing| existing == login) {
        mentions.push(login.to_string());
    }
}

/// Remove a login from a mention list.
pub fn remove_mention(mentions: &mut Vec<String>, login: &str) {
    mentions.retain(|existing| existing != login);
}

#[cfg(test)]
#[path = "comments_tests.rs"]
mod tests;
