//! Turning an accepted mention into a command and a task prompt.

use chrono::SecondsFormat;

use crate::domain::models::{
    normalize_handle, BirdMentionRecord, MentionRejectReason, MentionTriggerSettings, ParsedMentionCommand,
};

const TITLE_COMMAND_CHARS: usize = 60;

/// Accept or reject a mention as a command.
///
/// Checks run in order: id, author, allowlist, prefix, command body. The
/// prefix must start the text or follow whitespace, so `do:` never matches
/// inside `todo:`. Only the prefix is matched case-insensitively; the command
/// keeps its original casing.
pub fn parse_mention_trigger_command(
    mention: &BirdMentionRecord,
    settings: &MentionTriggerSettings,
) -> Result<ParsedMentionCommand, MentionRejectReason> {
    if mention.tweet_id.trim().is_empty() {
        return Err(MentionRejectReason::MissingId);
    }
    let author = normalize_handle(&mention.author);
    if author.is_empty() {
        return Err(MentionRejectReason::MissingAuthor);
    }
    if !settings.allowlist.iter().any(|allowed| normalize_handle(allowed) == author) {
        return Err(MentionRejectReason::NotAllowlisted);
    }

    let prefix = settings.prefix.trim();
    let end = find_prefix(&mention.text, prefix).ok_or(MentionRejectReason::MissingPrefix)?;
    let command = mention.text[end..].trim();
    if command.is_empty() {
        return Err(MentionRejectReason::EmptyCommand);
    }

    Ok(ParsedMentionCommand {
        mention: BirdMentionRecord {
            author,
            ..mention.clone()
        },
        command: command.to_string(),
    })
}

/// Byte offset just past the first boundary-aligned, case-insensitive occurrence of `prefix`.
fn find_prefix(text: &str, prefix: &str) -> Option<usize> {
    let wanted = prefix.to_lowercase();
    let width = prefix.chars().count();
    let mut at_boundary = true;

    for (idx, ch) in text.char_indices() {
        if at_boundary {
            let candidate: String = text[idx..].chars().take(width).collect();
            if candidate.to_lowercase() == wanted {
                return Some(idx + candidate.len());
            }
        }
        at_boundary = ch.is_whitespace();
    }
    None
}

/// Task prompt handed to the ingress coordinator for an accepted mention.
pub fn build_mention_task_prompt(parsed: &ParsedMentionCommand) -> String {
    let m = &parsed.mention;
    let conversation = m.conversation_id.as_deref().unwrap_or("none");
    format!(
        "X mention command\n\
         Author: @{author}\n\
         Tweet: {url}\n\
         Tweet ID: {id}\n\
         Conversation ID: {conversation}\n\
         Created: {created}\n\
         \n\
         Original text:\n\
         {text}\n\
         \n\
         Command:\n\
         {command}\n",
        author = m.author,
        url = m.url,
        id = m.tweet_id,
        created = m.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        text = m.text,
        command = parsed.command,
    )
}

/// Short task title: author plus the head of the command.
pub fn build_mention_task_title(parsed: &ParsedMentionCommand) -> String {
    let head: String = parsed.command.chars().take(TITLE_COMMAND_CHARS).collect();
    let ellipsis = if parsed.command.chars().count() > TITLE_COMMAND_CHARS { "..." } else { "" };
    format!("@{}: {head}{ellipsis}", parsed.mention.author)
}
