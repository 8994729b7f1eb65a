//! Relay UI components
//!
//! Contains keyboards, text messages, and the mapping from conversation
//! replies to Telegram messages.

use html_escape::encode_text;
use reclaim_core::batch::{BatchProgress, BatchReport};
use reclaim_core::conversation::{render_single_report, CallbackAction, Command, Reply};
use reclaim_core::gate::{GateReport, RequiredGroup};
use reclaim_core::upstream::MethodResult;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};
use tracing::warn;

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for relay UI view rendering
///
/// Provides all text messages and formatting for the relay conversation.
pub trait RelayView {
    /// Top-level menu
    fn menu_message() -> &'static str;

    /// Usage help
    fn help_message() -> &'static str;

    /// Prompt for a single target
    fn single_target_prompt() -> &'static str;

    /// Prompt for a target list
    fn bulk_targets_prompt() -> String;

    /// Shown while one target is processed
    fn processing_message(target: &str) -> String;

    /// Per-strategy report for one target
    fn single_report(target: &str, results: &[MethodResult]) -> String;

    /// Shown before a batch starts
    fn bulk_started(count: usize) -> String;

    /// Shown before each batch target
    fn batch_progress(progress: &BatchProgress) -> String;

    /// Aggregate batch report
    fn batch_report(report: &BatchReport) -> String;

    /// Bulk input had no targets
    fn no_targets() -> &'static str;

    /// Bulk input over the cap
    fn too_many_targets(count: usize, max: usize) -> String;

    /// Generic processing failure
    fn failure_message() -> &'static str;

    /// Membership gate with per-group marks
    fn membership_required(report: &GateReport) -> String;

    /// Gate re-check passed
    fn access_granted() -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default English-language implementation of `RelayView`
pub struct DefaultRelayView;

impl RelayView for DefaultRelayView {
    fn menu_message() -> &'static str {
        r"👋 <b>Password Reset Relay</b>

Choose what to do:
• /reset: send a reset link for one account
• /bulk_reset: send reset links for a list of accounts
• /help: how it works"
    }

    fn help_message() -> &'static str {
        r"ℹ️ <b>How it works</b>

<b>/reset</b>: send one username or email. Every reset method is tried and each result is reported.

<b>/bulk_reset</b>: send up to 50 usernames or emails, one per line. Targets are processed one by one with a short pause between them.

Send a command at any time to start over."
    }

    fn single_target_prompt() -> &'static str {
        "🔑 Send the username or email of the account to reset."
    }

    fn bulk_targets_prompt() -> String {
        format!(
            "📋 Send up to {} usernames or emails, one per line.\n\nExample:\n<code>alice\nbob@mail.com\ncarol</code>",
            reclaim_core::config::MAX_BULK_TARGETS
        )
    }

    fn processing_message(target: &str) -> String {
        format!("⏳ Processing reset for <code>{}</code>...", encode_text(target))
    }

    fn single_report(target: &str, results: &[MethodResult]) -> String {
        encode_text(&render_single_report(target, results)).into_owned()
    }

    fn bulk_started(count: usize) -> String {
        format!("🚀 Starting bulk reset for {count} targets...")
    }

    fn batch_progress(progress: &BatchProgress) -> String {
        format!(
            "⏳ Processing {}/{}: <code>{}</code>",
            progress.index,
            progress.total,
            encode_text(&progress.target)
        )
    }

    fn batch_report(report: &BatchReport) -> String {
        encode_text(&report.render()).into_owned()
    }

    fn no_targets() -> &'static str {
        "⚠️ No targets found. Send at least one username or email, one per line."
    }

    fn too_many_targets(count: usize, max: usize) -> String {
        format!("⚠️ You sent {count} targets. The limit is {max} per request, please shorten the list.")
    }

    fn failure_message() -> &'static str {
        "❌ Something went wrong while processing your request. Please try again later."
    }

    fn membership_required(report: &GateReport) -> String {
        let lines: Vec<String> = report
            .checks
            .iter()
            .map(|check| {
                let mark = if check.joined { "✅" } else { "❌" };
                format!("{mark} {}", encode_text(&group_label(&check.group)))
            })
            .collect();
        format!(
            "🔒 <b>Join the required groups to use this bot</b>\n\n{}\n\nAfter joining, press \"🔄 I've joined\".",
            lines.join("\n")
        )
    }

    fn access_granted() -> &'static str {
        "✅ Access granted!"
    }
}

/// Label for a required group; private groups have no public name
#[must_use]
pub fn group_label(group: &RequiredGroup) -> String {
    if group.id.starts_with('@') {
        group.display_name().to_string()
    } else {
        "Private group".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// Create the main menu keyboard
///
/// # Examples
///
/// ```
/// use reclaim_transport_telegram::bot::views::get_main_keyboard;
/// let keyboard = get_main_keyboard();
/// assert!(!keyboard.keyboard.is_empty());
/// ```
#[must_use]
pub fn get_main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("/reset"), KeyboardButton::new("/bulk_reset")],
        vec![KeyboardButton::new("/help")],
    ])
    .resize_keyboard()
}

/// Join buttons for every missing group plus the re-check button
#[must_use]
pub fn membership_keyboard(report: &GateReport, requested: &Command) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = report
        .missing()
        .into_iter()
        .filter_map(|group| {
            let link = group.join_link()?;
            match reqwest::Url::parse(&link) {
                Ok(url) => Some(vec![InlineKeyboardButton::url(
                    format!("➕ Join {}", group_label(group)),
                    url,
                )]),
                Err(e) => {
                    warn!(group = %group.id, "Invalid join link {link}: {e}");
                    None
                }
            }
        })
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(
        "🔄 I've joined",
        CallbackAction::RecheckMembership(requested.clone()).encode(),
    )]);
    InlineKeyboardMarkup::new(rows)
}

// ─────────────────────────────────────────────────────────────────────────────
// Reply mapping
// ─────────────────────────────────────────────────────────────────────────────

/// HTML text plus optional keyboard for one reply
#[derive(Debug, Clone)]
pub struct RenderedReply {
    /// HTML-formatted text
    pub text: String,
    /// Keyboard to attach (to the last part when split)
    pub markup: Option<ReplyMarkup>,
}

impl RenderedReply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    fn with_menu(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Some(ReplyMarkup::Keyboard(get_main_keyboard())),
        }
    }

    /// Inline keyboard, the only markup an edit can carry
    #[must_use]
    pub fn inline_keyboard(&self) -> Option<InlineKeyboardMarkup> {
        match &self.markup {
            Some(ReplyMarkup::InlineKeyboard(keyboard)) => Some(keyboard.clone()),
            _ => None,
        }
    }
}

/// Map a conversation reply to Telegram text and keyboard
#[must_use]
pub fn render_reply<V: RelayView>(reply: &Reply) -> RenderedReply {
    match reply {
        Reply::Menu => RenderedReply::with_menu(V::menu_message()),
        Reply::Help => RenderedReply::with_menu(V::help_message()),
        Reply::SingleTargetPrompt => RenderedReply::plain(V::single_target_prompt()),
        Reply::BulkTargetsPrompt => RenderedReply::plain(V::bulk_targets_prompt()),
        Reply::Processing { target } => RenderedReply::plain(V::processing_message(target)),
        Reply::SingleReport { target, results } => {
            RenderedReply::with_menu(V::single_report(target, results))
        }
        Reply::BulkStarted { count } => RenderedReply::plain(V::bulk_started(*count)),
        Reply::BatchProgress(progress) => RenderedReply::plain(V::batch_progress(progress)),
        Reply::BatchReport(report) => RenderedReply::with_menu(V::batch_report(report)),
        Reply::NoTargets => RenderedReply::plain(V::no_targets()),
        Reply::TooManyTargets { count, max } => {
            RenderedReply::plain(V::too_many_targets(*count, *max))
        }
        Reply::Failure => RenderedReply::with_menu(V::failure_message()),
        Reply::MembershipRequired { report, requested } => RenderedReply {
            text: V::membership_required(report),
            markup: Some(ReplyMarkup::InlineKeyboard(membership_keyboard(
                report, requested,
            ))),
        },
        Reply::AccessGranted => RenderedReply::plain(V::access_granted()),
    }
}
