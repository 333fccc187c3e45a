use serde::{Deserialize, Serialize};

use super::catalog::{Catalogs, RspCode};
use super::domain::{DiagnosticOutcome, Lead, ResultRecord, UserId};

/// Trait describing the outbound operator channel (messenger chat, e-mail).
pub trait OperatorNotifier: Send + Sync {
    fn notify(&self, message: OperatorMessage) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TestResult,
    NewLead,
}

/// HTML-formatted message destined for the operator chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorMessage {
    pub kind: MessageKind,
    pub user_id: UserId,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("operator channel not configured")]
    NotConfigured,
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Human-facing name of an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeLabel {
    pub emoji: String,
    pub name: String,
}

impl OutcomeLabel {
    pub fn text(&self) -> String {
        format!("{} {}", self.emoji, self.name)
    }
}

pub fn describe_outcome(outcome: &DiagnosticOutcome, catalogs: &Catalogs) -> OutcomeLabel {
    match outcome {
        DiagnosticOutcome::Typology(outcome) => match catalogs.typology.category(&outcome.primary) {
            Some(category) => OutcomeLabel {
                emoji: category.emoji.clone(),
                name: category.name.clone(),
            },
            None => OutcomeLabel {
                emoji: "🎯".to_string(),
                name: outcome.primary.clone(),
            },
        },
        DiagnosticOutcome::Formula(outcome) => OutcomeLabel {
            emoji: outcome.band.emoji().to_string(),
            name: if outcome.title.is_empty() {
                outcome.band.as_str().to_string()
            } else {
                outcome.title.clone()
            },
        },
        DiagnosticOutcome::Rsp(outcome) => {
            let name_of = |code: RspCode| {
                catalogs
                    .rsp
                    .category(code)
                    .map(|category| category.name.clone())
                    .unwrap_or_else(|| code.as_str().to_string())
            };
            let emoji = catalogs
                .rsp
                .category(outcome.primary)
                .map(|category| category.emoji.clone())
                .unwrap_or_else(|| "🎯".to_string());

            let mut name = name_of(outcome.primary);
            if outcome.mixed {
                let others: Vec<String> = outcome.secondary.iter().map(|code| name_of(*code)).collect();
                name = format!("{name} (смешанный профиль: {})", others.join(", "));
            }
            OutcomeLabel { emoji, name }
        }
    }
}

/// Summary of a completed diagnostic, with the user's contact block when known.
pub fn test_result_message(
    record: &ResultRecord,
    catalogs: &Catalogs,
    lead: Option<&Lead>,
) -> OperatorMessage {
    let label = describe_outcome(&record.outcome, catalogs);
    let mut text = format!(
        "🧩 <b>Прохождение теста ({})</b>\n\n{} <b>Результат:</b> {}\n",
        record.product().display_name(),
        label.emoji,
        escape_html(&label.name)
    );

    if let DiagnosticOutcome::Formula(outcome) = &record.outcome {
        text.push_str(&format!("📊 <b>Сумма баллов:</b> {}\n", outcome.total));
    }

    if let Some(lead) = lead {
        text.push_str(&format!(
            "\n👤 <b>Пользователь:</b>\n• Имя: {}\n• Роль: {}\n• Компания: {}\n• Контакт: {}\n",
            escape_html(&lead.name),
            escape_html(or_unknown(lead.role.as_deref())),
            escape_html(or_unknown(lead.company.as_deref())),
            escape_html(&lead.contact),
        ));
    }

    text.push_str(&format!("\n🆔 ID: <code>{}</code>", record.user_id));

    OperatorMessage {
        kind: MessageKind::TestResult,
        user_id: record.user_id,
        text,
    }
}

pub fn new_lead_message(lead: &Lead, result: Option<&OutcomeLabel>) -> OperatorMessage {
    let mut text = format!(
        "📩 <b>Новая заявка ({})</b>\n\n👤 <b>Имя:</b> {}\n📞 <b>Контакт:</b> {}\n",
        escape_html(&lead.source),
        escape_html(&lead.name),
        escape_html(&lead.contact)
    );

    if let Some(role) = lead.role.as_deref() {
        text.push_str(&format!("💼 <b>Роль:</b> {}\n", escape_html(role)));
    }
    if let Some(company) = lead.company.as_deref() {
        text.push_str(&format!("🏢 <b>Компания:</b> {}\n", escape_html(company)));
    }
    if let Some(team_size) = lead.team_size.as_deref() {
        text.push_str(&format!("👥 <b>Команда:</b> {}\n", escape_html(team_size)));
    }
    if let Some(result) = result {
        text.push_str(&format!(
            "🎯 <b>Результат:</b> {}\n",
            escape_html(&result.text())
        ));
    }
    if let Some(request) = lead.request.as_deref() {
        text.push_str(&format!("\n💬 <b>Сообщение:</b>\n{}", escape_html(request)));
    }

    let user = match lead.username.as_deref() {
        Some(username) => format!("@{username}"),
        None => "без username".to_string(),
    };
    text.push_str(&format!(
        "\n\n<i>От:</i> {} (ID: <code>{}</code>)",
        escape_html(&user),
        lead.user_id
    ));

    OperatorMessage {
        kind: MessageKind::NewLead,
        user_id: lead.user_id,
        text,
    }
}

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or("Не указано")
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}
