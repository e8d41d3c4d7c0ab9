//! Markup and text rendering for controller state. Every user-supplied value
//! passes through [`escape_html`] or [`escape_attr`] before interpolation.

use shared::{
    domain::{CarId, SessionId},
    protocol::VehicleRecord,
};

use crate::{
    chat::{Message, SessionListView},
    fleet::{ListView, VehicleForm},
};

pub const LOADING_TEXT: &str = "Loading vehicles...";
pub const EMPTY_TEXT: &str = "No vehicles found. Add your first vehicle!";
pub const FAILED_TEXT: &str = "Failed to load vehicles. Please try again.";

/// Escapes text placed between tags.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes text placed inside a quoted attribute value.
pub fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleCard {
    pub id: CarId,
    pub title: String,
    pub color: String,
    pub mileage: String,
    pub year: u32,
    pub available: bool,
    /// Values handed to `begin_edit` when this card's edit action fires.
    pub snapshot: VehicleForm,
}

impl VehicleCard {
    pub fn from_record(record: &VehicleRecord) -> Self {
        let fields = &record.fields;
        Self {
            id: record.id,
            title: format!("{} {}", fields.company, fields.model),
            color: fields.color.clone(),
            mileage: group_thousands(fields.kms),
            year: fields.year,
            available: fields.available,
            snapshot: VehicleForm::from(record),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.available {
            "Available"
        } else {
            "Unavailable"
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "#{} {} | {} | {} km | {} | {}",
            self.id,
            self.title,
            self.color,
            self.mileage,
            self.year,
            self.status()
        )
    }

    pub fn to_html(&self) -> String {
        let status_class = if self.available {
            "available"
        } else {
            "unavailable"
        };
        let snapshot = &self.snapshot;
        format!(
            concat!(
                "<div class=\"car-card\">",
                "<div class=\"car-info\">",
                "<h3>{title}</h3>",
                "<p><strong>Color:</strong> {color}</p>",
                "<p><strong>Mileage:</strong> {mileage} km</p>",
                "<p><strong>Year:</strong> {year}</p>",
                "<span class=\"status {status_class}\">{status}</span>",
                "</div>",
                "<div class=\"car-actions\">",
                "<button title=\"Edit Vehicle\" data-action=\"edit\" data-id=\"{id}\" ",
                "data-name=\"{company}\" data-model=\"{model}\" data-kms=\"{kms}\" ",
                "data-year=\"{year_attr}\" data-color=\"{color_attr}\" data-available=\"{available}\">",
                "</button>",
                "<button title=\"Delete Vehicle\" class=\"delete\" data-action=\"delete\" data-id=\"{id}\">",
                "</button>",
                "</div>",
                "</div>"
            ),
            title = escape_html(&self.title),
            color = escape_html(&self.color),
            mileage = escape_html(&self.mileage),
            year = self.year,
            status_class = status_class,
            status = self.status(),
            id = self.id,
            company = escape_attr(&snapshot.company),
            model = escape_attr(&snapshot.model),
            kms = escape_attr(&snapshot.kms),
            year_attr = escape_attr(&snapshot.year),
            color_attr = escape_attr(&snapshot.color),
            available = snapshot.available,
        )
    }
}

pub fn vehicle_cards(view: &ListView) -> Vec<VehicleCard> {
    view.records().iter().map(VehicleCard::from_record).collect()
}

pub fn render_vehicle_list(view: &ListView) -> String {
    match view {
        ListView::Loading => format!("<div class=\"loading\">{LOADING_TEXT}</div>"),
        ListView::Empty => format!("<div class=\"empty\"><p>{EMPTY_TEXT}</p></div>"),
        ListView::Failed(_) => format!("<div class=\"error\"><p>{FAILED_TEXT}</p></div>"),
        ListView::Records(_) => vehicle_cards(view)
            .iter()
            .map(VehicleCard::to_html)
            .collect(),
    }
}

pub fn render_session_item(session_id: &SessionId, active: bool) -> String {
    let class = if active {
        "session-item active"
    } else {
        "session-item"
    };
    format!(
        "<li id=\"id-{}\" class=\"{class}\"><span>{}</span></li>",
        escape_attr(session_id.as_str()),
        escape_html(session_id.as_str()),
    )
}

pub fn render_session_list(view: &SessionListView) -> String {
    view.sessions
        .iter()
        .map(|session_id| render_session_item(session_id, view.active.as_ref() == Some(session_id)))
        .collect()
}

pub fn render_message(message: &Message) -> String {
    format!(
        "<div class=\"message {}\">{}</div>",
        message.role.as_str(),
        escape_html(&message.text)
    )
}

pub fn render_transcript(messages: &[Message]) -> String {
    messages.iter().map(render_message).collect()
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
