//! Backend commands queued from UI to backend worker.

use shared::domain::DraftEvent;

pub enum BackendCommand {
    Connect { server_url: String },
    Refresh,
    SubmitDraft { draft: DraftEvent },
    DismissAlert,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::Connect { .. } => "connect",
            BackendCommand::Refresh => "refresh",
            BackendCommand::SubmitDraft { .. } => "submit_draft",
            BackendCommand::DismissAlert => "dismiss_alert",
        }
    }
}
