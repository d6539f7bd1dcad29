use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use serde_json::Value;
use shared::domain::{DraftEvent, Event};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Text inputs of the creation form. Blank inputs stay out of the draft.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DraftForm {
    pub title: String,
    pub date: String,
    pub location: String,
    pub description: String,
}

impl DraftForm {
    pub fn to_draft(&self) -> DraftEvent {
        let mut draft = DraftEvent::new();
        for (field, value) in [
            ("title", &self.title),
            ("date", &self.date),
            ("location", &self.location),
            ("description", &self.description),
        ] {
            if !value.trim().is_empty() {
                draft.set(field, value.trim());
            }
        }
        draft
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct EventsBoardApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    server_url: String,
    events: Vec<Event>,
    form: DraftForm,
    alert: Option<UiError>,
    status: String,
}

impl EventsBoardApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>, server_url: String) -> Self {
        let mut app = Self {
            cmd_tx,
            ui_rx,
            server_url,
            events: Vec::new(),
            form: DraftForm::default(),
            alert: None,
            status: "Starting".to_string(),
        };
        app.connect();
        app
    }

    fn dispatch(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn connect(&mut self) {
        let server_url = self.server_url.trim().to_string();
        self.status = format!("Connecting to {server_url}");
        self.dispatch(BackendCommand::Connect { server_url });
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => self.status = message,
                UiEvent::EventsUpdated(events) => {
                    self.status = format!("{} upcoming events", events.len());
                    self.events = events;
                }
                UiEvent::DraftCleared => self.form.clear(),
                UiEvent::Error(error) => {
                    tracing::debug!(context = ?error.context(), message = error.message(), "showing ui error");
                    self.alert = Some(error);
                }
            }
        }
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Server");
                ui.text_edit_singleline(&mut self.server_url);
                if ui.button("Connect").clicked() {
                    self.connect();
                }
                if ui.button("Refresh").clicked() {
                    self.dispatch(BackendCommand::Refresh);
                }
                ui.separator();
                ui.weak(&self.status);
            });
        });
    }

    fn show_form(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("new_event_panel")
            .resizable(false)
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.heading("New event");
                ui.separator();
                egui::Grid::new("new_event_form")
                    .num_columns(2)
                    .spacing([8.0, 6.0])
                    .show(ui, |ui| {
                        ui.label("Title");
                        ui.text_edit_singleline(&mut self.form.title);
                        ui.end_row();
                        ui.label("Date");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.form.date).hint_text("YYYY-MM-DD"),
                        );
                        ui.end_row();
                        ui.label("Location");
                        ui.text_edit_singleline(&mut self.form.location);
                        ui.end_row();
                    });
                ui.label("Description");
                ui.add(egui::TextEdit::multiline(&mut self.form.description).desired_rows(4));
                ui.add_space(8.0);
                if ui.button("Add event").clicked() {
                    let draft = self.form.to_draft();
                    self.dispatch(BackendCommand::SubmitDraft { draft });
                }
            });
    }

    fn show_events(&self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Upcoming events");
            ui.separator();
            if self.events.is_empty() {
                ui.weak("No upcoming events");
                return;
            }
            egui::ScrollArea::vertical().show(ui, |ui| {
                for event in &self.events {
                    show_event(ui, event);
                    ui.separator();
                }
            });
        });
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(alert) = self.alert.as_ref() else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new(alert.title())
            .id(egui::Id::new("alert_window"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(alert.message());
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if dismissed {
            self.alert = None;
            self.dispatch(BackendCommand::DismissAlert);
        }
    }
}

fn show_event(ui: &mut egui::Ui, event: &Event) {
    let Some(title) = event.text("title") else {
        ui.monospace(Value::Object(event.0.clone()).to_string());
        return;
    };

    ui.horizontal(|ui| {
        ui.label(egui::RichText::new(title).strong());
        if let Some(location) = event.text("location") {
            ui.label(format!("@ {location}"));
        }
        if let Some(date) = event.text("date") {
            ui.weak(date.split('T').next().unwrap_or(date));
        }
    });
    if let Some(weather) = event
        .get("weather")
        .and_then(|w| w.get("description"))
        .and_then(Value::as_str)
    {
        ui.small(format!("Weather: {weather}"));
    }
    if let Some(description) = event.text("description").filter(|d| !d.is_empty()) {
        ui.label(description);
    }
}

impl eframe::App for EventsBoardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        self.show_top_bar(ctx);
        self.show_form(ctx);
        self.show_events(ctx);
        self.show_alert(ctx);

        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}
