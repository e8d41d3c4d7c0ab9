//! Resource list controller for `/cars/`.
//!
//! Owns the rendered vehicle list, the edit form and the [`EditSlot`] that
//! decides whether the next submit creates a record or updates one. All state
//! sits behind one mutex that is never held across a remote call, so the
//! form can be inspected (and its close path refused) while a save is out.

use std::{str::FromStr, sync::Arc};

use serde_json::Value;
use shared::{
    domain::CarId,
    protocol::{car_path, VehicleFields, VehicleRecord, CARS_PATH},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, FetchFailure, Result, ValidationFailure},
    remote::{json_body, RemoteAccess},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditSlot {
    /// Next submit creates a record.
    #[default]
    Empty,
    /// Next submit replaces this record.
    Editing(CarId),
}

/// Raw form input. Numeric fields stay as entered until submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleForm {
    pub company: String,
    pub model: String,
    pub color: String,
    pub kms: String,
    pub year: String,
    pub available: bool,
}

impl Default for VehicleForm {
    fn default() -> Self {
        Self {
            company: String::new(),
            model: String::new(),
            color: String::new(),
            kms: String::new(),
            year: String::new(),
            available: true,
        }
    }
}

impl From<&VehicleRecord> for VehicleForm {
    fn from(record: &VehicleRecord) -> Self {
        let fields = &record.fields;
        Self {
            company: fields.company.clone(),
            model: fields.model.clone(),
            color: fields.color.clone(),
            kms: fields.kms.to_string(),
            year: fields.year.to_string(),
            available: fields.available,
        }
    }
}

impl VehicleForm {
    pub fn validate(&self) -> Result<VehicleFields, ValidationFailure> {
        Ok(VehicleFields {
            company: self.company.clone(),
            model: self.model.clone(),
            color: self.color.clone(),
            kms: parse_whole_number("kms", &self.kms)?,
            year: parse_whole_number("year", &self.year)?,
            available: self.available,
        })
    }
}

fn parse_whole_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ValidationFailure> {
    raw.trim().parse::<T>().map_err(|_| ValidationFailure {
        field,
        value: raw.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub values: VehicleForm,
    pub submitting: bool,
    pub last_error: Option<ClientError>,
}

impl FormState {
    fn open(values: VehicleForm) -> Self {
        Self {
            values,
            submitting: false,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListView {
    #[default]
    Loading,
    Empty,
    Failed(String),
    Records(Vec<VehicleRecord>),
}

impl ListView {
    fn from_records(records: Vec<VehicleRecord>) -> Self {
        if records.is_empty() {
            ListView::Empty
        } else {
            ListView::Records(records)
        }
    }

    pub fn records(&self) -> &[VehicleRecord] {
        match self {
            ListView::Records(records) => records,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub enum FleetEvent {
    ListRendered(ListView),
    FormOpened { slot: EditSlot, values: VehicleForm },
    FormClosed,
    Error(String),
}

struct VehicleListState {
    view: ListView,
    edit_slot: EditSlot,
    form: Option<FormState>,
    refresh_seq: u64,
}

pub struct VehicleListController {
    remote: Arc<dyn RemoteAccess>,
    inner: Mutex<VehicleListState>,
    events: broadcast::Sender<FleetEvent>,
}

impl VehicleListController {
    pub fn new(remote: Arc<dyn RemoteAccess>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            remote,
            inner: Mutex::new(VehicleListState {
                view: ListView::default(),
                edit_slot: EditSlot::Empty,
                form: None,
                refresh_seq: 0,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FleetEvent> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> ListView {
        self.inner.lock().await.view.clone()
    }

    pub async fn edit_slot(&self) -> EditSlot {
        self.inner.lock().await.edit_slot
    }

    pub async fn form(&self) -> Option<FormState> {
        self.inner.lock().await.form.clone()
    }

    fn emit(&self, event: FleetEvent) {
        let _ = self.events.send(event);
    }

    /// Fetches the full collection and replaces the rendered list. Only the
    /// most recently issued refresh is allowed to render.
    pub async fn refresh_list(&self) -> Result<ListView> {
        let seq = {
            let mut guard = self.inner.lock().await;
            guard.refresh_seq += 1;
            guard.view = ListView::Loading;
            guard.refresh_seq
        };
        self.emit(FleetEvent::ListRendered(ListView::Loading));

        let outcome = self
            .remote
            .get(CARS_PATH)
            .await
            .and_then(decode_vehicle_list);

        let mut guard = self.inner.lock().await;
        if guard.refresh_seq != seq {
            debug!(seq, latest = guard.refresh_seq, "fleet: dropping superseded list result");
            return outcome.map(ListView::from_records).map_err(ClientError::from);
        }

        match outcome {
            Ok(records) => {
                info!(count = records.len(), "fleet: vehicle list loaded");
                let view = ListView::from_records(records);
                guard.view = view.clone();
                drop(guard);
                self.emit(FleetEvent::ListRendered(view.clone()));
                Ok(view)
            }
            Err(failure) => {
                warn!(error = %failure, "fleet: failed to load vehicles");
                let view = ListView::Failed(failure.to_string());
                guard.view = view.clone();
                drop(guard);
                self.emit(FleetEvent::ListRendered(view));
                self.emit(FleetEvent::Error(failure.to_string()));
                Err(failure.into())
            }
        }
    }

    pub async fn begin_create(&self) -> Result<()> {
        self.open_form(EditSlot::Empty, VehicleForm::default()).await
    }

    /// Opens the form for `car_id` using the values captured when the list
    /// was rendered. The record is not re-fetched.
    pub async fn begin_edit(&self, car_id: CarId, snapshot: VehicleForm) -> Result<()> {
        self.open_form(EditSlot::Editing(car_id), snapshot).await
    }

    async fn open_form(&self, slot: EditSlot, values: VehicleForm) -> Result<()> {
        {
            let mut guard = self.inner.lock().await;
            if guard.form.as_ref().is_some_and(|form| form.submitting) {
                return Err(ClientError::FormBusy);
            }
            guard.edit_slot = slot;
            guard.form = Some(FormState::open(values.clone()));
        }
        debug!(?slot, "fleet: form opened");
        self.emit(FleetEvent::FormOpened { slot, values });
        Ok(())
    }

    /// Explicit close or backdrop dismiss. Refused while the form's own save
    /// is outstanding.
    pub async fn close_form(&self) -> Result<()> {
        {
            let mut guard = self.inner.lock().await;
            if guard.form.as_ref().is_some_and(|form| form.submitting) {
                return Err(ClientError::FormBusy);
            }
            guard.edit_slot = EditSlot::Empty;
            guard.form = None;
        }
        self.emit(FleetEvent::FormClosed);
        Ok(())
    }

    pub async fn submit(&self, fields: VehicleForm) -> Result<()> {
        let (slot, payload) = {
            let mut guard = self.inner.lock().await;
            let slot = guard.edit_slot;
            let Some(form) = guard.form.as_mut() else {
                return Err(ClientError::FormNotOpen);
            };
            if form.submitting {
                return Err(ClientError::FormBusy);
            }
            form.values = fields;
            match form.values.validate() {
                Ok(payload) => {
                    form.submitting = true;
                    form.last_error = None;
                    (slot, payload)
                }
                Err(failure) => {
                    form.last_error = Some(failure.clone().into());
                    drop(guard);
                    warn!(field = failure.field, "fleet: rejected vehicle form");
                    self.emit(FleetEvent::Error(failure.to_string()));
                    return Err(failure.into());
                }
            }
        };

        let result = match slot {
            EditSlot::Empty => match json_body("POST", CARS_PATH, &payload) {
                Ok(body) => self.remote.post(CARS_PATH, Some(body)).await,
                Err(failure) => Err(failure),
            },
            EditSlot::Editing(car_id) => {
                let path = car_path(car_id);
                match json_body("PUT", &path, &payload) {
                    Ok(body) => self.remote.put(&path, body).await,
                    Err(failure) => Err(failure),
                }
            }
        };

        {
            let mut guard = self.inner.lock().await;
            match result {
                Ok(_) => {
                    info!(?slot, "fleet: vehicle saved");
                    guard.edit_slot = EditSlot::Empty;
                    guard.form = None;
                }
                Err(failure) => {
                    if let Some(form) = guard.form.as_mut() {
                        form.submitting = false;
                        form.last_error = Some(failure.clone().into());
                    }
                    drop(guard);
                    warn!(?slot, error = %failure, "fleet: failed to save vehicle");
                    self.emit(FleetEvent::Error(failure.to_string()));
                    return Err(failure.into());
                }
            }
        }
        self.emit(FleetEvent::FormClosed);

        // The save stands even if the follow-up read fails; that failure is
        // rendered into the list view.
        let _ = self.refresh_list().await;
        Ok(())
    }

    pub async fn remove(&self, car_id: CarId) -> Result<()> {
        if let Err(failure) = self.remote.delete(&car_path(car_id)).await {
            warn!(car_id = car_id.0, error = %failure, "fleet: failed to delete vehicle");
            self.emit(FleetEvent::Error(failure.to_string()));
            return Err(failure.into());
        }
        info!(car_id = car_id.0, "fleet: vehicle deleted");
        let _ = self.refresh_list().await;
        Ok(())
    }
}

fn decode_vehicle_list(body: Value) -> Result<Vec<VehicleRecord>, FetchFailure> {
    serde_json::from_value(body).map_err(|err| {
        FetchFailure::new("GET", CARS_PATH, format!("malformed vehicle list: {err}"))
    })
}

#[cfg(test)]
#[path = "tests/fleet_tests.rs"]
mod tests;
