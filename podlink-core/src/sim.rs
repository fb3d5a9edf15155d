//! In-process simulated device.
//!
//! [`SimulatedDevice`] keeps its own copy of the device state and answers
//! commands the way the hardware does: type changes come back as a reset
//! item, moves come back as the renumbered layout, preset selection comes
//! back as the full payload. Faults can be injected for tests: failing
//! preset reads, refusing commands, dropping the link, and hooks that run
//! while a command is on the wire (to emit events mid-command).

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::Receiver;
use podlink_types::reduce::plan_move;
use podlink_types::{Catalog, Param, ParamTarget, PresetData, PresetId, SetId, SetList};

use crate::command::{DeviceCommand, DeviceEvent, DeviceResponse};
use crate::error::{PodError, TransportError};
use crate::transport::{DeviceInfo, DeviceProvider, EventHandler, Transport};

/// One line of the wire log.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEntry {
    /// The command reached the device.
    Sent(DeviceCommand),
    /// The device answered it.
    Answered(DeviceCommand),
    /// The device emitted an unsolicited event.
    Event(DeviceEvent),
}

type Hook = Box<dyn Fn(&DeviceCommand, &SimulatedDevice) + Send + Sync>;
type Rule = Box<dyn Fn(&DeviceCommand) -> Option<String> + Send + Sync>;
type Breaker = Box<dyn Fn(&DeviceCommand) -> bool + Send + Sync>;

#[derive(Default)]
struct Faults {
    failing_presets: HashSet<PresetId>,
    reject: Vec<Rule>,
    disconnect: Option<Breaker>,
    refuse_connect: bool,
    latency: Option<Duration>,
}

struct DeviceState {
    live: PresetData,
    current: PresetId,
    presets: BTreeMap<PresetId, PresetData>,
    sets: BTreeMap<SetId, SetList>,
}

pub struct SimulatedDevice {
    info: DeviceInfo,
    catalog: Catalog,
    state: Mutex<DeviceState>,
    faults: Mutex<Faults>,
    hooks: Mutex<Vec<Arc<Hook>>>,
    handler: Mutex<Option<EventHandler>>,
    wire: Mutex<Vec<WireEntry>>,
    closed: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimulatedDevice {
    /// A reference unit with factory presets.
    pub fn new(id: &str, name: &str) -> Arc<Self> {
        Self::with_catalog(id, name, Catalog::pod_hd())
    }

    pub fn with_catalog(id: &str, name: &str, catalog: Catalog) -> Arc<Self> {
        let layout = catalog.layout;
        let presets: BTreeMap<PresetId, PresetData> = layout
            .preset_ids()
            .map(|id| {
                let name = format!("Preset {}-{}", id.set, id.index);
                (id, catalog.blank_preset(&name))
            })
            .collect();
        let sets = layout
            .set_ids()
            .map(|set| {
                let members = layout.preset_ids().filter(|p| p.set == set).collect();
                (
                    set,
                    SetList {
                        name: format!("Set {}", set),
                        presets: members,
                    },
                )
            })
            .collect();
        let current = PresetId::default();
        let live = presets
            .get(&current)
            .cloned()
            .unwrap_or_else(|| catalog.blank_preset(""));

        Arc::new(Self {
            info: DeviceInfo::new(id, name),
            catalog,
            state: Mutex::new(DeviceState {
                live,
                current,
                presets,
                sets,
            }),
            faults: Mutex::new(Faults::default()),
            hooks: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
            wire: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// Reads of this preset (name or payload) are refused.
    pub fn fail_preset(&self, id: PresetId) {
        lock(&self.faults).failing_presets.insert(id);
    }

    /// Refuse every command for which `rule` returns a reason.
    pub fn reject_when<F>(&self, rule: F)
    where
        F: Fn(&DeviceCommand) -> Option<String> + Send + Sync + 'static,
    {
        lock(&self.faults).reject.push(Box::new(rule));
    }

    /// Drop the link when a command matching `breaker` is sent.
    pub fn disconnect_when<F>(&self, breaker: F)
    where
        F: Fn(&DeviceCommand) -> bool + Send + Sync + 'static,
    {
        lock(&self.faults).disconnect = Some(Box::new(breaker));
    }

    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.faults).refuse_connect = refuse;
    }

    /// Delay every answer.
    pub fn set_latency(&self, latency: Option<Duration>) {
        lock(&self.faults).latency = latency;
    }

    /// Run `hook` after a command is received and before it is answered.
    pub fn on_command<F>(&self, hook: F)
    where
        F: Fn(&DeviceCommand, &SimulatedDevice) + Send + Sync + 'static,
    {
        lock(&self.hooks).push(Arc::new(Box::new(hook)));
    }

    pub fn clear_faults(&self) {
        *lock(&self.faults) = Faults::default();
        lock(&self.hooks).clear();
    }

    // ------------------------------------------------------------------
    // Front panel
    // ------------------------------------------------------------------

    /// Change the device state as if from the front panel and report it.
    pub fn emit(&self, event: DeviceEvent) {
        self.apply_event(&event);
        lock(&self.wire).push(WireEntry::Event(event.clone()));
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Pull the cable: the link closes and a connection-lost event is raised.
    pub fn unplug(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            handler(DeviceEvent::ConnectionLost {
                reason: "device unplugged".to_string(),
            });
        }
    }

    fn apply_event(&self, event: &DeviceEvent) {
        let mut state = lock(&self.state);
        match event {
            DeviceEvent::Parameter { target, value } => {
                if let Some(p) = live_param(&mut state.live, *target) {
                    p.value = *value;
                }
            }
            DeviceEvent::Active { item, active } => {
                if let Some(i) = state.live.items.get_mut(item.index()) {
                    i.active = *active;
                }
            }
            DeviceEvent::ItemReplaced { item, state: new } => {
                if let Some(i) = state.live.items.get_mut(item.index()) {
                    *i = new.clone();
                }
            }
            DeviceEvent::Layout { placements } => {
                for (id, placement) in placements {
                    if let Some(i) = state.live.items.get_mut(id.index()) {
                        i.placement = *placement;
                    }
                }
            }
            DeviceEvent::Dt { dt, setting } => {
                if let Some(ch) = state.live.dt.get_mut(dt.get() as usize) {
                    ch.apply(*setting);
                }
            }
            DeviceEvent::PresetLoaded { id, data } => {
                state.live = data.clone();
                if let Some(id) = id {
                    state.current = *id;
                }
            }
            DeviceEvent::SetSelected { set } => state.current.set = *set,
            DeviceEvent::ConnectionLost { .. } => {}
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn wire(&self) -> Vec<WireEntry> {
        lock(&self.wire).clone()
    }

    /// Commands in the order they reached the device.
    pub fn sent(&self) -> Vec<DeviceCommand> {
        lock(&self.wire)
            .iter()
            .filter_map(|e| match e {
                WireEntry::Sent(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_wire(&self) {
        lock(&self.wire).clear();
    }

    pub fn live(&self) -> PresetData {
        lock(&self.state).live.clone()
    }

    pub fn current_preset(&self) -> PresetId {
        lock(&self.state).current
    }

    pub fn stored_preset(&self, id: PresetId) -> Option<PresetData> {
        lock(&self.state).presets.get(&id).cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        lock(&self.handler).is_some()
    }

    // ------------------------------------------------------------------
    // Command execution
    // ------------------------------------------------------------------

    fn execute(&self, command: &DeviceCommand) -> DeviceResponse {
        let failing = |id: &PresetId| lock(&self.faults).failing_presets.contains(id);
        let mut state = lock(&self.state);
        match command {
            DeviceCommand::QueryCatalog => DeviceResponse::Catalog(self.catalog.clone()),
            DeviceCommand::QueryPreset { id } | DeviceCommand::QueryPresetName { id }
                if failing(id) =>
            {
                DeviceResponse::Rejected(format!("read error on preset {}", id))
            }
            DeviceCommand::QueryPreset { id } => match state.presets.get(id) {
                Some(data) => DeviceResponse::Preset(data.clone()),
                None => DeviceResponse::Rejected(format!("no preset {}", id)),
            },
            DeviceCommand::QueryPresetName { id } => match state.presets.get(id) {
                Some(data) => DeviceResponse::Name(data.name.clone()),
                None => DeviceResponse::Rejected(format!("no preset {}", id)),
            },
            DeviceCommand::QueryCurrentPreset => DeviceResponse::Preset(state.live.clone()),
            DeviceCommand::QueryCurrentPresetName => DeviceResponse::Name(state.live.name.clone()),
            DeviceCommand::QueryCurrentPresetIndex => DeviceResponse::PresetIndex(state.current.index),
            DeviceCommand::QueryCurrentSetId => DeviceResponse::SetId(state.current.set),
            DeviceCommand::QuerySet { set } => match state.sets.get(set) {
                Some(list) => DeviceResponse::Set(list.clone()),
                None => DeviceResponse::Rejected(format!("no set {}", set)),
            },
            DeviceCommand::QuerySetName { set } => match state.sets.get(set) {
                Some(list) => DeviceResponse::Name(list.name.clone()),
                None => DeviceResponse::Rejected(format!("no set {}", set)),
            },

            DeviceCommand::SetParam { target, value } => match live_param(&mut state.live, *target) {
                Some(p) => {
                    p.value = *value;
                    DeviceResponse::Ack
                }
                None => DeviceResponse::Rejected("no such parameter".to_string()),
            },
            DeviceCommand::SetParamBound { item, param, bound, value } => {
                match state
                    .live
                    .items
                    .get_mut(item.index())
                    .and_then(|i| i.param_mut(*param))
                {
                    Some(p) => {
                        p.set_bound(*bound, *value);
                        DeviceResponse::Ack
                    }
                    None => DeviceResponse::Rejected("no such parameter".to_string()),
                }
            }
            DeviceCommand::SetActive { item, active } => match state.live.items.get_mut(item.index()) {
                Some(i) => {
                    i.active = *active;
                    DeviceResponse::Ack
                }
                None => DeviceResponse::Rejected("no such item".to_string()),
            },
            DeviceCommand::SetDt { dt, setting } => match state.live.dt.get_mut(dt.get() as usize) {
                Some(ch) => {
                    ch.apply(*setting);
                    DeviceResponse::Ack
                }
                None => DeviceResponse::Rejected("no such DT channel".to_string()),
            },
            DeviceCommand::RenamePreset { name } => {
                state.live.name = name.clone();
                DeviceResponse::Ack
            }
            DeviceCommand::SetItemType { item, category, model } => {
                let Some(old) = state.live.items.get(item.index()) else {
                    return DeviceResponse::Rejected("no such item".to_string());
                };
                match self
                    .catalog
                    .make_item(old.kind, category, model, old.active, old.placement)
                {
                    Ok(new) => {
                        state.live.items[item.index()] = new.clone();
                        DeviceResponse::Item(new)
                    }
                    Err(e) => DeviceResponse::Rejected(e.to_string()),
                }
            }
            DeviceCommand::SetPosition { item, placement } => {
                match plan_move(&state.live.items, *item, *placement) {
                    Some(placements) => {
                        for (id, p) in &placements {
                            state.live.items[id.index()].placement = *p;
                        }
                        DeviceResponse::Layout(placements)
                    }
                    None => DeviceResponse::Rejected("invalid position".to_string()),
                }
            }
            DeviceCommand::SelectPreset { id } => match state.presets.get(id).cloned() {
                Some(data) => {
                    state.live = data.clone();
                    state.current = *id;
                    DeviceResponse::Preset(data)
                }
                None => DeviceResponse::Rejected(format!("no preset {}", id)),
            },
            DeviceCommand::StorePreset { id, data } => {
                if !self.catalog.layout.contains(*id) {
                    return DeviceResponse::Rejected(format!("no preset {}", id));
                }
                state.presets.insert(*id, data.clone());
                DeviceResponse::Ack
            }
        }
    }
}

fn live_param(live: &mut PresetData, target: ParamTarget) -> Option<&mut Param> {
    match target {
        ParamTarget::Item { item, param } => live.items.get_mut(item.index())?.param_mut(param),
        ParamTarget::Board { param } => live.board_params.get_mut(&param),
    }
}

impl Transport for SimulatedDevice {
    fn device(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn send(&self, command: &DeviceCommand) -> Result<DeviceResponse, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        lock(&self.wire).push(WireEntry::Sent(command.clone()));

        let (latency, drop_link, rejection) = {
            let faults = lock(&self.faults);
            (
                faults.latency,
                faults.disconnect.as_ref().is_some_and(|b| b(command)),
                faults.reject.iter().find_map(|rule| rule(command)),
            )
        };
        if drop_link {
            log::info!(target: "sim", "{} dropping link on {}", self.info.id, command.name());
            self.closed.store(true, Ordering::SeqCst);
            return Err(TransportError::Closed);
        }

        let hooks: Vec<Arc<Hook>> = lock(&self.hooks).clone();
        for hook in hooks {
            hook(command, self);
        }
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }

        let response = match rejection {
            Some(reason) => DeviceResponse::Rejected(reason),
            None => self.execute(command),
        };
        lock(&self.wire).push(WireEntry::Answered(command.clone()));
        Ok(response)
    }

    fn on_notification(&self, handler: Option<EventHandler>) {
        *lock(&self.handler) = handler;
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *lock(&self.handler) = None;
    }
}

/// Provider over a fixed list of simulated devices.
#[derive(Default)]
pub struct SimulatedProvider {
    devices: Mutex<Vec<Arc<SimulatedDevice>>>,
}

impl SimulatedProvider {
    pub fn new(devices: Vec<Arc<SimulatedDevice>>) -> Self {
        Self {
            devices: Mutex::new(devices),
        }
    }

    pub fn add(&self, device: Arc<SimulatedDevice>) {
        lock(&self.devices).push(device);
    }

    pub fn remove(&self, id: &str) {
        lock(&self.devices).retain(|d| d.info.id != id);
    }

    pub fn device(&self, id: &str) -> Option<Arc<SimulatedDevice>> {
        lock(&self.devices).iter().find(|d| d.info.id == id).cloned()
    }
}

impl DeviceProvider for SimulatedProvider {
    fn scan(&self) -> Receiver<DeviceInfo> {
        let (tx, rx) = crossbeam_channel::unbounded();
        for device in lock(&self.devices).iter() {
            let _ = tx.send(device.info.clone());
        }
        rx
    }

    fn connect(&self, id: &str) -> crate::Result<Arc<dyn Transport>> {
        let device = self
            .device(id)
            .ok_or_else(|| PodError::DeviceNotFound(id.to_string()))?;
        if lock(&device.faults).refuse_connect {
            return Err(PodError::ConnectionFailed(format!("{} refused the connection", id)));
        }
        device.closed.store(false, Ordering::SeqCst);
        log::info!(target: "sim", "connected to {}", id);
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlink_types::{ItemId, ItemKind, Path, Placement};

    #[test]
    fn type_change_resets_item() {
        let device = SimulatedDevice::new("sim", "Sim");
        let response = device
            .send(&DeviceCommand::SetItemType {
                item: ItemId::new(5),
                category: "Reverb".to_string(),
                model: "Plate".to_string(),
            })
            .unwrap();
        let DeviceResponse::Item(item) = response else {
            panic!("expected item, got {:?}", response);
        };
        assert_eq!(item.kind, ItemKind::Pedal);
        assert_eq!(item.model, "Plate");
        assert_eq!(item.placement.position, 5);
        assert_eq!(device.live().items[5].category, "Reverb");
    }

    #[test]
    fn move_returns_renumbered_layout() {
        let device = SimulatedDevice::new("sim", "Sim");
        let response = device
            .send(&DeviceCommand::SetPosition {
                item: ItemId::new(11),
                placement: Placement::new(4, Path::Pre),
            })
            .unwrap();
        let DeviceResponse::Layout(placements) = response else {
            panic!("expected layout");
        };
        assert_eq!(placements.len(), 12);
        assert_eq!(device.live().items[11].placement.position, 4);
    }

    #[test]
    fn failing_preset_is_refused() {
        let device = SimulatedDevice::new("sim", "Sim");
        let id = PresetId::new(0, 1);
        device.fail_preset(id);
        assert!(matches!(
            device.send(&DeviceCommand::QueryPreset { id }),
            Ok(DeviceResponse::Rejected(_))
        ));
        assert!(matches!(
            device.send(&DeviceCommand::QueryPreset { id: PresetId::new(0, 0) }),
            Ok(DeviceResponse::Preset(_))
        ));
    }

    #[test]
    fn closed_link_fails() {
        let device = SimulatedDevice::new("sim", "Sim");
        device.disconnect_when(|c| matches!(c, DeviceCommand::QueryCurrentSetId));
        assert_eq!(
            device.send(&DeviceCommand::QueryCurrentSetId),
            Err(TransportError::Closed)
        );
        assert_eq!(device.send(&DeviceCommand::QueryCatalog), Err(TransportError::Closed));
    }

    #[test]
    fn provider_reports_unknown_device() {
        let provider = SimulatedProvider::new(vec![SimulatedDevice::new("a", "A")]);
        let found: Vec<_> = provider.scan().iter().map(|d| d.id).collect();
        assert_eq!(found, vec!["a".to_string()]);
        assert!(matches!(provider.connect("b"), Err(PodError::DeviceNotFound(_))));
    }
}
