//! The operation surface exposed to a UI layer.
//!
//! Every operation routes to the bound [`Session`] and fails with
//! `NotStarted` while nothing is bound. Amp, cab and pedal operations are
//! thin mappings onto the board-item operations; see
//! [`DeviceLayout`](podlink_types::DeviceLayout) for the id scheme.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use podlink_types::{
    DtField, DtId, ItemId, Notification, ParamBound, ParamId, ParamTarget, Pod, PresetId,
    SessionPhase,
};

use crate::config::Config;
use crate::error::Result;
use crate::notify::{Notifier, NotifyHandler};
use crate::registry::{DeviceRegistry, DeviceScan};
use crate::session::{QueryReport, Session};
use crate::transport::{DeviceInfo, DeviceProvider};

pub struct Controller {
    registry: DeviceRegistry,
    notifier: Arc<Notifier>,
}

impl Controller {
    pub fn new(provider: Arc<dyn DeviceProvider>, config: &Config) -> Self {
        let notifier = Arc::new(Notifier::new(config.notify()));
        let registry = DeviceRegistry::new(provider, Arc::clone(&notifier), config.session());
        Self { registry, notifier }
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.registry.session()
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Become the subscriber, replacing any previous one.
    pub fn subscribe(&self) -> Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Deliver notifications to `handler` on a dedicated thread. `None`
    /// unregisters.
    ///
    /// The handler may read the model and issue value writes, which return
    /// once queued. Under `Backpressure::Block` it must not call operations
    /// that wait for the device (structural writes, renames, queries, start
    /// and stop): their results are delivered behind the handler's own full
    /// queue.
    pub fn set_notify(&self, handler: Option<NotifyHandler>) {
        self.notifier.set_handler(handler);
    }

    // ========================================================================
    // Device lifecycle
    // ========================================================================

    pub fn list_devices(&self) -> DeviceScan {
        self.registry.list_devices()
    }

    pub fn start(&self, id: &str) -> Result<()> {
        self.registry.start(id)
    }

    pub fn stop(&self) {
        self.registry.stop();
    }

    pub fn is_started(&self) -> bool {
        self.registry.is_started()
    }

    pub fn get_current_device(&self) -> Option<DeviceInfo> {
        self.registry.current_device()
    }

    pub fn phase(&self) -> SessionPhase {
        self.registry
            .current()
            .map(|s| s.phase())
            .unwrap_or_default()
    }

    /// Wait until every command submitted so far has resolved.
    pub fn flush(&self) -> Result<()> {
        self.session()?.flush()
    }

    // ========================================================================
    // Model and catalog
    // ========================================================================

    pub fn get_pod(&self) -> Result<Arc<Pod>> {
        Ok(self.session()?.pod())
    }

    pub fn get_amp_type(&self) -> Result<Vec<String>> {
        Ok(self.session()?.amp_types())
    }

    pub fn get_cab_type(&self) -> Result<Vec<String>> {
        Ok(self.session()?.cab_types())
    }

    pub fn get_pedal_type(&self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.session()?.pedal_types())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn query_all_presets(&self, full: bool) -> Result<QueryReport> {
        self.session()?.query_all_presets(full)
    }

    pub fn query_all_sets(&self, full: bool) -> Result<QueryReport> {
        self.session()?.query_all_sets(full)
    }

    pub fn query_current_preset(&self, full: bool) -> Result<()> {
        self.session()?.query_current_preset(full)
    }

    pub fn query_current_preset_id(&self, full: bool) -> Result<()> {
        self.session()?.query_current_preset_id(full)
    }

    pub fn query_current_set_id(&self, full: bool) -> Result<()> {
        self.session()?.query_current_set_id(full)
    }

    pub fn query_preset(&self, full: bool, set: u8, index: u8) -> Result<()> {
        self.session()?.query_preset(full, set, index)
    }

    pub fn reload_preset(&self) -> Result<()> {
        self.session()?.reload_preset()
    }

    // ========================================================================
    // Presets
    // ========================================================================

    /// Load preset `index` of set `set` into the edit buffer.
    pub fn set_preset(&self, set: u8, index: u8) -> Result<()> {
        self.session()?.select_preset(PresetId::new(set, index))
    }

    pub fn set_current_preset_name(&self, name: &str) -> Result<()> {
        self.session()?.rename_current(name)
    }

    pub fn save_preset(&self) -> Result<()> {
        self.session()?.save()
    }

    // ========================================================================
    // Board items
    // ========================================================================

    pub fn set_pedal_board_item_active(&self, item: u16, active: bool) -> Result<()> {
        self.session()?.set_active(ItemId::new(item), active)
    }

    pub fn set_pedal_board_item_parameter_value(&self, item: u16, param: u16, value: &str) -> Result<()> {
        self.session()?
            .set_param(ParamTarget::item(ItemId::new(item), ParamId::new(param)), value)
    }

    pub fn set_pedal_board_item_parameter_value_min(&self, item: u16, param: u16, value: &str) -> Result<()> {
        self.session()?
            .set_param_bound(ItemId::new(item), ParamId::new(param), ParamBound::Min, value)
    }

    pub fn set_pedal_board_item_parameter_value_max(&self, item: u16, param: u16, value: &str) -> Result<()> {
        self.session()?
            .set_param_bound(ItemId::new(item), ParamId::new(param), ParamBound::Max, value)
    }

    /// Move an item. `path` is the wire code of the signal path.
    pub fn set_pedal_board_item_position(&self, item: u16, position: u16, path: u8) -> Result<()> {
        self.session()?.set_position(ItemId::new(item), position, path)
    }

    pub fn set_pedal_board_item_type(&self, item: u16, category: &str, model: &str) -> Result<()> {
        self.session()?.set_item_type(ItemId::new(item), category, model)
    }

    /// Write a global board parameter.
    pub fn set_pedal_board_parameter_value(&self, param: u16, value: &str) -> Result<()> {
        self.session()?.set_param(ParamTarget::board(ParamId::new(param)), value)
    }

    // ========================================================================
    // Amps, cabs, pedals
    // ========================================================================

    pub fn set_amp_active(&self, amp: u8, active: bool) -> Result<()> {
        let session = self.session()?;
        session.set_active(session.amp_item(amp)?, active)
    }

    pub fn set_amp_parameter_value(&self, amp: u8, param: u16, value: &str) -> Result<()> {
        let session = self.session()?;
        let item = session.amp_item(amp)?;
        session.set_param(ParamTarget::item(item, ParamId::new(param)), value)
    }

    pub fn set_amp_type(&self, amp: u8, model: &str) -> Result<()> {
        let session = self.session()?;
        session.set_item_type(session.amp_item(amp)?, "", model)
    }

    pub fn set_cab_parameter_value(&self, cab: u8, param: u16, value: &str) -> Result<()> {
        let session = self.session()?;
        let item = session.cab_item(cab)?;
        session.set_param(ParamTarget::item(item, ParamId::new(param)), value)
    }

    pub fn set_cab_type(&self, cab: u8, model: &str) -> Result<()> {
        let session = self.session()?;
        session.set_item_type(session.cab_item(cab)?, "", model)
    }

    pub fn set_pedal_active(&self, pedal: u8, active: bool) -> Result<()> {
        let session = self.session()?;
        session.set_active(session.pedal_item(pedal)?, active)
    }

    pub fn set_pedal_parameter_value(&self, pedal: u8, param: u16, value: &str) -> Result<()> {
        let session = self.session()?;
        let item = session.pedal_item(pedal)?;
        session.set_param(ParamTarget::item(item, ParamId::new(param)), value)
    }

    pub fn set_pedal_type(&self, pedal: u8, category: &str, model: &str) -> Result<()> {
        let session = self.session()?;
        session.set_item_type(session.pedal_item(pedal)?, category, model)
    }

    // ========================================================================
    // DT channels (by channel index, and `*2` by amp slot)
    // ========================================================================

    pub fn set_dt_class(&self, dt: u8, value: &str) -> Result<()> {
        self.session()?.set_dt(DtId::new(dt), DtField::Class, value)
    }

    pub fn set_dt_class2(&self, amp: u8, value: &str) -> Result<()> {
        self.session()?.set_dt_for_amp(amp, DtField::Class, value)
    }

    pub fn set_dt_mode(&self, dt: u8, value: &str) -> Result<()> {
        self.session()?.set_dt(DtId::new(dt), DtField::Mode, value)
    }

    pub fn set_dt_mode2(&self, amp: u8, value: &str) -> Result<()> {
        self.session()?.set_dt_for_amp(amp, DtField::Mode, value)
    }

    pub fn set_dt_topology(&self, dt: u8, value: &str) -> Result<()> {
        self.session()?.set_dt(DtId::new(dt), DtField::Topology, value)
    }

    pub fn set_dt_topology2(&self, amp: u8, value: &str) -> Result<()> {
        self.session()?.set_dt_for_amp(amp, DtField::Topology, value)
    }
}
