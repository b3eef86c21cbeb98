//! Wiring of proxies and rooms from a configuration file

use normlight_core::{ConfigFile, FixtureCalibration};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{ControlError, Result};
use crate::proxy::ProxyController;
use crate::room::RoomController;
use crate::transport::{CommandSink, StatusSource};

/// Every proxy and room of one configuration
#[derive(Debug)]
pub struct Installation {
    proxies: HashMap<String, Arc<ProxyController>>,
    rooms: HashMap<String, RoomController>,
}

impl Installation {
    /// Validate `config`, create one proxy per fixture and one room per room
    /// entry.
    ///
    /// Each proxy is primed from `source` and keeps following it.
    pub async fn build(
        config: &ConfigFile,
        sink: Arc<dyn CommandSink>,
        source: Arc<dyn StatusSource>,
    ) -> Result<Self> {
        config.validate()?;

        let mut proxies = HashMap::new();
        for calibration in &config.fixtures {
            let proxy = Arc::new(ProxyController::new(
                calibration.clone(),
                Arc::clone(&sink),
                config.control.clone(),
            ));
            proxy.attach(Arc::clone(&source)).await;
            proxies.insert(calibration.target_id.clone(), proxy);
        }

        let mut rooms = HashMap::new();
        for room in &config.rooms {
            let members = room
                .members
                .iter()
                .map(|id| {
                    proxies
                        .get(id)
                        .cloned()
                        .ok_or_else(|| ControlError::UnknownTarget(id.clone()))
                })
                .collect::<Result<Vec<_>>>()?;
            rooms.insert(room.name.clone(), RoomController::new(room, members));
        }

        info!(
            "Installation ready: {} fixtures, {} rooms",
            proxies.len(),
            rooms.len()
        );
        Ok(Self { proxies, rooms })
    }

    pub fn proxy(&self, target_id: &str) -> Option<&Arc<ProxyController>> {
        self.proxies.get(target_id)
    }

    pub fn room(&self, name: &str) -> Option<&RoomController> {
        self.rooms.get(name)
    }

    /// Fixture ids, sorted
    pub fn proxy_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.proxies.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Room names, sorted
    pub fn room_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rooms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Swap the calibration of a configured fixture
    pub fn update_calibration(&self, calibration: FixtureCalibration) -> Result<()> {
        let proxy = self
            .proxies
            .get(&calibration.target_id)
            .ok_or_else(|| ControlError::UnknownTarget(calibration.target_id.clone()))?;
        proxy.update_calibration(calibration)
    }
}
