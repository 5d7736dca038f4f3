// ── Topology cache ──
//
// Holds the current snapshot of devices, links and groups, and resolves
// alert targets. The snapshot is replaced wholesale on refresh (single
// writer), so concurrent readers observe either the old or the new
// topology, never a mix.

mod purify;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::model::{
    DataSource, Device, DeviceId, DeviceStatus, FactsBatch, Group, GroupId, ItemId, Link, LinkId,
};

/// One immutable version of the topology.
#[derive(Debug, Default)]
pub struct TopologySnapshot {
    pub devices: HashMap<DeviceId, Arc<Device>>,
    pub links: HashMap<LinkId, Arc<Link>>,
    pub groups: HashMap<GroupId, Group>,
    pub last_update: Option<DateTime<Utc>>,
}

/// An alert target resolved from the topology.
#[derive(Debug, Clone)]
pub enum TopologyItem {
    Device(Arc<Device>),
    Group(Group),
}

/// Snapshot-swapped cache of the monitored fleet.
///
/// The cache performs no I/O: the refresh collaborator fetches rows and
/// calls [`update`](Self::update); [`should_update`](Self::should_update)
/// is advisory only.
pub struct TopologyCache {
    snapshot: ArcSwap<TopologySnapshot>,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(TopologySnapshot::default()),
        }
    }

    /// Replace the whole snapshot and stamp `last_update`.
    ///
    /// Cycle purification runs over the incoming groups before the swap,
    /// so readers never observe a cyclic membership graph.
    pub fn update(
        &self,
        devices: HashMap<DeviceId, Device>,
        links: HashMap<LinkId, Link>,
        mut groups: HashMap<GroupId, Group>,
    ) {
        purify::purify_groups(&mut groups);

        let snapshot = TopologySnapshot {
            devices: devices.into_iter().map(|(id, d)| (id, Arc::new(d))).collect(),
            links: links.into_iter().map(|(id, l)| (id, Arc::new(l))).collect(),
            groups,
            last_update: Some(Utc::now()),
        };

        debug!(
            devices = snapshot.devices.len(),
            links = snapshot.links.len(),
            groups = snapshot.groups.len(),
            "topology snapshot replaced"
        );
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        self.snapshot.load_full()
    }

    /// Resolve an item id to a device or group; devices take precedence.
    pub fn get_item(&self, id: ItemId) -> Option<TopologyItem> {
        let snap = self.snapshot.load();
        if let Some(device) = snap.devices.get(&id) {
            return Some(TopologyItem::Device(Arc::clone(device)));
        }
        snap.groups.get(&id).cloned().map(TopologyItem::Group)
    }

    pub fn get_device(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.snapshot.load().devices.get(&id).cloned()
    }

    pub fn get_group(&self, id: GroupId) -> Option<Group> {
        self.snapshot.load().groups.get(&id).cloned()
    }

    pub fn get_link(&self, id: LinkId) -> Option<Arc<Link>> {
        self.snapshot.load().links.get(&id).cloned()
    }

    pub fn device_by_hostname(&self, management_hostname: &str) -> Option<Arc<Device>> {
        let snap = self.snapshot.load();
        snap.devices
            .values()
            .find(|d| d.management_hostname == management_hostname)
            .cloned()
    }

    /// Transitive device membership of a group.
    ///
    /// Nested groups are expanded and their devices unioned in; each
    /// device appears once. Returns an empty vec for an unknown id.
    /// Terminates on any input: expansion tracks visited groups, and the
    /// snapshot was purified of back-edges at update time anyway.
    pub fn devices_in_group(&self, group_id: GroupId) -> Vec<Arc<Device>> {
        let snap = self.snapshot.load();
        if !snap.groups.contains_key(&group_id) {
            return Vec::new();
        }

        let mut visited: HashSet<GroupId> = HashSet::new();
        let mut found: HashSet<DeviceId> = HashSet::new();
        let mut devices = Vec::new();
        let mut queue: VecDeque<GroupId> = VecDeque::new();

        visited.insert(group_id);
        queue.push_back(group_id);

        while let Some(gid) = queue.pop_front() {
            let Some(group) = snap.groups.get(&gid) else {
                continue;
            };

            for &member in &group.members {
                if let Some(device) = snap.devices.get(&member) {
                    if found.insert(member) {
                        devices.push(Arc::clone(device));
                    }
                } else if snap.groups.contains_key(&member) && visited.insert(member) {
                    queue.push_back(member);
                }
            }
        }

        devices
    }

    /// Whether the snapshot is older than `ttl`. Advisory: the caller
    /// decides whether to refresh.
    pub fn should_update(&self, ttl: Duration) -> bool {
        match self.snapshot.load().last_update {
            Some(at) => (Utc::now() - at).to_std().is_ok_and(|age| age > ttl),
            None => true,
        }
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.snapshot.load().last_update
    }

    /// Hostnames of every device gathered via `source`, for the
    /// gathering backends to build their polling inventories from.
    pub fn inventory(&self, source: DataSource) -> Vec<String> {
        self.snapshot
            .load()
            .devices
            .values()
            .filter(|d| d.configuration.data_sources.contains(&source))
            .map(|d| d.management_hostname.clone())
            .collect()
    }

    /// Fold a facts batch into the snapshot: per-device `metadata` and
    /// reachability are updated between full refreshes.
    ///
    /// Runs as a read-copy-update by the facts loop (the only
    /// incremental writer), so readers still see whole snapshots.
    pub fn record_facts(&self, batch: &FactsBatch) {
        self.snapshot.rcu(|snap| {
            let mut devices = snap.devices.clone();
            for device in devices.values_mut() {
                let Some(Value::Object(facts)) = batch.get(&device.management_hostname) else {
                    continue;
                };
                let mut updated = Device::clone(device);
                updated.status = DeviceStatus::Reachable;
                for (key, value) in facts {
                    updated.metadata.insert(key.clone(), value.clone());
                }
                *device = Arc::new(updated);
            }
            Arc::new(TopologySnapshot {
                devices,
                links: snap.links.clone(),
                groups: snap.groups.clone(),
                last_update: snap.last_update,
            })
        });
    }
}

impl Default for TopologyCache {
    fn default() -> Self {
        Self::new()
    }
}
