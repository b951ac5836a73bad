//! Managed node records
//!
//! The server answers a `nodes` request with a mapping of device group to
//! a list of node records. Records are normalized into [`Device`] snapshots:
//! absent descriptive fields become empty strings, absent numeric fields
//! become zero, and a record without an `_id` is rejected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Snapshot of one managed node as reported by the directory query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Opaque node identifier (e.g. `node//abc...`)
    pub id: String,
    /// Display name
    pub name: String,
    /// Operating system description
    pub os: String,
    /// Last known IP address
    pub ip: String,
    /// Icon identifier
    pub icon: u32,
    /// Connectivity flags (agent, CIRA, AMT, relay)
    pub conn: u32,
    /// Power state
    pub pwr: u32,
}

impl Device {
    /// Whether any connectivity flag is set
    pub fn is_online(&self) -> bool {
        self.conn != 0
    }
}

/// Raw node record as sent by the server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub rname: Option<String>,
    pub name: Option<String>,
    pub osdesc: Option<String>,
    pub ip: Option<String>,
    pub icon: Option<f64>,
    pub conn: Option<f64>,
    pub pwr: Option<f64>,
}

impl NodeRecord {
    /// Normalize into a [`Device`], rejecting records without an id
    pub fn into_device(self) -> Result<Device, ProtocolError> {
        let id = self.id.ok_or(ProtocolError::MissingField {
            action: "nodes",
            field: "_id",
        })?;

        Ok(Device {
            id,
            name: self.rname.or(self.name).unwrap_or_default(),
            os: self.osdesc.unwrap_or_default(),
            ip: self.ip.unwrap_or_default(),
            icon: as_flags(self.icon),
            conn: as_flags(self.conn),
            pwr: as_flags(self.pwr),
        })
    }
}

fn as_flags(value: Option<f64>) -> u32 {
    value.map(|v| v as u32).unwrap_or(0)
}

/// Flatten a `nodes` payload into devices
///
/// Order is group iteration order, then list order within each group.
/// Malformed groups and records are skipped with a warning.
pub fn parse_nodes(groups: &Map<String, Value>) -> Vec<Device> {
    let mut devices = Vec::new();

    for (group, nodes) in groups {
        let Some(nodes) = nodes.as_array() else {
            tracing::warn!("Skipping node group {}: not a list", group);
            continue;
        };

        for node in nodes {
            let record = match NodeRecord::deserialize(node) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping malformed node record in {}: {}", group, e);
                    continue;
                }
            };

            match record.into_device() {
                Ok(device) => devices.push(device),
                Err(e) => tracing::warn!("Skipping node record in {}: {}", group, e),
            }
        }
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn groups(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_descriptive_fields_default_to_empty() {
        let record: NodeRecord = serde_json::from_value(json!({ "_id": "node//1" })).unwrap();
        let device = record.into_device().unwrap();

        assert_eq!(device.id, "node//1");
        assert_eq!(device.name, "");
        assert_eq!(device.os, "");
        assert_eq!(device.ip, "");
        assert_eq!(device.pwr, 0);
        assert_eq!(device.conn, 0);
        assert!(!device.is_online());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let record: NodeRecord =
            serde_json::from_value(json!({ "rname": "web01", "conn": 1 })).unwrap();
        assert!(matches!(
            record.into_device(),
            Err(ProtocolError::MissingField { field: "_id", .. })
        ));
    }

    #[test]
    fn test_rname_preferred_over_name() {
        let record: NodeRecord = serde_json::from_value(json!({
            "_id": "node//1",
            "name": "ignored",
            "rname": "web01",
            "osdesc": "Ubuntu 22.04",
            "ip": "10.0.0.5",
            "icon": 1,
            "conn": 1,
            "pwr": 1
        }))
        .unwrap();

        let device = record.into_device().unwrap();
        assert_eq!(device.name, "web01");
        assert_eq!(device.os, "Ubuntu 22.04");
        assert_eq!(device.ip, "10.0.0.5");
        assert_eq!(device.icon, 1);
        assert!(device.is_online());
    }

    #[test]
    fn test_parse_nodes_group_then_list_order() {
        let payload = groups(json!({
            "mesh//alpha": [
                { "_id": "node//a1" },
                { "_id": "node//a2" },
                { "_id": "node//a3" }
            ],
            "mesh//beta": [
                { "_id": "node//b1" }
            ]
        }));

        let ids: Vec<_> = parse_nodes(&payload).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, ["node//a1", "node//a2", "node//a3", "node//b1"]);
    }

    #[test]
    fn test_parse_nodes_skips_bad_records() {
        let payload = groups(json!({
            "mesh//alpha": [
                { "rname": "no id" },
                "not an object",
                { "_id": "node//ok", "ip": 42 },
                { "_id": "node//good" }
            ],
            "mesh//broken": "not a list"
        }));

        let devices = parse_nodes(&payload);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "node//good");
    }
}
