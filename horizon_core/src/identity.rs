// horizon_core/src/identity.rs

//! Deterministic addressing for variables, constraints and devices.
//!
//! Every id is a name-based (v5) UUID computed over canonical little-endian
//! bytes, so the same semantic fields always produce the same address,
//! across threads, process restarts and checkpoint round trips.

use crate::stamp::Stamp;
use uuid::Uuid;

/// The namespace all horizon ids are derived in.
const HORIZON_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_93d4_4a8e_b5c0_2d9e_71a4_0c35);

/// The device id used when a producer does not name its device.
pub const DEFAULT_DEVICE: Uuid = Uuid::nil();

/// Derives an id from free-form bytes.
pub fn from_bytes(bytes: &[u8]) -> Uuid {
    Uuid::new_v5(&HORIZON_NAMESPACE, bytes)
}

/// Derives an id from a name, e.g. a robot or sensor name used as a device id.
pub fn from_name(name: &str) -> Uuid {
    from_bytes(name.as_bytes())
}

/// Id of a time-indexed quantity: `(type, stamp, device_id)`.
pub fn for_stamped(type_name: &str, stamp: Stamp, device_id: Uuid) -> Uuid {
    let mut bytes = KeyBytes::new(type_name);
    bytes.push_i64(stamp.as_nanos());
    bytes.push_uuid(device_id);
    bytes.finish()
}

/// Id of a landmark-indexed quantity: `(type, landmark_id)`.
pub fn for_landmark(type_name: &str, landmark_id: u64) -> Uuid {
    let mut bytes = KeyBytes::new(type_name);
    bytes.push_u64(landmark_id);
    bytes.finish()
}

/// Id of a constraint: `(type, source, referenced variables, measurement bits)`.
pub fn for_constraint(type_name: &str, source: &str, variables: &[Uuid], mean: &[f64]) -> Uuid {
    let mut bytes = KeyBytes::new(type_name);
    bytes.push_str(source);
    for variable in variables {
        bytes.push_uuid(*variable);
    }
    for value in mean {
        bytes.push_u64(value.to_bits());
    }
    bytes.finish()
}

/// Length-prefixed canonical encoding of key fields.
struct KeyBytes(Vec<u8>);

impl KeyBytes {
    fn new(type_name: &str) -> Self {
        let mut bytes = Self(Vec::with_capacity(64));
        bytes.push_str(type_name);
        bytes
    }

    fn push_str(&mut self, value: &str) {
        self.push_u64(value.len() as u64);
        self.0.extend_from_slice(value.as_bytes());
    }

    fn push_u64(&mut self, value: u64) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn push_i64(&mut self, value: i64) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn push_uuid(&mut self, value: Uuid) {
        self.0.extend_from_slice(value.as_bytes());
    }

    fn finish(self) -> Uuid {
        from_bytes(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamped_ids_are_deterministic() {
        let stamp = Stamp::new(12345678, 910111213);
        let a = for_stamped("Position2DStamped", stamp, from_name("c3po"));
        let b = for_stamped("Position2DStamped", stamp, from_name("c3po"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_stamped_ids_differ_by_every_field() {
        let stamp = Stamp::new(12345678, 910111213);
        let base = for_stamped("Position2DStamped", stamp, from_name("r2d2"));
        assert_ne!(base, for_stamped("Position2DStamped", stamp, from_name("bb8")));
        assert_ne!(base, for_stamped("Position2DStamped", Stamp::new(12345678, 910111214), from_name("r2d2")));
        assert_ne!(base, for_stamped("Orientation2DStamped", stamp, from_name("r2d2")));
    }

    #[test]
    fn test_length_prefix_prevents_ambiguous_concatenation() {
        let a = for_constraint("ab", "c", &[], &[]);
        let b = for_constraint("a", "bc", &[], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_landmark_ids_are_name_based() {
        let first = for_landmark("Point3DLandmark", 7);
        assert_eq!(first, for_landmark("Point3DLandmark", 7));
        assert_eq!(first.get_version_num(), 5);
    }
}
