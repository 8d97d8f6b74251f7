use mtk_io_snapshot::io::state::codec::Encoder;
use mtk_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotResult, SnapshotVersion, SnapshotWriter,
};
use pretty_assertions::assert_eq;

#[derive(Debug, Default, PartialEq)]
struct Counter {
    value: u32,
    armed: bool,
}

impl IoSnapshot for Counter {
    const DEVICE_ID: [u8; 4] = *b"CNTR";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 2);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_u32(1, self.value);
        w.field_bool(2, self.armed);
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        r.ensure_device_major(Self::DEVICE_VERSION.major)?;
        *self = Self::default();
        if let Some(v) = r.u32(1)? {
            self.value = v;
        }
        if let Some(v) = r.bool(2)? {
            self.armed = v;
        }
        Ok(())
    }
}

#[test]
fn unknown_tags_are_skipped() {
    let mut w = SnapshotWriter::new(Counter::DEVICE_ID, Counter::DEVICE_VERSION);
    w.field_u32(1, 42);
    w.field_bytes(77, Encoder::new().u64(1).u64(2).finish());

    let mut c = Counter::default();
    c.load_state(&w.finish()).unwrap();
    assert_eq!(
        c,
        Counter {
            value: 42,
            armed: false
        }
    );
}

#[test]
fn newer_minor_version_is_accepted() {
    let w = SnapshotWriter::new(Counter::DEVICE_ID, SnapshotVersion::new(1, 9));
    let mut c = Counter::default();
    c.load_state(&w.finish()).unwrap();
}

#[test]
fn device_major_mismatch_is_rejected() {
    let w = SnapshotWriter::new(Counter::DEVICE_ID, SnapshotVersion::new(2, 0));
    let err = Counter::default().load_state(&w.finish()).unwrap_err();
    assert_eq!(
        err,
        SnapshotError::UnsupportedDeviceMajorVersion {
            found: 2,
            supported: 1
        }
    );
}

#[test]
fn foreign_device_id_is_rejected() {
    let w = SnapshotWriter::new(*b"OTHR", Counter::DEVICE_VERSION);
    let err = Counter::default().load_state(&w.finish()).unwrap_err();
    assert!(matches!(err, SnapshotError::DeviceIdMismatch { .. }));
}

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = Counter::default().save_state();
    bytes[0] ^= 0xFF;
    let err = Counter::default().load_state(&bytes).unwrap_err();
    assert_eq!(err, SnapshotError::InvalidMagic);
}

#[test]
fn duplicate_tags_are_rejected() {
    let mut bytes = SnapshotWriter::new(Counter::DEVICE_ID, Counter::DEVICE_VERSION).finish();
    for _ in 0..2 {
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());
    }
    let err = Counter::default().load_state(&bytes).unwrap_err();
    assert_eq!(err, SnapshotError::DuplicateFieldTag(1));
}

#[test]
fn field_length_past_end_is_eof() {
    let mut bytes = SnapshotWriter::new(Counter::DEVICE_ID, Counter::DEVICE_VERSION).finish();
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    let err = Counter::default().load_state(&bytes).unwrap_err();
    assert_eq!(err, SnapshotError::UnexpectedEof);
}

#[test]
fn non_canonical_bool_is_rejected() {
    let mut w = SnapshotWriter::new(Counter::DEVICE_ID, Counter::DEVICE_VERSION);
    w.field_u8(2, 7);
    let err = Counter::default().load_state(&w.finish()).unwrap_err();
    assert_eq!(err, SnapshotError::InvalidFieldEncoding("bool field"));
}
