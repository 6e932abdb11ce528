// Snapshot of the buffer layout for a small fixed model.
//
// Offsets assume 8-byte pointers.

#![cfg(target_pointer_width = "64")]

use curvegen::manifest::Manifest;
use curvegen::RegistryKind;

const MODEL: &str = r#"{
    "config": { "environment_capacity": 64 },
    "agent": [
        { "name": "x", "type": "float", "size": 4 },
        { "name": "id", "type": "int", "size": 4, "write": false }
    ],
    "message_out": [ { "name": "v", "type": "float", "size": 4, "elements": 3 } ],
    "message_in": [ { "name": "v", "type": "float", "size": 4, "elements": 3 } ],
    "new_agent": [ { "name": "id", "type": "int", "size": 4 } ]
}"#;

#[test]
fn snapshot_section_offsets() {
    let mut host = Manifest::from_json(MODEL).unwrap().build_host().unwrap();
    let offsets = host.compute_layout().unwrap();
    insta::assert_debug_snapshot!(offsets, @r###"
    SectionOffsets {
        environment_capacity: 64,
        agent: 64,
        message_out: 80,
        message_in: 88,
        new_agent: 96,
        total: 104,
    }
    "###);
}

#[test]
fn snapshot_agent_slots() {
    let mut host = Manifest::from_json(MODEL).unwrap().build_host().unwrap();
    host.compute_layout().unwrap();
    let report = host.layout().unwrap().report();
    let agent = &report.slots[&RegistryKind::Agent];
    insta::assert_debug_snapshot!(agent, @r###"
    [
        SlotReport {
            name: "id",
            ordinal: 0,
            offset: 64,
        },
        SlotReport {
            name: "x",
            ordinal: 1,
            offset: 72,
        },
    ]
    "###);
}
