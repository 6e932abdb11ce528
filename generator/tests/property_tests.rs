// Property-based tests for layout and generation invariants.
//
// 1. Slot stability: slots follow name order, one pointer apart
// 2. Idempotent layout: recomputing without mutation changes nothing
// 3. Generation completeness: one getter block per readable variable
// 4. Round-trip: bytes written through a slot pointer land at the slot offset
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::collections::BTreeMap;

use curvegen::accessor::AccessorGenerator;
use curvegen::header::Access;
use curvegen::layout::POINTER_SIZE;
use curvegen::{CurveHost, GeneratorConfig, RegistryKind, VariableDecl};
use proptest::prelude::*;

// ── Generators ──────────────────────────────────────────────────────────────

/// Unique names mapped to a readable flag.
fn arb_variables() -> impl Strategy<Value = BTreeMap<String, bool>> {
    prop::collection::btree_map("[a-z_][a-z0-9_]{0,7}", any::<bool>(), 1..24)
}

fn arb_kind() -> impl Strategy<Value = RegistryKind> {
    prop_oneof![
        Just(RegistryKind::Agent),
        Just(RegistryKind::MessageIn),
        Just(RegistryKind::MessageOut),
        Just(RegistryKind::NewAgent),
    ]
}

/// Register in reverse name order so insertion order never matches slot order.
fn build(kind: RegistryKind, vars: &BTreeMap<String, bool>) -> CurveHost {
    let mut host = CurveHost::new(GeneratorConfig {
        environment_capacity: 128,
        ..Default::default()
    })
    .unwrap();
    for (name, &readable) in vars.iter().rev() {
        let mut decl = VariableDecl::of::<f32>(name.as_str());
        decl.read = readable;
        host.register_variable(kind, decl).unwrap();
    }
    host
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn slots_follow_name_order(kind in arb_kind(), vars in arb_variables()) {
        let mut host = build(kind, &vars);
        host.dynamic_header().unwrap();
        let section = host.layout().unwrap().offsets.section(kind);
        for (i, name) in vars.keys().enumerate() {
            let slot = host.slot_offset(kind, name).unwrap();
            prop_assert_eq!(slot, Some(section + i * POINTER_SIZE));
        }
    }

    #[test]
    fn layout_is_idempotent(kind in arb_kind(), vars in arb_variables()) {
        let mut host = build(kind, &vars);
        let first = host.compute_layout().unwrap();
        let second = host.compute_layout().unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(first.total, 128 + vars.len() * POINTER_SIZE);
    }

    #[test]
    fn one_getter_block_per_readable_variable(vars in arb_variables()) {
        let kind = RegistryKind::Agent;
        let mut host = build(kind, &vars);
        host.generate_header().unwrap();
        let text = AccessorGenerator::new(
            host.config(),
            host.layout().unwrap(),
            &host.registries().environment,
        )
        .accessor_body(kind, Access::Get);
        for (name, &readable) in &vars {
            let needle = format!("names_equal(name, \"{}\")", name);
            prop_assert_eq!(text.matches(&needle).count(), usize::from(readable));
        }
    }

    #[test]
    fn slot_pointer_round_trip(
        kind in arb_kind(),
        vars in arb_variables(),
        value in any::<usize>(),
    ) {
        let mut host = build(kind, &vars);
        host.dynamic_header().unwrap();
        let section = host.layout().unwrap().offsets.section(kind);
        let bytes = value.to_ne_bytes();
        for (ordinal, name) in vars.keys().enumerate() {
            let ptr = host.slot_pointer(kind, name).unwrap().unwrap();
            // SAFETY: the slot spans POINTER_SIZE bytes inside the live buffer.
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), POINTER_SIZE);
            }
            let at = section + ordinal * POINTER_SIZE;
            prop_assert_eq!(&host.buffer().unwrap()[at..at + POINTER_SIZE], &bytes[..]);
            prop_assert_eq!(host.read_slot(kind, name).unwrap(), value);
        }
    }
}
