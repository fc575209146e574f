//! Property-based tests for the script image invariants.
//!
//! Buffers are drawn from a small alphabet of headers, small addresses and inline params so
//! that generated scripts actually contain entrypoints, branches and tables.

use byteorder::{ByteOrder, LittleEndian};
use lodscript_lib::{disassemble, BranchRole, ScriptError, ScriptMeta, ScriptMethod, ScriptParam};
use proptest::prelude::*;

fn word() -> impl Strategy<Value = u32> {
    prop_oneof![
        // small aligned addresses, usable as entrypoints and table displacements
        (0u32..16).prop_map(|n| n * 4),
        // headers with matching param counts
        Just(0x0000_0000u32), // yield
        Just(0x0000_0049),    // return
        Just(0x0000_0140),    // jmp
        Just(0x0000_0342),    // jmp_cmp_0
        Just(0x0000_0244),    // jmp_table
        Just(0x0000_0148),    // gosub
        Just(0x0000_024a),    // gosub_table
        Just(0x0000_0356),    // fork
        Just(0x0000_0138),    // call 0 with one arg
        // params
        (-8i16..8).prop_map(|d| 0x0900_0000 | d as u16 as u32),
        (0u32..4).prop_map(|n| 0x0d00_0000 | n << 16),
        Just(0x0200_0000u32),
        Just(0x1200_0000u32),
        any::<u32>(),
    ]
}

fn meta() -> ScriptMeta {
    ScriptMeta::new(vec![ScriptMethod {
        name: String::from("scriptGosubLater"),
        params: vec![ScriptParam { name: String::from("addr"), ty: String::from("int"), branch: BranchRole::Gosub }],
    }])
}

fn bytes(words: &[u32]) -> Vec<u8> {
    let mut out = vec![0; words.len() * 4];
    LittleEndian::write_u32_into(words, &mut out);
    out
}

proptest! {
    #[test]
    fn every_slot_holds_exactly_one_token(words in prop::collection::vec(word(), 0..48)) {
        match disassemble(&bytes(&words), &meta()) {
            Ok(script) => {
                prop_assert_eq!(script.len(), words.len());
                prop_assert!(script.is_complete());

                for index in 0..script.len() {
                    let token = script.slot(index).unwrap();
                    let start = token.offset() / 4;
                    prop_assert!(start <= index && index < start + token.width());
                }

                let covered: usize = script.entries().map(|t| t.width()).sum();
                prop_assert_eq!(covered, words.len());
            }
            // only structural CALL errors may abort a run, never a bounds failure
            Err(e) => prop_assert!(
                matches!(e, ScriptError::CallArgCount { .. } | ScriptError::UnknownMethod { .. }),
                "unexpected error: {}",
                e
            ),
        }
    }

    #[test]
    fn disassembly_is_deterministic(words in prop::collection::vec(word(), 0..48)) {
        let buf = bytes(&words);
        let first = disassemble(&buf, &meta());
        let second = disassemble(&buf, &meta());
        if let (Ok(a), Ok(b)) = (first, second) {
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn labels_are_unique_per_address(words in prop::collection::vec(word(), 0..48)) {
        if let Ok(script) = disassemble(&bytes(&words), &meta()) {
            for op in script.ops() {
                for param in &op.params {
                    if let (Some(label), Some(value)) = (&param.label, param.resolved) {
                        prop_assert_eq!(script.label(value as usize), Some(label.as_str()));
                    }
                }
            }
            prop_assert_eq!(script.labels().len(), script.label_count());
        }
    }
}
