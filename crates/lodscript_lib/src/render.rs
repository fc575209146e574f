//! Human readable listing of a disassembled script.

use crate::script::{Op, Param, Script, Token};
use crate::state::Cursor;
use crate::tables::{OpType, ParamType};
use crate::{DisassembleOptions, ScriptError, ScriptMeta};

fn format_param(p: &Param) -> String {
    if let Some(label) = &p.label {
        return format!(":{label}");
    }

    match (p.ty, p.resolved) {
        (ParamType::IMMEDIATE | ParamType::NEXT_IMMEDIATE, Some(v)) => format!("0x{:x}", v),
        _ => {
            let raw = p.raw.iter().map(|w| format!("0x{:08x}", w)).collect::<Vec<_>>().join(", ");
            format!("{}[{}]", p.ty.name(), raw)
        }
    }
}

fn format_op(op: &Op, meta: &ScriptMeta) -> String {
    let mut args = op.params.iter().map(format_param).collect::<Vec<_>>();

    if op.ty == OpType::CALL {
        let name = meta.method(op.header_param).map(|m| m.name.as_str()).unwrap_or("?");
        args.insert(0, op.header_param.to_string());
        return format!("{:<14}{} ; {}", op.ty.name(), args.join(", "), name);
    }

    let args = args.join(", ");
    if args.is_empty() {
        op.ty.name().to_string()
    } else {
        format!("{:<14}{}", op.ty.name(), args)
    }
}

/// Renders one line per token in address order, with labels on their own line before the token
/// they name. Param tokens are folded into their op.
pub fn listing(script: &Script, bytes: &[u8], meta: &ScriptMeta, options: DisassembleOptions) -> Result<String, ScriptError> {
    let cursor = Cursor::new(bytes);
    let mut out = String::new();

    for token in script.entries() {
        let offset = token.offset();
        let body = match token {
            Token::Param(_) => continue,
            Token::Op(op) => format_op(op, meta),
            Token::Entrypoint(e) => format!("entrypoint    :{}", e.label),
            Token::Data(d) => format!("data          0x{:08x}", d.value),
            Token::PointerTable(t) => {
                let labels = t.labels.iter().map(|l| format!(":{l}")).collect::<Vec<_>>().join(", ");
                format!("table         [{}]", labels)
            }
        };

        if let Some(label) = script.label(offset) {
            out.push_str(&format!("\n{label}:\n"));
        }

        out.push_str(&format!("{:05x} ", offset));
        if options.hex_dump {
            let width = match token {
                Token::Op(op) => 1 + op.params.iter().map(|p| p.raw.len()).sum::<usize>(),
                t => t.width(),
            };
            for n in 0..width {
                out.push_str(&format!("{:08x} ", cursor.word_at(offset + n * 4)?));
            }
            out.push_str("| ");
        }
        out.push_str(&body);
        out.push('\n');
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Data;

    fn param(ty: ParamType, raw: Vec<u32>, resolved: Option<i32>, label: Option<&str>) -> Param {
        Param { offset: 4, ty, raw, resolved, label: label.map(String::from) }
    }

    #[test]
    fn params_prefer_labels_then_values() {
        assert_eq!(format_param(&param(ParamType::INLINE_1, vec![0x0900_0002], Some(8), Some("LABEL_0"))), ":LABEL_0");
        assert_eq!(format_param(&param(ParamType::IMMEDIATE, vec![0x2a], Some(0x2a), None)), "0x2a");
        assert_eq!(format_param(&param(ParamType::STORAGE, vec![0x0200_0003], None, None)), "storage[0x02000003]");
    }

    #[test]
    fn call_is_annotated_with_method_name() {
        let meta = ScriptMeta::from_yaml("methods:\n  - name: scriptSetTimer\n    params:\n      - name: frames\n").unwrap();
        let op = Op {
            offset: 0,
            ty: OpType::CALL,
            header_param: 0,
            params: vec![param(ParamType::IMMEDIATE, vec![3], Some(3), None)],
        };
        assert_eq!(format_op(&op, &meta), "call          0, 0x3 ; scriptSetTimer");
    }

    #[test]
    fn data_lines_with_hex_dump() {
        let bytes = [0x78, 0x56, 0x34, 0x12];
        let mut script = Script::new(1);
        let id = script.push(Token::Data(Data { offset: 0, value: 0x1234_5678 }));
        script.claim(0, 1, id);
        let options = DisassembleOptions { hex_dump: true, ..Default::default() };
        let out = listing(&script, &bytes, &ScriptMeta::default(), options).unwrap();
        assert_eq!(out, "00000 12345678 | data          0x12345678\n");
    }
}
