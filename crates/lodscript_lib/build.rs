use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn workspace_root(crate_dir: &Path) -> PathBuf {
    crate_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("crate directory should be <root>/crates/<name>")
        .to_path_buf()
}

fn take_until_paren_close<'a>(s: &'a str) -> Option<&'a str> {
    let s = s.trim();
    let j = s.find(')')?;
    Some(s[..j].trim())
}

fn parse_byte(s: &str) -> u8 {
    match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).expect("hex byte"),
        None => s.parse().expect("decimal byte"),
    }
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let root = workspace_root(&manifest_dir);

    let opcode_path = root.join("catalog").join("opcodes.def");
    let param_path = root.join("catalog").join("params.def");

    println!("cargo:rerun-if-changed={}", opcode_path.display());
    println!("cargo:rerun-if-changed={}", param_path.display());

    let opcode_src = fs::read_to_string(&opcode_path).expect("read opcodes.def");
    let param_src = fs::read_to_string(&param_path).expect("read params.def");

    let mut ops: Vec<(String, u8, Vec<String>)> = Vec::new();
    for line in opcode_src.lines() {
        let l = line.trim();
        let rest = match l.strip_prefix("DEF(") {
            Some(v) => v,
            None => continue,
        };
        let inner = match take_until_paren_close(rest) {
            Some(v) => v,
            None => continue,
        };
        let parts: Vec<&str> = inner.split(',').map(|p| p.trim()).collect();
        if parts.len() < 2 {
            continue;
        }
        let id = parts[0].to_string();
        let opcode = parse_byte(parts[1]);
        let params = parts[2..].iter().map(|p| p.to_string()).collect();
        ops.push((id, opcode, params));
    }

    let mut params: Vec<(String, u8, u8, String)> = Vec::new();
    for line in param_src.lines() {
        let l = line.trim();
        let rest = match l.strip_prefix("PARAM(") {
            Some(v) => v,
            None => continue,
        };
        let inner = match take_until_paren_close(rest) {
            Some(v) => v,
            None => continue,
        };
        let parts: Vec<&str> = inner.split(',').map(|p| p.trim()).collect();
        if parts.len() != 4 {
            continue;
        }
        let id = parts[0].to_string();
        let code = parse_byte(parts[1]);
        let width = parse_byte(parts[2]);
        assert!((1..=3).contains(&width), "param {id} has unsupported width {width}");
        let class = match parts[3] {
            "value" => "Value",
            "runtime" => "Runtime",
            "inline" => "Inline",
            other => panic!("param {id} has unknown class {other}"),
        };
        params.push((id, code, width, class.to_string()));
    }

    assert!(ops.len() < 0xff, "too many opcodes for a byte index");
    assert!(params.len() < 0xff, "too many params for a byte index");

    let mut opcode_index = [0xffu8; 256];
    for (i, (id, opcode, _)) in ops.iter().enumerate() {
        assert_eq!(opcode_index[*opcode as usize], 0xff, "duplicate opcode for {id}");
        opcode_index[*opcode as usize] = i as u8;
    }

    let mut param_index = [0xffu8; 256];
    for (i, (id, code, _, _)) in params.iter().enumerate() {
        assert_eq!(param_index[*code as usize], 0xff, "duplicate param code for {id}");
        param_index[*code as usize] = i as u8;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let out_path = out_dir.join("script_tables.rs");

    let mut out = String::new();

    out.push_str("#[allow(non_camel_case_types)]\n");
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]\n");
    out.push_str("pub enum OpType {\n");
    for (id, _, _) in &ops {
        out.push_str(&format!("    {},\n", id.to_ascii_uppercase()));
    }
    out.push_str("}\n\n");

    out.push_str("#[allow(non_camel_case_types)]\n");
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]\n");
    out.push_str("pub enum ParamType {\n");
    for (id, _, _, _) in &params {
        out.push_str(&format!("    {},\n", id.to_ascii_uppercase()));
    }
    out.push_str("}\n\n");

    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n");
    out.push_str("pub enum ParamClass {\n    Value,\n    Runtime,\n    Inline,\n}\n\n");

    out.push_str("#[derive(Debug, Clone, Copy)]\n");
    out.push_str("pub struct OpInfo {\n");
    out.push_str("    pub name: &'static str,\n");
    out.push_str("    pub opcode: u8,\n");
    out.push_str("    pub ty: OpType,\n");
    out.push_str("    pub param_names: &'static [&'static str],\n");
    out.push_str("}\n\n");

    out.push_str("#[derive(Debug, Clone, Copy)]\n");
    out.push_str("pub struct ParamInfo {\n");
    out.push_str("    pub name: &'static str,\n");
    out.push_str("    pub code: u8,\n");
    out.push_str("    pub width: u8,\n");
    out.push_str("    pub ty: ParamType,\n");
    out.push_str("    pub class: ParamClass,\n");
    out.push_str("}\n\n");

    out.push_str("pub const OPCODE_INFO: &[OpInfo] = &[\n");
    for (id, opcode, names) in &ops {
        let names = names.iter().map(|n| format!("\"{n}\"")).collect::<Vec<_>>().join(", ");
        out.push_str(&format!(
            "    OpInfo {{ name: \"{}\", opcode: 0x{:02x}, ty: OpType::{}, param_names: &[{}] }},\n",
            id, opcode, id.to_ascii_uppercase(), names
        ));
    }
    out.push_str("];\n\n");

    out.push_str("pub const PARAM_INFO: &[ParamInfo] = &[\n");
    for (id, code, width, class) in &params {
        out.push_str(&format!(
            "    ParamInfo {{ name: \"{}\", code: 0x{:02x}, width: {}, ty: ParamType::{}, class: ParamClass::{} }},\n",
            id, code, width, id.to_ascii_uppercase(), class
        ));
    }
    out.push_str("];\n\n");

    out.push_str("pub const OPCODE_INDEX: [u8; 256] = [\n");
    for chunk in opcode_index.chunks(16) {
        let row = chunk.iter().map(|b| format!("0x{b:02x}")).collect::<Vec<_>>().join(", ");
        out.push_str(&format!("    {row},\n"));
    }
    out.push_str("];\n\n");

    out.push_str("pub const PARAM_INDEX: [u8; 256] = [\n");
    for chunk in param_index.chunks(16) {
        let row = chunk.iter().map(|b| format!("0x{b:02x}")).collect::<Vec<_>>().join(", ");
        out.push_str(&format!("    {row},\n"));
    }
    out.push_str("];\n");

    fs::write(out_path, out).expect("write generated script tables");
}
