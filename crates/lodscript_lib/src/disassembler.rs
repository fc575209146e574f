//! Control-flow recovering disassembler.
//!
//! Scripts carry no function table and no section lengths. The only roots are up to
//! [`MAX_ENTRYPOINTS`] code addresses at the start of the buffer; everything else is found by
//! following branches out of those roots. Words never reached are classified as data at the end.

use log::{debug, info, warn};

use crate::catalog::{self, Flow};
use crate::meta::{BranchRole, ScriptMeta};
use crate::script::{Data, Entrypoint, Op, Param, PointerTable, Script, Token};
use crate::state::Cursor;
use crate::tables::{OpType, ParamInfo, ParamType};
use crate::ScriptError;

pub const MAX_ENTRYPOINTS: usize = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    ty: OpType,
    param_count: usize,
    header_param: u16,
}

/// Decodes an instruction header word: opcode, declared param count, 16-bit immediate.
///
/// The declared count must match the catalog for everything except CALL, whose arity comes from
/// the call-signature metadata.
fn decode_header(word: u32) -> Option<Header> {
    let info = catalog::opcode_info((word & 0xff) as u8)?;
    let param_count = (word >> 8 & 0xff) as usize;
    if info.ty != OpType::CALL && info.param_count() != param_count {
        return None;
    }
    Some(Header {
        ty: info.ty,
        param_count,
        header_param: (word >> 16) as u16,
    })
}

/// Computes the statically known value of a parameter and moves the cursor past it.
fn resolve_param(cursor: &mut Cursor<'_>, info: &ParamInfo) -> Result<Option<i32>, ScriptError> {
    let header = cursor.header_offset() as i32;
    let value = match info.ty {
        ParamType::IMMEDIATE => Some(cursor.current_word()? as i32),
        ParamType::NEXT_IMMEDIATE => Some(cursor.word_at(cursor.current_offset() + 4)? as i32),
        ParamType::INLINE_1 | ParamType::INLINE_2 | ParamType::INLINE_3 => {
            let displacement = cursor.current_word()? as i16 as i32;
            Some(header + displacement * 4)
        }
        ParamType::INLINE_4 | ParamType::INLINE_6 | ParamType::INLINE_7 => Some(header + 4),
        ParamType::INLINE_5 => {
            let displacement = cursor.current_word()? as i16 as i32;
            Some(header + (displacement + cursor.param2()) * 4)
        }
        _ => None,
    };

    cursor.advance(info.width());
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Jump,
    Sub,
}

pub struct Disassembler<'m> {
    meta: &'m ScriptMeta,
}

impl<'m> Disassembler<'m> {
    pub fn new(meta: &'m ScriptMeta) -> Self {
        Self { meta }
    }

    pub fn disassemble(&self, bytes: &[u8]) -> Result<Script, ScriptError> {
        let cursor = Cursor::new(bytes);
        if bytes.len() != cursor.len() {
            warn!("Ignoring {} trailing bytes after the last whole word", bytes.len() - cursor.len());
        }

        let mut state = Probe {
            meta: self.meta,
            cursor,
            script: Script::new(cursor.word_count()),
        };

        state.find_entrypoints()?;

        for entrypoint in state.script.entrypoints.clone() {
            state.probe_branch(entrypoint)?;
        }

        state.fill_data()?;

        let script = state.script;
        info!(
            "Probing complete: {} entrypoints, {} branches, {} subs, {} reentries, {} tables",
            script.entrypoints.len(),
            script.branches.len(),
            script.subs.len(),
            script.reentries.len(),
            script.jump_tables.len() + script.sub_tables.len(),
        );
        Ok(script)
    }
}

/// One disassembly run: the buffer, the metadata and the script image being built.
struct Probe<'a, 'm> {
    meta: &'m ScriptMeta,
    cursor: Cursor<'a>,
    script: Script,
}

impl Probe<'_, '_> {
    fn valid_op(&self, address: i64) -> Option<usize> {
        let offset = self.cursor.word_offset(address)?;
        let word = self.cursor.word_at(offset).ok()?;
        decode_header(word).map(|_| offset)
    }

    fn branch_target(&self, value: i32, what: &str, at: usize) -> Option<usize> {
        let target = self.cursor.word_offset(value as i64);
        if target.is_none() {
            warn!("Skipping {what} at {at:x}: target {value:x} is misaligned or outside the script");
        }
        target
    }

    fn find_entrypoints(&mut self) -> Result<(), ScriptError> {
        let mut cursor = self.cursor;

        for i in 0..MAX_ENTRYPOINTS {
            if !cursor.has_more() {
                break;
            }

            let word = cursor.current_word()?;
            let Some(target) = self.valid_op(word as i64) else {
                break;
            };

            let label = self.script.add_label(target, |_| format!("ENTRYPOINT_{i}"));
            let id = self.script.push(Token::Entrypoint(Entrypoint {
                offset: cursor.current_offset(),
                target,
                label,
            }));
            self.script.claim(i, 1, id);
            self.script.entrypoints.push(target);
            cursor.advance(1);
        }

        debug!("Found {} entrypoints", self.script.entrypoints.len());
        Ok(())
    }

    /// Explores every instruction reachable from `start`.
    ///
    /// Jump successors are kept on an explicit stack; `branches` is the visited set, so each start
    /// is decoded at most once and cycles terminate. Subroutine, fork and CALL targets are probed
    /// before the next instruction is decoded: table decoding depends on which slots they claim.
    fn probe_branch(&mut self, start: usize) -> Result<(), ScriptError> {
        let mut pending = vec![start];

        while let Some(offset) = pending.pop() {
            if !self.script.branches.insert(offset) {
                continue;
            }

            debug!("Probing branch {offset:x}");
            let mut cursor = self.cursor;
            cursor.jump(offset);
            self.scan(cursor, &mut pending)?;
        }

        Ok(())
    }

    /// Decodes instructions linearly from the cursor until a terminal instruction, a resolved
    /// unconditional transfer, or undecodable bytes.
    fn scan(&mut self, mut cursor: Cursor<'_>, pending: &mut Vec<usize>) -> Result<(), ScriptError> {
        while cursor.has_more() {
            cursor.step();

            let Some(mut op) = self.decode_op(&mut cursor)? else {
                break;
            };

            if !self.claim_op(&mut op) {
                break;
            }

            let next = cursor.current_offset();
            let stop = match op.ty.flow() {
                Flow::Call => {
                    self.handle_call(&op)?;
                    false
                }
                Flow::Jump => match op.params.first().and_then(|p| p.resolved) {
                    Some(target) => {
                        pending.extend(self.branch_target(target, "JMP", op.offset));
                        true
                    }
                    None => {
                        warn!("Skipping JMP at {:x} due to unknowable parameter", op.offset);
                        false
                    }
                },
                Flow::JumpCmp => match op.params.last().and_then(|p| p.resolved) {
                    Some(target) => {
                        // pushed last so the fallthrough path is explored first
                        pending.extend(self.branch_target(target, op.ty.name(), op.offset));
                        pending.push(next);
                        true
                    }
                    None => {
                        warn!("Skipping {} at {:x} due to unknowable parameter", op.ty.name(), op.offset);
                        false
                    }
                },
                Flow::JumpTable => match op.params.get(1).and_then(|p| p.resolved) {
                    Some(table) => {
                        self.handle_relative_table(table, op.offset, TableKind::Jump)?;
                        true
                    }
                    None => {
                        warn!("Skipping JMP_TABLE at {:x} due to unknowable parameter", op.offset);
                        false
                    }
                },
                Flow::Gosub => {
                    match op.params.first().and_then(|p| p.resolved) {
                        Some(target) => {
                            if let Some(target) = self.branch_target(target, "GOSUB", op.offset) {
                                self.script.subs.insert(target);
                                self.probe_branch(target)?;
                            }
                        }
                        None => warn!("Skipping GOSUB at {:x} due to unknowable parameter", op.offset),
                    }
                    false
                }
                Flow::Fork => {
                    match op.params.first().and_then(|p| p.resolved) {
                        Some(target) => {
                            if let Some(target) = self.branch_target(target, "FORK", op.offset) {
                                self.script.reentries.insert(target);
                                self.probe_branch(target)?;
                            }
                        }
                        None => warn!("Skipping FORK at {:x} due to unknowable parameter", op.offset),
                    }
                    false
                }
                Flow::GosubTable => {
                    match op.params.get(1).and_then(|p| p.resolved) {
                        Some(table) => self.handle_relative_table(table, op.offset, TableKind::Sub)?,
                        None => warn!("Skipping GOSUB_TABLE at {:x} due to unknowable parameter", op.offset),
                    }
                    false
                }
                Flow::Terminal => true,
                // FORK_REENTER always lands on an entrypoint, and those are all probed
                Flow::ForkReenter | Flow::Plain => false,
            };

            if stop {
                break;
            }
        }

        Ok(())
    }

    /// Decodes the instruction at the cursor header, leaving the cursor after its last parameter.
    /// Returns `None` if the bytes are not a valid instruction.
    fn decode_op(&self, cursor: &mut Cursor<'_>) -> Result<Option<Op>, ScriptError> {
        let offset = cursor.header_offset();
        let word = cursor.current_word()?;
        let Some(header) = decode_header(word) else {
            warn!("Invalid instruction {word:08x} at {offset:x}, ending branch");
            return Ok(None);
        };
        cursor.advance(1);

        let mut params = Vec::with_capacity(header.param_count);
        for i in 0..header.param_count {
            if !cursor.has_more() {
                warn!("{} at {offset:x} is truncated at param {i}, ending branch", header.ty.name());
                return Ok(None);
            }

            let code = cursor.param_type()?;
            let Some(info) = catalog::param_info(code) else {
                warn!("{} at {offset:x} has unknown param type {code:#x}, ending branch", header.ty.name());
                return Ok(None);
            };

            if !cursor.has_words(info.width()) {
                warn!("{} at {offset:x} is truncated at param {i}, ending branch", header.ty.name());
                return Ok(None);
            }

            let param_offset = cursor.current_offset();
            let raw = (0..info.width())
                .map(|n| cursor.word_at(param_offset + n * 4))
                .collect::<Result<Vec<_>, _>>()?;
            let resolved = resolve_param(cursor, info)?;

            params.push(Param {
                offset: param_offset,
                ty: info.ty,
                raw,
                resolved,
                label: None,
            });
        }

        Ok(Some(Op {
            offset,
            ty: header.ty,
            header_param: header.header_param,
            params,
        }))
    }

    /// Claims the slots of a decoded op and its params and labels its inline targets. Returns
    /// false if the scan should end because the bytes already belong to something else.
    fn claim_op(&mut self, op: &mut Op) -> bool {
        let index = op.offset / 4;
        match self.script.slot(index) {
            Some(Token::Op(existing)) if existing.offset == op.offset => {
                // a linear scan is deterministic, so the rest of this run is already decoded
                debug!("Reached decoded code at {:x}", op.offset);
                return false;
            }
            Some(_) => {
                warn!("{} at {:x} overlaps an existing token, ending branch", op.ty.name(), op.offset);
                return false;
            }
            None => {}
        }

        let width: usize = op.params.iter().map(|p| p.raw.len()).sum();
        if (index + 1..index + 1 + width).any(|i| self.script.is_claimed(i)) {
            warn!("Params of {} at {:x} overlap an existing token, ending branch", op.ty.name(), op.offset);
            return false;
        }

        for param in &mut op.params {
            if !param.ty.info().is_inline() {
                continue;
            }
            if let Some(address) = param.resolved.and_then(|v| usize::try_from(v).ok()) {
                param.label = Some(self.script.add_label(address, |n| format!("LABEL_{n}")));
            }
        }

        let id = self.script.push(Token::Op(op.clone()));
        self.script.claim(index, 1, id);
        for param in &op.params {
            let id = self.script.push(Token::Param(param.clone()));
            self.script.claim(param.offset / 4, param.raw.len(), id);
        }

        true
    }

    fn handle_call(&mut self, op: &Op) -> Result<(), ScriptError> {
        let index = op.header_param;
        let meta = self.meta;
        let Some(method) = meta.method(index) else {
            return Err(ScriptError::UnknownMethod { offset: op.offset, index });
        };

        if method.params.len() != op.params.len() {
            return Err(ScriptError::CallArgCount {
                offset: op.offset,
                index,
                expected: method.params.len(),
                actual: op.params.len(),
            });
        }

        for (param, signature) in op.params.iter().zip(&method.params) {
            if signature.branch == BranchRole::None {
                continue;
            }

            let Some(value) = param.resolved else {
                warn!("Skipping CALL {} ({}) at {:x} due to unknowable parameter {}", index, method.name, op.offset, signature.name);
                continue;
            };

            let Some(target) = self.branch_target(value, &method.name, op.offset) else {
                continue;
            };

            if signature.branch == BranchRole::Gosub {
                self.script.subs.insert(target);
            } else {
                self.script.reentries.insert(target);
            }
            self.probe_branch(target)?;
        }

        Ok(())
    }

    /// Decodes a table of displacements relative to its own start.
    ///
    /// There is no length field. The table ends at the first entry whose slot is already claimed
    /// or whose destination is not a valid instruction, so each accepted destination is fully
    /// probed before the next entry is tested.
    fn handle_relative_table(&mut self, table: i32, at: usize, kind: TableKind) -> Result<(), ScriptError> {
        let Some(table) = self.branch_target(table, "table", at) else {
            return Ok(());
        };

        let tables = match kind {
            TableKind::Jump => &mut self.script.jump_tables,
            TableKind::Sub => &mut self.script.sub_tables,
        };
        if !tables.insert(table) {
            return Ok(());
        }

        let mut destinations = Vec::new();
        loop {
            let entry = table + destinations.len() * 4;
            if entry >= self.cursor.len() || self.script.is_claimed(entry / 4) {
                break;
            }

            let displacement = self.cursor.word_at(entry)? as i32;
            let Some(dest) = self.valid_op(table as i64 + displacement as i64 * 4) else {
                break;
            };

            match kind {
                TableKind::Jump => {
                    self.script.jump_table_dests.insert(dest);
                }
                TableKind::Sub => {
                    self.script.sub_table_dests.insert(dest);
                    self.script.subs.insert(dest);
                }
            }

            self.probe_branch(dest)?;
            destinations.push(dest);
        }

        debug!("Table at {table:x} has {} entries", destinations.len());

        let labels = destinations
            .iter()
            .enumerate()
            .map(|(i, &dest)| self.script.add_label(dest, |_| format!("JMP_{table:x}_{i}")))
            .collect();

        let id = self.script.push(Token::PointerTable(PointerTable {
            offset: table,
            destinations,
            labels,
        }));
        if !self.script.claim(table / 4, 1, id) {
            warn!("Table at {table:x} overlaps an existing token");
        }

        Ok(())
    }

    fn fill_data(&mut self) -> Result<(), ScriptError> {
        for index in 0..self.script.len() {
            if self.script.is_claimed(index) {
                continue;
            }

            let offset = index * 4;
            let value = self.cursor.word_at(offset)?;
            let id = self.script.push(Token::Data(Data { offset, value }));
            self.script.claim(index, 1, id);
        }

        Ok(())
    }
}
