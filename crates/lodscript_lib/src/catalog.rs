use crate::tables::{self, OpInfo, OpType, ParamClass, ParamInfo, ParamType};

/// Looks up the instruction shape for an opcode byte.
pub fn opcode_info(op: u8) -> Option<&'static OpInfo> {
    match tables::OPCODE_INDEX[op as usize] {
        0xff => None,
        idx => tables::OPCODE_INFO.get(idx as usize),
    }
}

/// Looks up the encoding for a parameter-type code.
pub fn param_info(code: u8) -> Option<&'static ParamInfo> {
    match tables::PARAM_INDEX[code as usize] {
        0xff => None,
        idx => tables::PARAM_INFO.get(idx as usize),
    }
}

/// Control-flow effect of an instruction on the linear scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Arguments flagged in the call-signature metadata are branch targets.
    Call,
    /// Unconditional jump through the first parameter.
    Jump,
    /// Conditional jump through the last parameter.
    JumpCmp,
    /// Relative jump table addressed by the second parameter.
    JumpTable,
    /// Subroutine call through the first parameter.
    Gosub,
    /// Relative subroutine table addressed by the second parameter.
    GosubTable,
    /// Concurrent fork through the first parameter.
    Fork,
    /// Re-enters one of the entrypoints, which are probed anyway.
    ForkReenter,
    /// Ends the linear scan with no successors.
    Terminal,
    Plain,
}

impl OpType {
    pub fn flow(self) -> Flow {
        match self {
            OpType::CALL => Flow::Call,
            OpType::JMP => Flow::Jump,
            OpType::JMP_CMP | OpType::JMP_CMP_0 => Flow::JumpCmp,
            OpType::JMP_TABLE => Flow::JumpTable,
            OpType::GOSUB => Flow::Gosub,
            OpType::GOSUB_TABLE => Flow::GosubTable,
            OpType::FORK => Flow::Fork,
            OpType::FORK_REENTER => Flow::ForkReenter,
            OpType::REWIND | OpType::RETURN | OpType::DEALLOCATE | OpType::DEALLOCATE82 | OpType::CONSUME => Flow::Terminal,
            _ => Flow::Plain,
        }
    }

    /// `OpType` variants are generated in `OPCODE_INFO` order.
    pub fn info(self) -> &'static OpInfo {
        &tables::OPCODE_INFO[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

impl OpInfo {
    pub fn param_count(&self) -> usize {
        self.param_names.len()
    }
}

impl ParamInfo {
    pub fn is_inline(&self) -> bool {
        self.class == ParamClass::Inline
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }
}

impl ParamType {
    pub fn info(self) -> &'static ParamInfo {
        &tables::PARAM_INFO[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_lookup_matches_catalog() {
        let ret = opcode_info(0x49).unwrap();
        assert_eq!(ret.ty, OpType::RETURN);
        assert_eq!(ret.param_count(), 0);

        let jmp_cmp = opcode_info(0x41).unwrap();
        assert_eq!(jmp_cmp.ty, OpType::JMP_CMP);
        assert_eq!(jmp_cmp.param_count(), 4);

        assert!(opcode_info(0xff).is_none());
        assert!(opcode_info(0x05).is_none());
    }

    #[test]
    fn every_table_entry_is_reachable_by_code() {
        for info in tables::OPCODE_INFO {
            assert_eq!(opcode_info(info.opcode).map(|i| i.ty), Some(info.ty));
        }
        for info in tables::PARAM_INFO {
            assert_eq!(param_info(info.code).map(|i| i.ty), Some(info.ty));
        }
    }

    #[test]
    fn generated_types_index_their_own_entries() {
        for (i, info) in tables::OPCODE_INFO.iter().enumerate() {
            assert_eq!(info.ty as usize, i);
            assert_eq!(info.ty.info().opcode, info.opcode);
        }
        for (i, info) in tables::PARAM_INFO.iter().enumerate() {
            assert_eq!(info.ty as usize, i);
            assert_eq!(info.ty.info().code, info.code);
        }
    }

    #[test]
    fn param_classes() {
        let inline = param_info(0x09).unwrap();
        assert_eq!(inline.ty, ParamType::INLINE_1);
        assert!(inline.is_inline());
        assert_eq!(inline.width(), 1);

        let next = param_info(0x01).unwrap();
        assert_eq!(next.ty, ParamType::NEXT_IMMEDIATE);
        assert!(!next.is_inline());
        assert_eq!(next.width(), 2);

        assert!(param_info(0x7f).is_none());
    }

    #[test]
    fn flow_classes() {
        assert_eq!(OpType::JMP.flow(), Flow::Jump);
        assert_eq!(OpType::JMP_CMP_0.flow(), Flow::JumpCmp);
        assert_eq!(OpType::CONSUME.flow(), Flow::Terminal);
        assert_eq!(OpType::FORK_REENTER.flow(), Flow::ForkReenter);
        assert_eq!(OpType::MOV.flow(), Flow::Plain);
        assert_eq!(OpType::GOSUB_TABLE.name(), "gosub_table");
    }
}
