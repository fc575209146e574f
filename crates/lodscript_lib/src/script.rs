use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Serializer};

use crate::tables::{OpType, ParamType};

/// Index of a token in the [`Script`] arena.
pub type TokenId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub offset: usize,
    pub ty: ParamType,
    pub raw: Vec<u32>,
    pub resolved: Option<i32>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Op {
    pub offset: usize,
    pub ty: OpType,
    pub header_param: u16,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Data {
    pub offset: usize,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entrypoint {
    pub offset: usize,
    pub target: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointerTable {
    pub offset: usize,
    pub destinations: Vec<usize>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Token {
    Op(Op),
    Param(Param),
    Data(Data),
    Entrypoint(Entrypoint),
    PointerTable(PointerTable),
}

impl Token {
    pub fn offset(&self) -> usize {
        match self {
            Token::Op(t) => t.offset,
            Token::Param(t) => t.offset,
            Token::Data(t) => t.offset,
            Token::Entrypoint(t) => t.offset,
            Token::PointerTable(t) => t.offset,
        }
    }

    /// Number of word slots the token occupies.
    pub fn width(&self) -> usize {
        match self {
            Token::Param(p) => p.raw.len(),
            _ => 1,
        }
    }
}

/// Word-indexed classification of a script buffer.
///
/// Every slot is claimed at most once and never cleared. After a full disassembly every slot
/// holds exactly one token; multi-word parameters hold the same token in consecutive slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    tokens: Vec<Token>,
    slots: Vec<Option<TokenId>>,
    labels: BTreeMap<usize, String>,
    label_count: usize,

    pub entrypoints: Vec<usize>,
    pub branches: BTreeSet<usize>,
    pub subs: BTreeSet<usize>,
    pub reentries: BTreeSet<usize>,
    pub jump_tables: BTreeSet<usize>,
    pub jump_table_dests: BTreeSet<usize>,
    pub sub_tables: BTreeSet<usize>,
    pub sub_table_dests: BTreeSet<usize>,
}

impl Script {
    pub fn new(word_count: usize) -> Self {
        Self {
            slots: vec![None; word_count],
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id]
    }

    pub fn slot_id(&self, index: usize) -> Option<TokenId> {
        self.slots.get(index).copied().flatten()
    }

    /// Token claiming word slot `index`, if any.
    pub fn slot(&self, index: usize) -> Option<&Token> {
        self.slot_id(index).map(|id| &self.tokens[id])
    }

    pub fn is_claimed(&self, index: usize) -> bool {
        self.slot_id(index).is_some()
    }

    /// True once every slot holds a token.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub(crate) fn push(&mut self, token: Token) -> TokenId {
        self.tokens.push(token);
        self.tokens.len() - 1
    }

    /// Claims `count` slots starting at `index` for `id`. Returns false without writing anything
    /// if any of them is out of range or already claimed.
    pub(crate) fn claim(&mut self, index: usize, count: usize, id: TokenId) -> bool {
        let Some(range) = self.slots.get_mut(index..index + count) else {
            return false;
        };
        if range.iter().any(Option::is_some) {
            return false;
        }
        range.fill(Some(id));
        true
    }

    /// Tokens in address order, one entry per token regardless of width.
    pub fn entries(&self) -> impl Iterator<Item = &Token> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, id)| {
            let token = &self.tokens[(*id)?];
            (token.offset() / 4 == index).then_some(token)
        })
    }

    pub fn ops(&self) -> impl Iterator<Item = &Op> + '_ {
        self.entries().filter_map(|t| match t {
            Token::Op(op) => Some(op),
            _ => None,
        })
    }

    /// Returns the label for `address`, registering one built by `make` if the address has none.
    /// `make` receives the anonymous label counter, which only advances on registration.
    pub fn add_label(&mut self, address: usize, make: impl FnOnce(usize) -> String) -> String {
        if let Some(existing) = self.labels.get(&address) {
            return existing.clone();
        }
        let name = make(self.label_count);
        self.label_count += 1;
        self.labels.insert(address, name.clone());
        name
    }

    pub fn label(&self, address: usize) -> Option<&str> {
        self.labels.get(&address).map(String::as_str)
    }

    pub fn labels(&self) -> &BTreeMap<usize, String> {
        &self.labels
    }

    pub fn label_count(&self) -> usize {
        self.label_count
    }
}

#[derive(Serialize)]
struct ScriptView<'a> {
    entrypoints: &'a [usize],
    branches: &'a BTreeSet<usize>,
    subs: &'a BTreeSet<usize>,
    reentries: &'a BTreeSet<usize>,
    jump_tables: &'a BTreeSet<usize>,
    jump_table_dests: &'a BTreeSet<usize>,
    sub_tables: &'a BTreeSet<usize>,
    sub_table_dests: &'a BTreeSet<usize>,
    labels: &'a BTreeMap<usize, String>,
    tokens: Vec<&'a Token>,
}

// Params are serialized inside their op rather than as standalone tokens.
impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ScriptView {
            entrypoints: &self.entrypoints,
            branches: &self.branches,
            subs: &self.subs,
            reentries: &self.reentries,
            jump_tables: &self.jump_tables,
            jump_table_dests: &self.jump_table_dests,
            sub_tables: &self.sub_tables,
            sub_table_dests: &self.sub_table_dests,
            labels: &self.labels,
            tokens: self.entries().filter(|t| !matches!(t, Token::Param(_))).collect(),
        }
        .serialize(serializer)
    }
}
