use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ScriptError;

/// How a CALL argument is used by the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BranchRole {
    #[default]
    None,
    /// The argument is a subroutine address.
    Gosub,
    /// The argument is an address a forked script resumes at.
    Reentry,
}

impl TryFrom<String> for BranchRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("none") {
            Ok(BranchRole::None)
        } else if value.eq_ignore_ascii_case("gosub") {
            Ok(BranchRole::Gosub)
        } else if value.eq_ignore_ascii_case("reentry") {
            Ok(BranchRole::Reentry)
        } else {
            Err(format!("unknown branch role: {value}"))
        }
    }
}

impl From<BranchRole> for String {
    fn from(value: BranchRole) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BranchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchRole::None => write!(f, "none"),
            BranchRole::Gosub => write!(f, "gosub"),
            BranchRole::Reentry => write!(f, "reentry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptParam {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: String,
    #[serde(default)]
    pub branch: BranchRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMethod {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ScriptParam>,
}

/// Call-signature table, indexed by the header immediate of a CALL instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMeta {
    pub methods: Vec<ScriptMethod>,
}

impl ScriptMeta {
    pub fn new(methods: Vec<ScriptMethod>) -> Self {
        Self { methods }
    }

    pub fn from_yaml(src: &str) -> Result<Self, ScriptError> {
        Ok(serde_yaml::from_str(src)?)
    }

    pub fn method(&self, index: u16) -> Option<&ScriptMethod> {
        self.methods.get(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = r#"
methods:
  - name: scriptSetTimer
    params:
      - name: frames
        type: int
  - name: scriptRunLater
    params:
      - name: index
        type: int
        branch: none
      - name: addr
        type: int
        branch: GOSUB
      - name: resume
        type: int
        branch: Reentry
  - name: noArgs
"#;

    #[test]
    fn parses_methods_and_branch_roles() {
        let meta = ScriptMeta::from_yaml(META).unwrap();
        assert_eq!(meta.methods.len(), 3);

        let timer = meta.method(0).unwrap();
        assert_eq!(timer.params[0].branch, BranchRole::None);
        assert_eq!(timer.params[0].ty, "int");

        let later = meta.method(1).unwrap();
        let roles: Vec<_> = later.params.iter().map(|p| p.branch).collect();
        assert_eq!(roles, [BranchRole::None, BranchRole::Gosub, BranchRole::Reentry]);

        assert!(meta.method(2).unwrap().params.is_empty());
        assert!(meta.method(3).is_none());
    }

    #[test]
    fn rejects_unknown_branch_role() {
        let err = ScriptMeta::from_yaml("methods:\n  - name: a\n    params:\n      - name: x\n        branch: sideways\n");
        assert!(matches!(err, Err(ScriptError::Yaml(_))));
    }
}
