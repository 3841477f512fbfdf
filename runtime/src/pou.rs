//! Program organization units: the functions and programs that a host
//! can invoke.
use std::fmt;

use stint_dsl::core::{Id, SourceSpan};

use crate::memory::{Memory, VarId};
use crate::unit::UnitId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PouId(u32);

impl PouId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PouId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PouKind {
    Function,
    Program,
}

#[derive(Clone, Debug)]
pub struct Pou {
    pub name: Id,
    pub kind: PouKind,
    /// Every variable declared by the unit, in declaration order.
    pub variables: Vec<VarId>,
    pub inputs: Vec<VarId>,
    pub outputs: Vec<VarId>,
    /// The variable that holds the value of a function.
    pub result: Option<VarId>,
    /// The statement list of the body once the body is built.
    pub body: Option<UnitId>,
    /// The program that this program was instantiated from.
    pub instance_of: Option<PouId>,
    pub span: SourceSpan,
}

impl Pou {
    pub fn new(name: Id, kind: PouKind) -> Self {
        let span = name.span.clone();
        Self {
            name,
            kind,
            variables: vec![],
            inputs: vec![],
            outputs: vec![],
            result: None,
            body: None,
            instance_of: None,
            span,
        }
    }

    pub fn is_function(&self) -> bool {
        self.kind == PouKind::Function
    }

    /// Finds the variable of this unit with the name.
    pub fn variable(&self, memory: &Memory, name: &Id) -> Option<VarId> {
        self.variables
            .iter()
            .copied()
            .find(|id| memory.get(*id).is_some_and(|var| var.name == *name))
    }

    pub fn input(&self, memory: &Memory, name: &Id) -> Option<VarId> {
        Self::find(&self.inputs, memory, name)
    }

    pub fn output(&self, memory: &Memory, name: &Id) -> Option<VarId> {
        Self::find(&self.outputs, memory, name)
    }

    fn find(ids: &[VarId], memory: &Memory, name: &Id) -> Option<VarId> {
        ids.iter()
            .copied()
            .find(|id| memory.get(*id).is_some_and(|var| var.name == *name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Variable;
    use stint_dsl::common::VariableClass;

    #[test]
    fn variable_when_different_case_then_found() {
        let mut memory = Memory::new();
        let level = memory.declare(Variable::new(Id::from("Level"), VariableClass::Input));
        let mut pou = Pou::new(Id::from("Main"), PouKind::Program);
        pou.variables.push(level);
        pou.inputs.push(level);

        assert_eq!(Some(level), pou.variable(&memory, &Id::from("LEVEL")));
        assert_eq!(Some(level), pou.input(&memory, &Id::from("level")));
        assert_eq!(None, pou.output(&memory, &Id::from("level")));
    }
}
