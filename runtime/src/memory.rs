//! Storage for the variables of every program and function.
//!
//! Variables live in a single table and are referred to by [`VarId`].
//! A [`Place`] designates a variable or an element within it.
use std::fmt;

use stint_dsl::{
    common::{AddressAssignment, VariableClass},
    core::{Id, SourceSpan},
};

use crate::datatypes::TypeRef;
use crate::error::{Fault, ValueError};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: Id,
    pub class: VariableClass,
    /// The type. This is known once the linker resolves the type name.
    pub data_type: Option<TypeRef>,
    /// The value restored when the variable is reset. `None` means the
    /// default value of the type.
    pub initial: Option<Box<dyn Value>>,
    /// The current value. This exists once the header of the declaring
    /// unit is finalized.
    pub value: Option<Box<dyn Value>>,
    pub address: Option<AddressAssignment>,
    pub span: SourceSpan,
}

impl Variable {
    pub fn new(name: Id, class: VariableClass) -> Self {
        let span = name.span.clone();
        Self {
            name,
            class,
            data_type: None,
            initial: None,
            value: None,
            address: None,
            span,
        }
    }
}

/// Designates a variable or a nested element of the variable. The path
/// is the sequence of sub-value positions from the variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Place {
    pub var: VarId,
    pub path: Vec<usize>,
}

impl Place {
    pub fn variable(var: VarId) -> Self {
        Self { var, path: vec![] }
    }
}

#[derive(Debug, Default)]
pub struct Memory {
    variables: Vec<Option<Variable>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, variable: Variable) -> VarId {
        self.variables.push(Some(variable));
        VarId::new(self.variables.len() - 1)
    }

    /// Removes the variable. The identifier is not reused.
    pub fn release(&mut self, id: VarId) -> Option<Variable> {
        self.variables.get_mut(id.index()).and_then(Option::take)
    }

    pub fn get(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: VarId) -> Option<&mut Variable> {
        self.variables.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Iterates over the identifiers of every variable.
    pub fn ids(&self) -> impl Iterator<Item = VarId> + '_ {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, variable)| variable.is_some())
            .map(|(index, _)| VarId::new(index))
    }

    pub fn value(&self, id: VarId) -> Result<&dyn Value, Fault> {
        let variable = self.get(id).ok_or(Fault::VariableUnavailable(id))?;
        variable
            .value
            .as_deref()
            .ok_or_else(|| Fault::Uninitialized(variable.name.clone()))
    }

    pub fn value_mut(&mut self, id: VarId) -> Result<&mut dyn Value, Fault> {
        let variable = self.get_mut(id).ok_or(Fault::VariableUnavailable(id))?;
        match variable.value.as_deref_mut() {
            Some(value) => Ok(value as &mut dyn Value),
            None => Err(Fault::Uninitialized(variable.name.clone())),
        }
    }

    /// Restores the variable to the initial value.
    pub fn reset(&mut self, id: VarId) -> Result<(), Fault> {
        let variable = self.get_mut(id).ok_or(Fault::VariableUnavailable(id))?;
        let Variable {
            name,
            data_type,
            initial,
            value,
            ..
        } = variable;
        let value = value
            .as_deref_mut()
            .ok_or_else(|| Fault::Uninitialized(name.clone()))?;
        match (initial, data_type) {
            (Some(initial), _) => value.assign(initial.as_ref())?,
            (None, Some(data_type)) => data_type.reset_value(value)?,
            (None, None) => return Err(Fault::Uninitialized(name.clone())),
        }
        Ok(())
    }

    /// Creates a copy of the variable (including the current value) with
    /// a new identifier.
    pub fn duplicate(&mut self, id: VarId) -> Result<VarId, Fault> {
        let copy = self.get(id).ok_or(Fault::VariableUnavailable(id))?.clone();
        Ok(self.declare(copy))
    }

    pub fn resolve(&self, place: &Place) -> Result<&dyn Value, Fault> {
        let mut value = self.value(place.var)?;
        for index in &place.path {
            value = value.child(*index).ok_or(ValueError::NoSuchElement)?;
        }
        Ok(value)
    }

    pub fn resolve_mut(&mut self, place: &Place) -> Result<&mut dyn Value, Fault> {
        let mut value = self.value_mut(place.var)?;
        for index in &place.path {
            value = value.child_mut(*index).ok_or(ValueError::NoSuchElement)?;
        }
        Ok(value)
    }
}
