//! The table of declared data types.
//!
//! Declarations refer to other types by [`TypeId`]. A reference is empty
//! until the linker resolves the referenced name. Concrete types are
//! created on demand by walking the references; the walk tracks the
//! types it visits so that a type that refers to itself through its
//! ancestors or elements is an error rather than an endless walk.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use log::debug;
use stint_dsl::{
    common::{ConstantKind, IntegerLiteral, RealLiteral},
    core::{Id, Located, SourceSpan},
    diagnostic::{Diagnostic, Label},
};
use stint_problems::Problem;

use crate::datatypes::{
    bool_type, date_time_type, elementary_type, lint_type, lreal_type, string_type, time_type,
    ulint_type, ArrayType, BoolValue, DataType, DateTimeValue, DerivedType, Dimension,
    EnumerationType, IntegerKind, IntegerValue, RealKind, RealValue, StringValue, StructType,
    StructuredElement, TimeValue, TypeRef,
};
use crate::value::{Value, ValueClass};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: Id,
    pub data_type: Option<TypeId>,
    pub initial: Option<ConstantKind>,
}

#[derive(Clone, Debug)]
pub enum TypeDecl {
    Elementary(TypeRef),
    /// Derived from the base, possibly with a different initial value.
    Derived {
        base: Option<TypeId>,
        initial: Option<ConstantKind>,
    },
    Enumeration(TypeRef),
    Array {
        dimensions: Vec<Dimension>,
        element: Option<TypeId>,
    },
    Structure(Vec<FieldDecl>),
}

#[derive(Debug)]
struct TypeEntry {
    name: Id,
    decl: TypeDecl,
    concrete: Option<TypeRef>,
}

#[derive(Debug, Default)]
pub struct TypeTable {
    entries: Vec<TypeEntry>,
    names: HashMap<Id, TypeId>,
    /// Maps each enumeration value name to the enumerations that define it.
    enum_values: HashMap<Id, Vec<TypeId>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds the type declaration. Returns `None` if a type with the name
    /// already exists.
    pub fn declare(&mut self, name: Id, decl: TypeDecl) -> Option<TypeId> {
        if self.names.contains_key(&name) {
            return None;
        }
        let id = TypeId(self.entries.len() as u32);
        self.names.insert(name.clone(), id);
        self.entries.push(TypeEntry {
            name,
            decl,
            concrete: None,
        });
        Some(id)
    }

    /// Adds the enumeration and indexes the enumeration values.
    pub fn declare_enumeration(&mut self, enumeration: EnumerationType) -> Option<TypeId> {
        let values = enumeration.values().to_vec();
        let name = enumeration.name().clone();
        let id = self.declare(name, TypeDecl::Enumeration(Rc::new(enumeration)))?;
        for value in values {
            self.enum_values.entry(value).or_default().push(id);
        }
        Some(id)
    }

    /// Finds the type with the name. Elementary types are added the
    /// first time they are looked up.
    pub fn lookup(&mut self, name: &Id) -> Option<TypeId> {
        if let Some(id) = self.names.get(name) {
            return Some(*id);
        }
        let data_type = elementary_type(name)?;
        self.declare(data_type.name().clone(), TypeDecl::Elementary(data_type))
            .or_else(|| self.names.get(name).copied())
    }

    pub fn contains(&self, name: &Id) -> bool {
        self.names.contains_key(name) || elementary_type(name).is_some()
    }

    pub fn name(&self, id: TypeId) -> Option<&Id> {
        self.entries.get(id.index()).map(|entry| &entry.name)
    }

    /// Returns the enumerations that define the value name.
    pub fn enumerations_with_value(&self, value: &Id) -> &[TypeId] {
        self.enum_values
            .get(value)
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
    }

    pub fn set_base(&mut self, id: TypeId, target: TypeId) {
        if let Some(TypeEntry {
            decl: TypeDecl::Derived { base, .. },
            ..
        }) = self.entries.get_mut(id.index())
        {
            *base = Some(target);
        }
    }

    pub fn set_element(&mut self, id: TypeId, target: TypeId) {
        if let Some(TypeEntry {
            decl: TypeDecl::Array { element, .. },
            ..
        }) = self.entries.get_mut(id.index())
        {
            *element = Some(target);
        }
    }

    pub fn set_field(&mut self, id: TypeId, index: usize, target: TypeId) {
        if let Some(TypeEntry {
            decl: TypeDecl::Structure(fields),
            ..
        }) = self.entries.get_mut(id.index())
        {
            if let Some(field) = fields.get_mut(index) {
                field.data_type = Some(target);
            }
        }
    }

    /// Returns true if every type that the declaration refers to,
    /// directly or through other declarations, is bound.
    pub fn is_bound(&self, id: TypeId) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(entry) = self.entries.get(id.index()) else {
                return false;
            };
            let references = match &entry.decl {
                TypeDecl::Elementary(_) | TypeDecl::Enumeration(_) => vec![],
                TypeDecl::Derived { base, .. } => vec![*base],
                TypeDecl::Array { element, .. } => vec![*element],
                TypeDecl::Structure(fields) => fields.iter().map(|field| field.data_type).collect(),
            };
            for reference in references {
                match reference {
                    Some(reference) => pending.push(reference),
                    None => return false,
                }
            }
        }
        true
    }

    /// Forgets every concrete type so that they are created again from
    /// the (possibly changed) references.
    pub fn reset_resolved(&mut self) {
        for entry in self.entries.iter_mut() {
            if !matches!(entry.decl, TypeDecl::Elementary(_) | TypeDecl::Enumeration(_)) {
                entry.concrete = None;
            }
        }
    }

    /// Returns the concrete type for the declaration.
    pub fn concretize(&mut self, id: TypeId) -> Result<TypeRef, Diagnostic> {
        let mut visited = HashSet::new();
        self.concretize_visiting(id, &mut visited)
    }

    fn concretize_visiting(
        &mut self,
        id: TypeId,
        visited: &mut HashSet<TypeId>,
    ) -> Result<TypeRef, Diagnostic> {
        let entry = self
            .entries
            .get(id.index())
            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
        if let Some(concrete) = &entry.concrete {
            return Ok(concrete.clone());
        }
        let name = entry.name.clone();
        let decl = entry.decl.clone();

        if !visited.insert(id) {
            return Err(Diagnostic::problem(
                Problem::CircularTypeReference,
                Label::span(name.span(), "Type declaration"),
            )
            .with_context_id("type", &name));
        }
        let result = self.create(&name, decl, visited);
        visited.remove(&id);

        if let (Ok(concrete), Some(entry)) = (&result, self.entries.get_mut(id.index())) {
            debug!("Concretized type {} as {}", name, concrete.base_name());
            entry.concrete = Some(concrete.clone());
        }
        result
    }

    fn create(
        &mut self,
        name: &Id,
        decl: TypeDecl,
        visited: &mut HashSet<TypeId>,
    ) -> Result<TypeRef, Diagnostic> {
        let undeclared = |problem: Problem| {
            Diagnostic::problem(problem, Label::span(name.span(), "Type declaration"))
                .with_context_id("type", name)
        };
        match decl {
            TypeDecl::Elementary(data_type) | TypeDecl::Enumeration(data_type) => Ok(data_type),
            TypeDecl::Derived { base, initial } => {
                let base = base.ok_or_else(|| undeclared(Problem::ParentTypeNotDeclared))?;
                let base = self.concretize_visiting(base, visited)?;
                let initial = match initial {
                    Some(initial) => Some(self.initial_value_visiting(&initial, &base, visited)?),
                    None => None,
                };
                let derived =
                    DerivedType::new(name.clone(), base, initial.as_deref()).map_err(|err| {
                        undeclared(Problem::InitialValueInvalid)
                            .with_context("reason", &err.to_string())
                    })?;
                Ok(Rc::new(derived))
            }
            TypeDecl::Array {
                dimensions,
                element,
            } => {
                let element = element.ok_or_else(|| undeclared(Problem::UndefinedReference))?;
                let element = self.concretize_visiting(element, visited)?;
                Ok(Rc::new(ArrayType::new(name.clone(), dimensions, element)))
            }
            TypeDecl::Structure(fields) => {
                let mut elements = vec![];
                for field in fields {
                    let data_type = field
                        .data_type
                        .ok_or_else(|| undeclared(Problem::UndefinedReference))?;
                    let data_type = self.concretize_visiting(data_type, visited)?;
                    let initial = match &field.initial {
                        Some(initial) => {
                            Some(self.initial_value_visiting(initial, &data_type, visited)?)
                        }
                        None => None,
                    };
                    elements.push(StructuredElement {
                        name: field.name,
                        data_type,
                        initial,
                    });
                }
                Ok(Rc::new(StructType::new(name.clone(), elements)))
            }
        }
    }

    /// Finds and concretizes the named type.
    pub fn named_type(&mut self, name: &Id) -> Result<TypeRef, Diagnostic> {
        let mut visited = HashSet::new();
        self.named_type_visiting(name, &mut visited)
    }

    fn named_type_visiting(
        &mut self,
        name: &Id,
        visited: &mut HashSet<TypeId>,
    ) -> Result<TypeRef, Diagnostic> {
        match self.lookup(name) {
            Some(id) => self.concretize_visiting(id, visited),
            None => Err(Diagnostic::problem(
                Problem::UndefinedReference,
                Label::span(name.span(), "Type name"),
            )
            .with_context_id("type", name)),
        }
    }

    /// Creates the value of a constant and the type of the value. The
    /// hint is the type the constant is expected to have and determines
    /// the meaning of an enumerated value that is not qualified by a
    /// type name.
    pub fn constant(
        &mut self,
        constant: &ConstantKind,
        hint: Option<&TypeRef>,
    ) -> Result<(Box<dyn Value>, TypeRef), Diagnostic> {
        let mut visited = HashSet::new();
        self.constant_visiting(constant, hint, &mut visited)
    }

    fn constant_visiting(
        &mut self,
        constant: &ConstantKind,
        hint: Option<&TypeRef>,
        visited: &mut HashSet<TypeId>,
    ) -> Result<(Box<dyn Value>, TypeRef), Diagnostic> {
        let invalid = |reason: String| {
            Diagnostic::problem(
                Problem::ValueNotCompatible,
                Label::span(constant.span(), "Constant"),
            )
            .with_context("constant", &constant.to_string())
            .with_context("reason", &reason)
        };
        match constant {
            ConstantKind::IntegerLiteral(IntegerLiteral {
                value, data_type, ..
            }) => {
                let literal = IntegerValue::literal(*value).map_err(|err| invalid(err.to_string()))?;
                match data_type {
                    Some(type_name) => {
                        let data_type = self.named_type_visiting(&type_name.name, visited)?;
                        let mut typed = data_type.create_value();
                        typed
                            .assign(&literal)
                            .map_err(|err| invalid(err.to_string()))?;
                        Ok((typed, data_type))
                    }
                    None if literal.kind() == IntegerKind::ULInt => {
                        Ok((Box::new(literal), ulint_type()))
                    }
                    None => Ok((Box::new(literal), lint_type())),
                }
            }
            ConstantKind::RealLiteral(RealLiteral {
                value, data_type, ..
            }) => {
                let literal =
                    RealValue::new(RealKind::LReal, *value).map_err(|err| invalid(err.to_string()))?;
                match data_type {
                    Some(type_name) => {
                        let data_type = self.named_type_visiting(&type_name.name, visited)?;
                        let mut typed = data_type.create_value();
                        typed
                            .assign(&literal)
                            .map_err(|err| invalid(err.to_string()))?;
                        Ok((typed, data_type))
                    }
                    None => Ok((Box::new(literal), lreal_type())),
                }
            }
            ConstantKind::Boolean(lit) => Ok((Box::new(BoolValue(lit.value)), bool_type())),
            ConstantKind::CharacterString(lit) => {
                Ok((Box::new(StringValue::new(&lit.value)), string_type()))
            }
            ConstantKind::Duration(lit) => Ok((Box::new(TimeValue(lit.value)), time_type())),
            ConstantKind::DateAndTime(lit) => {
                Ok((Box::new(DateTimeValue(lit.value)), date_time_type()))
            }
            ConstantKind::EnumeratedValue(lit) => {
                let data_type = match (&lit.type_name, hint) {
                    (Some(type_name), _) => self.named_type_visiting(&type_name.name, visited)?,
                    (None, Some(hint)) if hint.class() == ValueClass::Enumeration => hint.clone(),
                    (None, _) => {
                        let id = self
                            .enumerations_with_value(&lit.value)
                            .first()
                            .copied()
                            .ok_or_else(|| undefined_value(&lit.value))?;
                        self.concretize_visiting(id, visited)?
                    }
                };
                let value = data_type
                    .enumeration_value(&lit.value)
                    .ok_or_else(|| undefined_value(&lit.value))?;
                Ok((value, data_type))
            }
        }
    }

    /// Creates a value of the target type from the constant.
    pub fn initial_value(
        &mut self,
        constant: &ConstantKind,
        target: &TypeRef,
    ) -> Result<Box<dyn Value>, Diagnostic> {
        let mut visited = HashSet::new();
        self.initial_value_visiting(constant, target, &mut visited)
    }

    fn initial_value_visiting(
        &mut self,
        constant: &ConstantKind,
        target: &TypeRef,
        visited: &mut HashSet<TypeId>,
    ) -> Result<Box<dyn Value>, Diagnostic> {
        let (value, _) = self.constant_visiting(constant, Some(target), visited)?;
        let mut initial = target.create_value();
        initial.assign(value.as_ref()).map_err(|err| {
            Diagnostic::problem(
                Problem::InitialValueInvalid,
                Label::span(constant.span(), "Initial value"),
            )
            .with_context("type", target.name().original())
            .with_context("reason", &err.to_string())
        })?;
        Ok(initial)
    }

    /// Creates the value of the enumeration type with the value name.
    pub fn enumeration_value(
        &mut self,
        id: TypeId,
        value: &Id,
    ) -> Result<(Box<dyn Value>, TypeRef), Diagnostic> {
        let data_type = self.concretize(id)?;
        let value = data_type
            .enumeration_value(value)
            .ok_or_else(|| undefined_value(value))?;
        Ok((value, data_type))
    }
}

fn undefined_value(value: &Id) -> Diagnostic {
    Diagnostic::problem(
        Problem::UndefinedReference,
        Label::span(value.span(), "Enumerated value"),
    )
    .with_context_id("value", value)
}

/// Creates the name of an anonymous array type, such as
/// `ARRAY[1..3] OF INT`.
pub fn array_type_name(dimensions: &[Dimension], element: &Id, span: SourceSpan) -> Id {
    let ranges: Vec<String> = dimensions
        .iter()
        .map(|dimension| format!("{}..{}", dimension.lower, dimension.upper))
        .collect();
    Id::from(&format!("ARRAY[{}] OF {}", ranges.join(","), element)).with_position(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived(table: &mut TypeTable, name: &str) -> TypeId {
        table
            .declare(
                Id::from(name),
                TypeDecl::Derived {
                    base: None,
                    initial: None,
                },
            )
            .unwrap()
    }

    #[test]
    fn concretize_when_chain_then_concrete_type_of_last() {
        let mut table = TypeTable::new();
        let a = derived(&mut table, "A");
        let b = derived(&mut table, "B");
        let c = table.lookup(&Id::from("INT")).unwrap();
        table.set_base(a, b);
        table.set_base(b, c);

        let concrete = table.concretize(a).unwrap();
        assert_eq!("A", concrete.name().original().as_str());
        assert_eq!("INT", concrete.base_name().original().as_str());
        assert_eq!(ValueClass::Integer, concrete.class());
    }

    #[test]
    fn concretize_when_cycle_then_circular_reference() {
        let mut table = TypeTable::new();
        let a = derived(&mut table, "A");
        let b = derived(&mut table, "B");
        table.set_base(a, b);
        table.set_base(b, a);

        let err = table.concretize(a).unwrap_err();
        assert_eq!(Problem::CircularTypeReference.code(), err.code);
        // A fresh walk reports the cycle again.
        let err = table.concretize(b).unwrap_err();
        assert_eq!(Problem::CircularTypeReference.code(), err.code);
    }

    #[test]
    fn concretize_when_structure_contains_itself_then_circular_reference() {
        let mut table = TypeTable::new();
        let node = table
            .declare(
                Id::from("Node"),
                TypeDecl::Structure(vec![FieldDecl {
                    name: Id::from("Next"),
                    data_type: None,
                    initial: None,
                }]),
            )
            .unwrap();
        table.set_field(node, 0, node);

        let err = table.concretize(node).unwrap_err();
        assert_eq!(Problem::CircularTypeReference.code(), err.code);
    }

    #[test]
    fn concretize_when_base_missing_then_parent_not_declared() {
        let mut table = TypeTable::new();
        let a = derived(&mut table, "A");
        let err = table.concretize(a).unwrap_err();
        assert_eq!(Problem::ParentTypeNotDeclared.code(), err.code);
    }

    #[test]
    fn is_bound_when_ancestor_unbound_then_false() {
        let mut table = TypeTable::new();
        let a = derived(&mut table, "A");
        let b = derived(&mut table, "B");
        table.set_base(a, b);
        assert!(!table.is_bound(a));

        let int = table.lookup(&Id::from("INT")).unwrap();
        table.set_base(b, int);
        assert!(table.is_bound(a));
    }

    #[test]
    fn reset_resolved_when_base_changed_then_new_concrete_type() {
        let mut table = TypeTable::new();
        let a = derived(&mut table, "A");
        let int = table.lookup(&Id::from("INT")).unwrap();
        let real = table.lookup(&Id::from("REAL")).unwrap();
        table.set_base(a, int);
        assert_eq!(ValueClass::Integer, table.concretize(a).unwrap().class());

        table.set_base(a, real);
        table.reset_resolved();
        assert_eq!(ValueClass::Real, table.concretize(a).unwrap().class());
    }

    #[test]
    fn initial_value_when_derived_initial_out_of_range_then_invalid() {
        let mut table = TypeTable::new();
        let sint = elementary_type(&Id::from("SINT")).unwrap();
        let err = table
            .initial_value(&ConstantKind::integer(200), &sint)
            .unwrap_err();
        assert_eq!(Problem::InitialValueInvalid.code(), err.code);
    }

    #[test]
    fn constant_when_bare_enumerated_value_then_finds_enumeration() {
        let mut table = TypeTable::new();
        let colors = EnumerationType::new(
            Id::from("Color"),
            vec![Id::from("Red"), Id::from("Green")],
            None,
        )
        .unwrap();
        table.declare_enumeration(colors);

        let (value, data_type) = table
            .constant(&ConstantKind::enumerated("green"), None)
            .unwrap();
        assert_eq!("Color", data_type.name().original().as_str());
        assert_eq!("Color#Green", format!("{value}"));
    }

    #[test]
    fn constant_when_typed_integer_then_value_of_type() {
        let mut table = TypeTable::new();
        let (value, data_type) = table
            .constant(&ConstantKind::typed_integer("SINT", 5), None)
            .unwrap();
        assert_eq!("SINT", data_type.name().original().as_str());
        assert_eq!(Some(5), value.as_integer());
    }

    #[test]
    fn array_type_name_when_two_dimensions_then_ranges_in_name() {
        let name = array_type_name(
            &[
                Dimension { lower: 1, upper: 3 },
                Dimension { lower: 0, upper: 1 },
            ],
            &Id::from("INT"),
            SourceSpan::default(),
        );
        assert_eq!("ARRAY[1..3,0..1] OF INT", name.original().as_str());
    }
}
