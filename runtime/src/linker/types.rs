//! Declares data types and variables and binds the type names that the
//! declarations use.
//!
//! Type names are bound in two steps. The primary callback records the
//! binding in the type table. The secondary callback creates the concrete
//! type, which needs every binding in the pool, and then checks what
//! depends on the concrete type such as the direct address of a variable.
use std::collections::HashSet;
use std::mem;

use log::debug;
use stint_dsl::{
    common::{
        ArraySpecification, DataTypeDeclaration, FunctionDeclaration, ProgramDeclaration,
        TypeSpecificationKind, VarDecl, VariableClass, VariableSpecification,
    },
    core::{Id, Located},
    diagnostic::{Diagnostic, Label},
    textual::StmtKind,
};
use stint_problems::Problem;

use crate::datatypes::{Dimension, EnumerationType};
use crate::memory::{VarId, Variable};
use crate::pou::{Pou, PouId, PouKind};
use crate::reference_pool::Resolution;
use crate::type_table::{array_type_name, FieldDecl, TypeDecl, TypeId};

use super::{duplicated, Linker, TypePool, TypeReferrer};

impl Linker {
    pub(super) fn declare_type(
        &mut self,
        decl: DataTypeDeclaration,
        pool: &mut TypePool,
    ) -> Result<(), Diagnostic> {
        let name = decl.type_name.name;
        if self.table.contains(&name) {
            let first = self
                .table
                .lookup(&name)
                .and_then(|id| self.table.name(id).cloned())
                .unwrap_or_else(|| name.clone());
            return Err(duplicated(Problem::TypeDeclNameDuplicated, &name, &first));
        }

        match decl.spec {
            TypeSpecificationKind::Derived { base, default } => {
                let id = self.declare_entry(
                    &name,
                    TypeDecl::Derived {
                        base: None,
                        initial: default,
                    },
                )?;
                pool.add_two_step(
                    &base.name,
                    TypeReferrer::Ancestor(id),
                    base.span(),
                    bind_type,
                    check_type,
                );
            }
            TypeSpecificationKind::Enumeration { values, default } => {
                let mut seen: HashSet<&Id> = HashSet::new();
                for value in &values {
                    if let Some(first) = seen.get(value) {
                        return Err(duplicated(Problem::EnumerationValueDuplicated, value, *first)
                            .with_context_id("type", &name));
                    }
                    seen.insert(value);
                }
                let enumeration = EnumerationType::new(name.clone(), values, default.as_ref())
                    .map_err(|err| {
                        Diagnostic::problem(
                            Problem::InitialValueInvalid,
                            Label::located(&name, "Enumeration"),
                        )
                        .with_context("reason", &err.to_string())
                    })?;
                self.table
                    .declare_enumeration(enumeration)
                    .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
            }
            TypeSpecificationKind::Array(spec) => {
                let dimensions = dimensions(&spec)?;
                let id = self.declare_entry(
                    &name,
                    TypeDecl::Array {
                        dimensions,
                        element: None,
                    },
                )?;
                pool.add_two_step(
                    &spec.element_type.name,
                    TypeReferrer::ArrayElement(id),
                    spec.element_type.span(),
                    bind_type,
                    check_type,
                );
            }
            TypeSpecificationKind::Structure(elements) => {
                let mut seen: HashSet<&Id> = HashSet::new();
                for element in &elements {
                    if let Some(first) = seen.get(&element.name) {
                        return Err(
                            duplicated(Problem::StructElementDuplicated, &element.name, *first)
                                .with_context_id("type", &name),
                        );
                    }
                    seen.insert(&element.name);
                }

                let fields = elements
                    .iter()
                    .map(|element| FieldDecl {
                        name: element.name.clone(),
                        data_type: None,
                        initial: element.initial.clone(),
                    })
                    .collect();
                let id = self.declare_entry(&name, TypeDecl::Structure(fields))?;
                for (index, element) in elements.iter().enumerate() {
                    pool.add_two_step(
                        &element.type_name.name,
                        TypeReferrer::StructElement(id, index),
                        element.type_name.span(),
                        bind_type,
                        check_type,
                    );
                }
            }
        }
        Ok(())
    }

    fn declare_entry(&mut self, name: &Id, decl: TypeDecl) -> Result<TypeId, Diagnostic> {
        self.table
            .declare(name.clone(), decl)
            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))
    }

    /// Declares an array type for a variable that is declared with an
    /// array specification. Variables with the same specification share
    /// the type.
    fn declare_anonymous_array(
        &mut self,
        spec: ArraySpecification,
        declared_by: &Id,
        pool: &mut TypePool,
    ) -> Result<Id, Diagnostic> {
        let dimensions = dimensions(&spec)?;
        let name = array_type_name(&dimensions, &spec.element_type.name, declared_by.span());
        if self.table.contains(&name) {
            return Ok(name);
        }
        let id = self.declare_entry(
            &name,
            TypeDecl::Array {
                dimensions,
                element: None,
            },
        )?;
        pool.add_two_step(
            &spec.element_type.name,
            TypeReferrer::ArrayElement(id),
            spec.element_type.span(),
            bind_type,
            check_type,
        );
        Ok(name)
    }

    fn declare_variable(&mut self, decl: VarDecl, pool: &mut TypePool) -> Result<VarId, Diagnostic> {
        let VarDecl {
            identifier,
            class,
            spec,
            initial,
            address,
        } = decl;
        let (type_name, span) = match spec {
            VariableSpecification::Named(type_name) => {
                let span = type_name.span();
                (type_name.name, span)
            }
            VariableSpecification::Array(spec) => {
                let span = identifier.span();
                (self.declare_anonymous_array(spec, &identifier, pool)?, span)
            }
        };

        let mut variable = Variable::new(identifier, class);
        variable.address = address;
        let var = self.machine.memory.declare(variable);
        if let Some(initial) = initial {
            self.initials.insert(var, initial);
        }
        pool.add_two_step(
            &type_name,
            TypeReferrer::Variable(var),
            span,
            bind_type,
            check_type,
        );
        Ok(var)
    }

    /// Declares the variables and adds them to the declared list. A name
    /// that is already in the list is an error.
    fn declare_variables(
        &mut self,
        decls: Vec<VarDecl>,
        declared: &mut Vec<VarId>,
        pool: &mut TypePool,
        errors: &mut Vec<Diagnostic>,
    ) {
        for decl in decls {
            let first = declared
                .iter()
                .filter_map(|id| self.machine.memory.get(*id))
                .find(|variable| variable.name == decl.identifier)
                .map(|variable| variable.name.clone());
            if let Some(first) = first {
                errors.push(duplicated(
                    Problem::VariableDeclNameDuplicated,
                    &decl.identifier,
                    &first,
                ));
                continue;
            }
            match self.declare_variable(decl, pool) {
                Ok(var) => declared.push(var),
                Err(err) => errors.push(err),
            }
        }
    }

    fn first_pou(&self, name: &Id) -> Option<Id> {
        let id = self.pou_names.get(name)?;
        self.machine.pou(*id).map(|pou| pou.name.clone())
    }

    pub(super) fn declare_function(
        &mut self,
        decl: FunctionDeclaration,
        pool: &mut TypePool,
        errors: &mut Vec<Diagnostic>,
    ) {
        let FunctionDeclaration {
            name,
            return_type,
            variables,
            body,
        } = decl;
        if let Some(first) = self.first_pou(&name) {
            errors.push(duplicated(Problem::PouDeclNameDuplicated, &name, &first));
            return;
        }

        let mut pou = Pou::new(name.clone(), PouKind::Function);
        // The value of a function is assigned to a variable with the name
        // of the function.
        let result = self
            .machine
            .memory
            .declare(Variable::new(name, VariableClass::Local));
        pool.add_two_step(
            &return_type.name,
            TypeReferrer::Variable(result),
            return_type.span(),
            bind_type,
            check_type,
        );
        pou.result = Some(result);
        pou.variables.push(result);

        self.declare_variables(variables, &mut pou.variables, pool, errors);
        self.add_pou(pou, body);
    }

    pub(super) fn declare_program(
        &mut self,
        decl: ProgramDeclaration,
        pool: &mut TypePool,
        errors: &mut Vec<Diagnostic>,
    ) {
        let ProgramDeclaration {
            name,
            variables,
            body,
        } = decl;
        if let Some(first) = self.first_pou(&name) {
            errors.push(duplicated(Problem::PouDeclNameDuplicated, &name, &first));
            return;
        }

        let mut pou = Pou::new(name, PouKind::Program);
        self.declare_variables(variables, &mut pou.variables, pool, errors);
        let id = self.add_pou(pou, body);
        self.programs.push(id);
    }

    pub(super) fn declare_globals(
        &mut self,
        variables: Vec<VarDecl>,
        pool: &mut TypePool,
        errors: &mut Vec<Diagnostic>,
    ) {
        let mut globals = mem::take(&mut self.globals);
        self.declare_variables(variables, &mut globals, pool, errors);
        self.globals = globals;
    }

    fn add_pou(&mut self, mut pou: Pou, body: Vec<StmtKind>) -> PouId {
        let memory = &self.machine.memory;
        let class_of = |id: &VarId| memory.get(*id).map(|variable| variable.class);
        pou.inputs = pou
            .variables
            .iter()
            .copied()
            .filter(|id| class_of(id) == Some(VariableClass::Input))
            .collect();
        pou.outputs = pou
            .variables
            .iter()
            .copied()
            .filter(|id| class_of(id) == Some(VariableClass::Output))
            .collect();

        let name = pou.name.clone();
        let id = self.machine.add_pou(pou);
        self.pou_names.insert(name, id);
        self.pending.push((id, body));
        id
    }

    /// Finds the global variable with the name.
    pub fn global(&self, name: &Id) -> Option<VarId> {
        self.globals.iter().copied().find(|id| {
            self.machine
                .memory
                .get(*id)
                .is_some_and(|variable| variable.name == *name)
        })
    }

    /// Binds every type name to a declaration and runs the callbacks of
    /// the referrers. Names that nothing declares are undefined.
    pub fn resolve_types(&mut self) -> Result<(), Vec<Diagnostic>> {
        while let Some(name) = self.type_pool.next_unresolved().cloned() {
            match self.table.lookup(&name) {
                Some(id) => self.type_pool.resolve(&name, id),
                None => self.type_pool.mark_undefined(&name),
            }
        }

        let mut pool = self.swap_type_pool();
        let result = pool.trigger_resolve_callbacks(self);
        self.type_pool = pool;
        debug!(
            "Resolved {} type names into {} types",
            self.type_pool.len(),
            self.table.len()
        );
        result
    }

    /// Creates the concrete type of the declaration. A declaration that
    /// refers to an undefined name is skipped because the reference is
    /// already reported.
    fn check_declaration(&mut self, id: TypeId) -> Result<(), Diagnostic> {
        if !self.table.is_bound(id) {
            return Ok(());
        }
        match self.table.concretize(id) {
            Ok(_) => Ok(()),
            Err(err) => self.report_once(err),
        }
    }

    fn check_variable(&mut self, var: VarId, target: TypeId) -> Result<(), Diagnostic> {
        // Problems in the type are reported by the type declaration.
        let Ok(data_type) = self.table.concretize(target) else {
            return Ok(());
        };
        let variable = self
            .machine
            .memory
            .get_mut(var)
            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
        variable.data_type = Some(data_type.clone());

        if let Some(address) = &variable.address {
            if !data_type.check_address(address) {
                return Err(Diagnostic::problem(
                    Problem::DirectAddressInvalid,
                    Label::located(address, "Direct address"),
                )
                .with_context_id("variable", &variable.name)
                .with_context("type", data_type.name().original())
                .with_context("address", &address.to_string()));
            }
        }
        Ok(())
    }
}

fn dimensions(spec: &ArraySpecification) -> Result<Vec<Dimension>, Diagnostic> {
    spec.ranges
        .iter()
        .map(|range| {
            if range.start > range.end {
                return Err(Diagnostic::problem(
                    Problem::ArrayRangeInvalid,
                    Label::span(range.span.clone(), "Subrange"),
                )
                .with_context("range", &format!("{}..{}", range.start, range.end)));
            }
            Ok(Dimension {
                lower: range.start,
                upper: range.end,
            })
        })
        .collect()
}

fn bind_type(
    linker: &mut Linker,
    referrer: &TypeReferrer,
    resolution: &Resolution<'_, TypeId>,
) -> Result<(), Diagnostic> {
    let target = *resolution.target;
    match *referrer {
        TypeReferrer::Ancestor(id) => linker.table.set_base(id, target),
        TypeReferrer::ArrayElement(id) => linker.table.set_element(id, target),
        TypeReferrer::StructElement(id, index) => linker.table.set_field(id, index, target),
        TypeReferrer::Variable(var) => {
            linker.var_types.insert(var, target);
        }
    }
    Ok(())
}

fn check_type(
    linker: &mut Linker,
    referrer: &TypeReferrer,
    resolution: &Resolution<'_, TypeId>,
) -> Result<(), Diagnostic> {
    match *referrer {
        TypeReferrer::Ancestor(id)
        | TypeReferrer::ArrayElement(id)
        | TypeReferrer::StructElement(id, _) => linker.check_declaration(id),
        TypeReferrer::Variable(var) => linker.check_variable(var, *resolution.target),
    }
}

#[cfg(test)]
mod tests {
    use stint_dsl::common::{
        AddressAssignment, AddressLocation, AddressSize, DataTypeDeclaration, Library, VarDecl,
    };
    use stint_dsl::core::Id;
    use stint_problems::Problem;

    use crate::config::RuntimeConfig;
    use crate::linker::Linker;
    use crate::value::ValueClass;

    fn linker(library: Library) -> Linker {
        let mut linker = Linker::new(RuntimeConfig::default());
        linker.add_library(library).unwrap();
        linker
    }

    fn global_class(linker: &Linker, name: &str) -> Option<ValueClass> {
        let var = linker.global(&Id::from(name))?;
        let variable = linker.machine().memory.get(var)?;
        variable.data_type.as_ref().map(|data_type| data_type.class())
    }

    #[test]
    fn resolve_types_when_declared_after_use_then_concrete_type() {
        let library = Library::new()
            .with_globals(vec![VarDecl::simple("Level", "Height")])
            .with_type(DataTypeDeclaration::derived("Height", "Percent"))
            .with_type(DataTypeDeclaration::derived("Percent", "INT"));
        let mut linker = linker(library);

        linker.resolve_types().unwrap();

        assert_eq!(Some(ValueClass::Integer), global_class(&linker, "Level"));
    }

    #[test]
    fn resolve_types_when_derived_cycle_then_circular_reference() {
        let library = Library::new()
            .with_type(DataTypeDeclaration::derived("A", "B"))
            .with_type(DataTypeDeclaration::derived("B", "A"));
        let mut linker = linker(library);

        let errors = linker.resolve_types().unwrap_err();

        assert!(!errors.is_empty());
        assert!(errors
            .iter()
            .all(|err| err.code == Problem::CircularTypeReference.code()));
    }

    #[test]
    fn resolve_types_when_name_undefined_then_undefined_reference_only() {
        let library = Library::new()
            .with_type(DataTypeDeclaration::derived("A", "B"))
            .with_type(DataTypeDeclaration::derived("B", "Missing"))
            .with_globals(vec![VarDecl::simple("Level", "A")]);
        let mut linker = linker(library);

        let errors = linker.resolve_types().unwrap_err();

        assert_eq!(1, errors.len());
        assert_eq!(Problem::UndefinedReference.code(), errors[0].code);
    }

    #[test]
    fn resolve_types_when_address_size_differs_then_direct_address_invalid() {
        let library = Library::new().with_globals(vec![
            VarDecl::simple("Start", "BOOL").with_address(AddressAssignment::new(
                AddressLocation::Input,
                AddressSize::Bit,
                vec![0, 1],
            )),
            VarDecl::simple("Speed", "INT").with_address(AddressAssignment::new(
                AddressLocation::Input,
                AddressSize::Byte,
                vec![2],
            )),
        ]);
        let mut linker = linker(library);

        let errors = linker.resolve_types().unwrap_err();

        assert_eq!(1, errors.len());
        assert_eq!(Problem::DirectAddressInvalid.code(), errors[0].code);
    }

    #[test]
    fn resolve_types_when_anonymous_array_then_array_type() {
        let library = Library::new().with_globals(vec![
            VarDecl::array("Values", vec![(1, 3)], "Percent"),
            VarDecl::array("Others", vec![(1, 3)], "Percent"),
        ])
        .with_type(DataTypeDeclaration::derived("Percent", "SINT"));
        let mut linker = linker(library);

        linker.resolve_types().unwrap();

        assert_eq!(Some(ValueClass::Array), global_class(&linker, "Values"));
        assert_eq!(Some(ValueClass::Array), global_class(&linker, "Others"));
    }

    #[test]
    fn add_library_when_type_declared_twice_then_type_decl_name_duplicated() {
        let library = Library::new()
            .with_type(DataTypeDeclaration::derived("Level", "INT"))
            .with_type(DataTypeDeclaration::derived("LEVEL", "REAL"));
        let mut linker = Linker::new(RuntimeConfig::default());

        let errors = linker.add_library(library).unwrap_err();

        assert_eq!(Problem::TypeDeclNameDuplicated.code(), errors[0].code);
    }

    #[test]
    fn add_library_when_elementary_name_then_type_decl_name_duplicated() {
        let library = Library::new().with_type(DataTypeDeclaration::derived("int", "REAL"));
        let mut linker = Linker::new(RuntimeConfig::default());

        let errors = linker.add_library(library).unwrap_err();

        assert_eq!(Problem::TypeDeclNameDuplicated.code(), errors[0].code);
    }

    #[test]
    fn add_library_when_range_reversed_then_array_range_invalid() {
        let library = Library::new().with_type(DataTypeDeclaration::array(
            "Values",
            vec![(3, 1)],
            "INT",
        ));
        let mut linker = Linker::new(RuntimeConfig::default());

        let errors = linker.add_library(library).unwrap_err();

        assert_eq!(Problem::ArrayRangeInvalid.code(), errors[0].code);
    }

    #[test]
    fn add_library_when_enumeration_value_twice_then_duplicated() {
        let library = Library::new().with_type(DataTypeDeclaration::enumeration(
            "Color",
            vec!["Red", "Green", "red"],
        ));
        let mut linker = Linker::new(RuntimeConfig::default());

        let errors = linker.add_library(library).unwrap_err();

        assert_eq!(Problem::EnumerationValueDuplicated.code(), errors[0].code);
    }

    #[test]
    fn add_library_when_structure_element_twice_then_duplicated() {
        let library = Library::new().with_type(DataTypeDeclaration::structure(
            "Motor",
            vec![("Speed", "INT"), ("speed", "REAL")],
        ));
        let mut linker = Linker::new(RuntimeConfig::default());

        let errors = linker.add_library(library).unwrap_err();

        assert_eq!(Problem::StructElementDuplicated.code(), errors[0].code);
    }

    #[test]
    fn reset_resolved_when_resolved_again_then_same_types() {
        let library = Library::new()
            .with_globals(vec![VarDecl::simple("Level", "Percent")])
            .with_type(DataTypeDeclaration::derived("Percent", "REAL"));
        let mut linker = linker(library);
        linker.resolve_types().unwrap();

        linker.reset_resolved();
        linker.resolve_types().unwrap();

        assert_eq!(Some(ValueClass::Real), global_class(&linker, "Level"));
    }
}
