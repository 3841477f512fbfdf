//! Provides definitions of objects from IEC 61131-3 common elements.
//!
//! These are the unlinked declarations: every reference to another
//! declaration is by name and names may refer to declarations that appear
//! later or in another library.
//!
//! See section 2.
use core::fmt;

use time::{Duration, PrimitiveDateTime};

use crate::core::{FileId, Id, Located, SourceSpan};
use crate::textual::StmtKind;

/// Integer literal, optionally qualified by a type name such as `INT#5`.
///
/// See section 2.2.1.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerLiteral {
    pub value: i128,
    pub data_type: Option<TypeName>,
    pub span: SourceSpan,
}

/// Real literal, optionally qualified by a type name such as `LREAL#1.5`.
///
/// See section 2.2.1.
#[derive(Debug, Clone, PartialEq)]
pub struct RealLiteral {
    pub value: f64,
    pub data_type: Option<TypeName>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanLiteral {
    pub value: bool,
    pub span: SourceSpan,
}

/// Character string literal.
///
/// See section 2.2.2.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterStringLiteral {
    pub value: String,
    pub span: SourceSpan,
}

/// Duration literal such as `T#1s`.
///
/// See section 2.2.3.1.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationLiteral {
    pub value: Duration,
    pub span: SourceSpan,
}

/// Date and time literal such as `DT#2024-01-02-03:04:05`.
///
/// See section 2.2.3.2.
#[derive(Debug, Clone, PartialEq)]
pub struct DateAndTimeLiteral {
    pub value: PrimitiveDateTime,
    pub span: SourceSpan,
}

/// A value of an enumeration. The type name is optional because
/// enumerated values are normally unique.
///
/// See section 2.3.3.1.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumeratedValue {
    pub type_name: Option<TypeName>,
    pub value: Id,
}

impl EnumeratedValue {
    pub fn new(value: &str) -> Self {
        EnumeratedValue {
            type_name: None,
            value: Id::from(value),
        }
    }
}

/// A constant value.
///
/// See section 2.2.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantKind {
    IntegerLiteral(IntegerLiteral),
    RealLiteral(RealLiteral),
    Boolean(BooleanLiteral),
    CharacterString(CharacterStringLiteral),
    Duration(DurationLiteral),
    DateAndTime(DateAndTimeLiteral),
    EnumeratedValue(EnumeratedValue),
}

impl ConstantKind {
    pub fn integer(value: i128) -> Self {
        ConstantKind::IntegerLiteral(IntegerLiteral {
            value,
            data_type: None,
            span: SourceSpan::default(),
        })
    }

    pub fn typed_integer(type_name: &str, value: i128) -> Self {
        ConstantKind::IntegerLiteral(IntegerLiteral {
            value,
            data_type: Some(TypeName::from(type_name)),
            span: SourceSpan::default(),
        })
    }

    pub fn real(value: f64) -> Self {
        ConstantKind::RealLiteral(RealLiteral {
            value,
            data_type: None,
            span: SourceSpan::default(),
        })
    }

    pub fn boolean(value: bool) -> Self {
        ConstantKind::Boolean(BooleanLiteral {
            value,
            span: SourceSpan::default(),
        })
    }

    pub fn string(value: &str) -> Self {
        ConstantKind::CharacterString(CharacterStringLiteral {
            value: value.to_string(),
            span: SourceSpan::default(),
        })
    }

    pub fn duration(value: Duration) -> Self {
        ConstantKind::Duration(DurationLiteral {
            value,
            span: SourceSpan::default(),
        })
    }

    pub fn enumerated(value: &str) -> Self {
        ConstantKind::EnumeratedValue(EnumeratedValue::new(value))
    }

    pub fn typed_enumerated(type_name: &str, value: &str) -> Self {
        ConstantKind::EnumeratedValue(EnumeratedValue {
            type_name: Some(TypeName::from(type_name)),
            value: Id::from(value),
        })
    }

    pub fn with_position(self, span: SourceSpan) -> Self {
        match self {
            ConstantKind::IntegerLiteral(lit) => {
                ConstantKind::IntegerLiteral(IntegerLiteral { span, ..lit })
            }
            ConstantKind::RealLiteral(lit) => ConstantKind::RealLiteral(RealLiteral { span, ..lit }),
            ConstantKind::Boolean(lit) => ConstantKind::Boolean(BooleanLiteral { span, ..lit }),
            ConstantKind::CharacterString(lit) => {
                ConstantKind::CharacterString(CharacterStringLiteral { span, ..lit })
            }
            ConstantKind::Duration(lit) => ConstantKind::Duration(DurationLiteral { span, ..lit }),
            ConstantKind::DateAndTime(lit) => {
                ConstantKind::DateAndTime(DateAndTimeLiteral { span, ..lit })
            }
            ConstantKind::EnumeratedValue(lit) => ConstantKind::EnumeratedValue(EnumeratedValue {
                type_name: lit.type_name,
                value: lit.value.with_position(span),
            }),
        }
    }
}

impl Located for ConstantKind {
    fn span(&self) -> SourceSpan {
        match self {
            ConstantKind::IntegerLiteral(lit) => lit.span.clone(),
            ConstantKind::RealLiteral(lit) => lit.span.clone(),
            ConstantKind::Boolean(lit) => lit.span.clone(),
            ConstantKind::CharacterString(lit) => lit.span.clone(),
            ConstantKind::Duration(lit) => lit.span.clone(),
            ConstantKind::DateAndTime(lit) => lit.span.clone(),
            ConstantKind::EnumeratedValue(lit) => lit.value.span(),
        }
    }
}

impl fmt::Display for ConstantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantKind::IntegerLiteral(lit) => match &lit.data_type {
                Some(type_name) => write!(f, "{}#{}", type_name, lit.value),
                None => write!(f, "{}", lit.value),
            },
            ConstantKind::RealLiteral(lit) => write!(f, "{}", lit.value),
            ConstantKind::Boolean(lit) => f.write_str(if lit.value { "TRUE" } else { "FALSE" }),
            ConstantKind::CharacterString(lit) => write!(f, "'{}'", lit.value),
            ConstantKind::Duration(lit) => write!(f, "T#{}ms", lit.value.whole_milliseconds()),
            ConstantKind::DateAndTime(lit) => write!(f, "DT#{}", lit.value),
            ConstantKind::EnumeratedValue(lit) => match &lit.type_name {
                Some(type_name) => write!(f, "{}#{}", type_name, lit.value),
                None => write!(f, "{}", lit.value),
            },
        }
    }
}

/// The name of a data type.
///
/// Type names are identifiers so are case insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub name: Id,
}

impl TypeName {
    pub fn from(name: &str) -> Self {
        TypeName { name: Id::from(name) }
    }

    pub fn with_position(self, span: SourceSpan) -> Self {
        TypeName {
            name: self.name.with_position(span),
        }
    }
}

impl Located for TypeName {
    fn span(&self) -> SourceSpan {
        self.name.span()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Location prefix for directly represented variables.
///
/// See section 2.4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressLocation {
    /// `%I`
    Input,
    /// `%Q`
    Output,
    /// `%M`
    Memory,
}

/// Size prefix for directly represented variables.
///
/// See section 2.4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSize {
    /// `X` or no size prefix
    Bit,
    /// `B`
    Byte,
    /// `W`
    Word,
    /// `D`
    DoubleWord,
    /// `L`
    LongWord,
}

impl AddressSize {
    /// The number of bits that the address designates.
    pub fn bits(&self) -> u32 {
        match self {
            AddressSize::Bit => 1,
            AddressSize::Byte => 8,
            AddressSize::Word => 16,
            AddressSize::DoubleWord => 32,
            AddressSize::LongWord => 64,
        }
    }
}

/// Direct memory address assigned to a variable, such as `AT %IX0.1`.
///
/// See section 2.4.1.1.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressAssignment {
    pub location: AddressLocation,
    pub size: AddressSize,
    pub address: Vec<u32>,
    pub span: SourceSpan,
}

impl AddressAssignment {
    pub fn new(location: AddressLocation, size: AddressSize, address: Vec<u32>) -> Self {
        AddressAssignment {
            location,
            size,
            address,
            span: SourceSpan::default(),
        }
    }
}

impl Located for AddressAssignment {
    fn span(&self) -> SourceSpan {
        self.span.clone()
    }
}

impl fmt::Display for AddressAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = match self.location {
            AddressLocation::Input => "I",
            AddressLocation::Output => "Q",
            AddressLocation::Memory => "M",
        };
        let size = match self.size {
            AddressSize::Bit => "X",
            AddressSize::Byte => "B",
            AddressSize::Word => "W",
            AddressSize::DoubleWord => "D",
            AddressSize::LongWord => "L",
        };
        let parts: Vec<String> = self.address.iter().map(|part| part.to_string()).collect();
        write!(f, "%{}{}{}", location, size, parts.join("."))
    }
}

/// A range of subscripts for one array dimension.
///
/// See section 2.3.3.1.
#[derive(Debug, Clone, PartialEq)]
pub struct Subrange {
    pub start: i128,
    pub end: i128,
    pub span: SourceSpan,
}

impl Subrange {
    pub fn new(start: i128, end: i128) -> Self {
        Subrange {
            start,
            end,
            span: SourceSpan::default(),
        }
    }
}

/// Array specification such as `ARRAY [1..3, 0..1] OF INT`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySpecification {
    pub ranges: Vec<Subrange>,
    pub element_type: TypeName,
}

/// One element of a structure declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureElementDeclaration {
    pub name: Id,
    pub type_name: TypeName,
    pub initial: Option<ConstantKind>,
}

/// The specification part of a data type declaration.
///
/// See section 2.3.3.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpecificationKind {
    /// A type derived from another type (elementary or declared) with
    /// an optional new default value, such as `MY_INT : INT := 5`.
    Derived {
        base: TypeName,
        default: Option<ConstantKind>,
    },
    Enumeration {
        values: Vec<Id>,
        default: Option<Id>,
    },
    Array(ArraySpecification),
    Structure(Vec<StructureElementDeclaration>),
}

/// Declaration of a data type in a `TYPE ... END_TYPE` block.
///
/// See section 2.3.3.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeDeclaration {
    pub type_name: TypeName,
    pub spec: TypeSpecificationKind,
}

impl DataTypeDeclaration {
    pub fn derived(name: &str, base: &str) -> Self {
        DataTypeDeclaration {
            type_name: TypeName::from(name),
            spec: TypeSpecificationKind::Derived {
                base: TypeName::from(base),
                default: None,
            },
        }
    }

    pub fn enumeration(name: &str, values: Vec<&str>) -> Self {
        DataTypeDeclaration {
            type_name: TypeName::from(name),
            spec: TypeSpecificationKind::Enumeration {
                values: values.into_iter().map(Id::from).collect(),
                default: None,
            },
        }
    }

    pub fn array(name: &str, ranges: Vec<(i128, i128)>, element_type: &str) -> Self {
        DataTypeDeclaration {
            type_name: TypeName::from(name),
            spec: TypeSpecificationKind::Array(ArraySpecification {
                ranges: ranges
                    .into_iter()
                    .map(|(start, end)| Subrange::new(start, end))
                    .collect(),
                element_type: TypeName::from(element_type),
            }),
        }
    }

    pub fn structure(name: &str, elements: Vec<(&str, &str)>) -> Self {
        DataTypeDeclaration {
            type_name: TypeName::from(name),
            spec: TypeSpecificationKind::Structure(
                elements
                    .into_iter()
                    .map(|(name, type_name)| StructureElementDeclaration {
                        name: Id::from(name),
                        type_name: TypeName::from(type_name),
                        initial: None,
                    })
                    .collect(),
            ),
        }
    }
}

/// The scope and direction of a variable.
///
/// See section 2.4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableClass {
    /// `VAR_INPUT`
    Input,
    /// `VAR_OUTPUT`
    Output,
    /// `VAR`
    Local,
    /// `VAR_TEMP`
    Temp,
    /// `VAR_GLOBAL`
    Global,
}

/// The type of a variable: either a named type or an anonymous array.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableSpecification {
    Named(TypeName),
    Array(ArraySpecification),
}

/// Declaration of a single variable.
///
/// See section 2.4.3.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub identifier: Id,
    pub class: VariableClass,
    pub spec: VariableSpecification,
    pub initial: Option<ConstantKind>,
    pub address: Option<AddressAssignment>,
}

impl VarDecl {
    pub fn simple(name: &str, type_name: &str) -> Self {
        VarDecl {
            identifier: Id::from(name),
            class: VariableClass::Local,
            spec: VariableSpecification::Named(TypeName::from(type_name)),
            initial: None,
            address: None,
        }
    }

    pub fn input(name: &str, type_name: &str) -> Self {
        Self::simple(name, type_name).with_class(VariableClass::Input)
    }

    pub fn output(name: &str, type_name: &str) -> Self {
        Self::simple(name, type_name).with_class(VariableClass::Output)
    }

    pub fn global(name: &str, type_name: &str) -> Self {
        Self::simple(name, type_name).with_class(VariableClass::Global)
    }

    pub fn array(name: &str, ranges: Vec<(i128, i128)>, element_type: &str) -> Self {
        VarDecl {
            identifier: Id::from(name),
            class: VariableClass::Local,
            spec: VariableSpecification::Array(ArraySpecification {
                ranges: ranges
                    .into_iter()
                    .map(|(start, end)| Subrange::new(start, end))
                    .collect(),
                element_type: TypeName::from(element_type),
            }),
            initial: None,
            address: None,
        }
    }

    pub fn with_class(mut self, class: VariableClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_initial(mut self, initial: ConstantKind) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn with_address(mut self, address: AddressAssignment) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_position(mut self, span: SourceSpan) -> Self {
        self.identifier = self.identifier.with_position(span);
        self
    }
}

impl Located for VarDecl {
    fn span(&self) -> SourceSpan {
        self.identifier.span()
    }
}

/// Function declaration.
///
/// See section 2.5.1.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: Id,
    pub return_type: TypeName,
    pub variables: Vec<VarDecl>,
    pub body: Vec<StmtKind>,
}

/// Program declaration.
///
/// See section 2.5.3.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDeclaration {
    pub name: Id,
    pub variables: Vec<VarDecl>,
    pub body: Vec<StmtKind>,
}

impl FunctionDeclaration {
    pub fn new(name: &str, return_type: &str) -> Self {
        FunctionDeclaration {
            name: Id::from(name),
            return_type: TypeName::from(return_type),
            variables: vec![],
            body: vec![],
        }
    }

    pub fn with_variables(mut self, variables: Vec<VarDecl>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_body(mut self, body: Vec<StmtKind>) -> Self {
        self.body = body;
        self
    }
}

impl ProgramDeclaration {
    pub fn new(name: &str) -> Self {
        ProgramDeclaration {
            name: Id::from(name),
            variables: vec![],
            body: vec![],
        }
    }

    pub fn with_variables(mut self, variables: Vec<VarDecl>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_body(mut self, body: Vec<StmtKind>) -> Self {
        self.body = body;
        self
    }
}

/// Variables declared with `VAR_GLOBAL`. Global variables are visible in
/// every program and function.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariableDeclaration {
    pub variables: Vec<VarDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LibraryElementKind {
    DataTypeDeclaration(DataTypeDeclaration),
    FunctionDeclaration(FunctionDeclaration),
    ProgramDeclaration(ProgramDeclaration),
    GlobalVariableDeclaration(GlobalVariableDeclaration),
}

/// Container for elements of one compilation unit.
///
/// See section 2.1.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    pub file_id: FileId,
    pub elements: Vec<LibraryElementKind>,
}

impl Library {
    pub fn new() -> Self {
        Library {
            file_id: FileId::default(),
            elements: Vec::new(),
        }
    }

    pub fn with_file_id(mut self, file_id: FileId) -> Self {
        self.file_id = file_id;
        self
    }

    pub fn with_type(mut self, decl: DataTypeDeclaration) -> Self {
        self.elements
            .push(LibraryElementKind::DataTypeDeclaration(decl));
        self
    }

    pub fn with_function(mut self, decl: FunctionDeclaration) -> Self {
        self.elements
            .push(LibraryElementKind::FunctionDeclaration(decl));
        self
    }

    pub fn with_program(mut self, decl: ProgramDeclaration) -> Self {
        self.elements
            .push(LibraryElementKind::ProgramDeclaration(decl));
        self
    }

    pub fn with_globals(mut self, variables: Vec<VarDecl>) -> Self {
        self.elements
            .push(LibraryElementKind::GlobalVariableDeclaration(
                GlobalVariableDeclaration {
                    variables: variables
                        .into_iter()
                        .map(|decl| decl.with_class(VariableClass::Global))
                        .collect(),
                },
            ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AddressLocation::Input, AddressSize::Bit, vec![0, 1], "%IX0.1")]
    #[case(AddressLocation::Output, AddressSize::Word, vec![4], "%QW4")]
    #[case(AddressLocation::Memory, AddressSize::LongWord, vec![2], "%ML2")]
    fn address_assignment_when_display_then_direct_notation(
        #[case] location: AddressLocation,
        #[case] size: AddressSize,
        #[case] address: Vec<u32>,
        #[case] expected: &str,
    ) {
        let assignment = AddressAssignment::new(location, size, address);
        assert_eq!(expected, format!("{assignment}"));
    }

    #[test]
    fn constant_when_typed_integer_then_display_has_type_prefix() {
        assert_eq!("INT#5", format!("{}", ConstantKind::typed_integer("INT", 5)));
    }

    #[test]
    fn constant_when_with_position_then_span_is_position() {
        let constant = ConstantKind::boolean(true).with_position(SourceSpan::range(3, 7));
        assert_eq!(3, constant.span().start);
    }

    #[test]
    fn library_with_globals_when_local_declaration_then_class_is_global() {
        let library = Library::new().with_globals(vec![VarDecl::simple("Level", "INT")]);
        match &library.elements[0] {
            LibraryElementKind::GlobalVariableDeclaration(decl) => {
                assert_eq!(VariableClass::Global, decl.variables[0].class)
            }
            _ => panic!("expected global variable declaration"),
        }
    }
}
