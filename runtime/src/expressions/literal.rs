use stint_dsl::core::Id;

use crate::datatypes::TypeRef;
use crate::value::Value;

/// A constant from the source text.
#[derive(Clone, Debug)]
pub struct Literal {
    pub value: Box<dyn Value>,
    pub data_type: TypeRef,
}

impl Literal {
    pub fn new(value: Box<dyn Value>, data_type: TypeRef) -> Self {
        Self { value, data_type }
    }
}

/// An identifier that resolved to a value of an enumeration.
#[derive(Clone, Debug)]
pub struct EnumConstant {
    pub name: Id,
    pub value: Box<dyn Value>,
    pub data_type: TypeRef,
    /// The value names the type, as in `Color#Green`. Otherwise the type
    /// comes from where the value is used.
    pub typed: bool,
}
