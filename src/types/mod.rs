// src/types/mod.rs
//
// The C type model: a closed tagged variant set with exhaustive matching.
//
// Scalars are reserved TypeIds interned once by the TypeBundle; every other
// variant is a heap node owned by the bundle. Record and enum nodes carry an
// explicit `complete` flag that flips exactly once (incomplete -> complete)
// and is never reset.

pub mod bundle;
pub mod compat;
pub mod composite;

pub use bundle::{TypeBundle, TypeId};
pub use compat::{compatible, same};
pub use composite::composite;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::SemanticError;
use crate::intern::Symbol;

/// Opaque handle to a parser-owned expression (a VLA length). The core
/// never evaluates it; identity of the handle is identity of the length.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ExprRef(pub u64);

/// const/restrict/volatile qualifier set.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Qualifiers {
    pub constant: bool,
    pub restricted: bool,
    pub volatile: bool,
}

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers {
        constant: false,
        restricted: false,
        volatile: false,
    };

    pub const CONST: Qualifiers = Qualifiers {
        constant: true,
        restricted: false,
        volatile: false,
    };

    pub const VOLATILE: Qualifiers = Qualifiers {
        constant: false,
        restricted: false,
        volatile: true,
    };

    pub fn is_empty(self) -> bool {
        !self.constant && !self.restricted && !self.volatile
    }

    pub fn union(self, other: Qualifiers) -> Qualifiers {
        Qualifiers {
            constant: self.constant || other.constant,
            restricted: self.restricted || other.restricted,
            volatile: self.volatile || other.volatile,
        }
    }
}

/// Array bound kind. `BoundedStatic`/`VlaStatic` carry the `static`
/// keyword of a parameter array declarator.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ArrayBound {
    Unbounded,
    Bounded(u64),
    BoundedStatic(u64),
    Vla(ExprRef),
    VlaStatic(ExprRef),
}

impl ArrayBound {
    pub fn is_vla(self) -> bool {
        matches!(self, ArrayBound::Vla(_) | ArrayBound::VlaStatic(_))
    }

    pub fn is_static(self) -> bool {
        matches!(self, ArrayBound::BoundedStatic(_) | ArrayBound::VlaStatic(_))
    }

    /// Compile-time length, when the bound is fixed.
    pub fn fixed_length(self) -> Option<u64> {
        match self {
            ArrayBound::Bounded(n) | ArrayBound::BoundedStatic(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RecordKind {
    Struct,
    Union,
}

impl RecordKind {
    pub fn keyword(self) -> &'static str {
        match self {
            RecordKind::Struct => "struct",
            RecordKind::Union => "union",
        }
    }
}

/// One struct/union member.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Field {
    pub name: Option<Symbol>,
    pub ty: TypeId,
    pub bit_width: Option<u32>,
}

/// Struct or union type node. Fields reference other types by non-owning
/// handle; cycles cannot occur because value-type self-containment is
/// rejected (an incomplete member type is an error except the flexible
/// array tail).
#[derive(Clone, Debug)]
pub struct RecordType {
    pub kind: RecordKind,
    pub tag: Option<Symbol>,
    pub complete: bool,
    pub fields: Vec<Field>,
    pub field_index: FxHashMap<Symbol, usize>,
}

impl RecordType {
    pub fn field(&self, name: Symbol) -> Option<&Field> {
        self.field_index.get(&name).map(|&i| &self.fields[i])
    }
}

/// Enumeration type node.
#[derive(Clone, Debug)]
pub struct EnumType {
    pub tag: Option<Symbol>,
    pub complete: bool,
    pub underlying: TypeId,
    pub enumerators: Vec<(Symbol, i64)>,
    pub value_index: FxHashMap<Symbol, i64>,
}

impl EnumType {
    pub fn value(&self, name: Symbol) -> Option<i64> {
        self.value_index.get(&name).copied()
    }
}

/// SmallVec for parameter lists - inline up to 4 covers most functions.
pub type ParamVec = SmallVec<[Parameter; 4]>;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Parameter {
    pub name: Option<Symbol>,
    pub ty: TypeId,
}

/// Parameter list mode of a function type.
///
/// `Empty` is a `()` declaration imposing no constraint;
/// `IdentifiersOnly` is a K&R-style identifier list (names, no types);
/// `Typed` is a prototype.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ParameterMode {
    Empty,
    IdentifiersOnly(Vec<Symbol>),
    Typed(ParamVec),
}

impl ParameterMode {
    /// Declared arity, when the mode fixes one.
    pub fn arity(&self) -> Option<usize> {
        match self {
            ParameterMode::Empty => None,
            ParameterMode::IdentifiersOnly(names) => Some(names.len()),
            ParameterMode::Typed(params) => Some(params.len()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionType {
    pub return_type: TypeId,
    pub parameters: ParameterMode,
    pub variadic: bool,
}

/// The closed variant set. Exhaustive matches in `compat`/`composite`
/// guarantee every new variant is handled everywhere at compile time.
#[derive(Clone, Debug)]
pub enum CType {
    // Scalars - interned once, referenced by reserved TypeId.
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    SignedShort,
    UnsignedShort,
    SignedInt,
    UnsignedInt,
    SignedLong,
    UnsignedLong,
    SignedLongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,

    // Derived types - one bundle-owned node each.
    Pointer(TypeId),
    Qualified {
        inner: TypeId,
        qualifiers: Qualifiers,
    },
    Array {
        element: TypeId,
        bound: ArrayBound,
        qualifiers: Qualifiers,
    },
    Record(RecordType),
    Enum(EnumType),
    Function(FunctionType),
}

// ============================================================================
// Validating builders
// ============================================================================

/// Accumulates struct/union members, enforcing the member-type rules as
/// fields are appended:
/// - no variably-modified member;
/// - no incomplete member, except a flexible array member (unbounded
///   array) which must be last, must not be alone, and is rejected in a
///   union;
/// - bit-field base types must be integral;
/// - member names must be unique.
#[derive(Debug)]
pub struct RecordBuilder {
    kind: RecordKind,
    tag: Option<Symbol>,
    fields: Vec<Field>,
    index: FxHashMap<Symbol, usize>,
    has_flexible: bool,
}

impl RecordBuilder {
    pub fn structure(tag: Option<Symbol>) -> Self {
        Self::new(RecordKind::Struct, tag)
    }

    pub fn union(tag: Option<Symbol>) -> Self {
        Self::new(RecordKind::Union, tag)
    }

    fn new(kind: RecordKind, tag: Option<Symbol>) -> Self {
        RecordBuilder {
            kind,
            tag,
            fields: Vec::new(),
            index: FxHashMap::default(),
            has_flexible: false,
        }
    }

    pub fn field(
        &mut self,
        bundle: &TypeBundle,
        name: Option<Symbol>,
        ty: TypeId,
    ) -> Result<&mut Self, SemanticError> {
        self.push_member(bundle, name, ty, None)
    }

    pub fn bit_field(
        &mut self,
        bundle: &TypeBundle,
        name: Option<Symbol>,
        ty: TypeId,
        width: u32,
    ) -> Result<&mut Self, SemanticError> {
        if !bundle.is_integral(bundle.unqualified(ty)) {
            return Err(SemanticError::NonIntegralBitField {
                name: member_name(bundle, name),
                ty: bundle.display_raw(ty),
            });
        }
        self.push_member(bundle, name, ty, Some(width))
    }

    fn push_member(
        &mut self,
        bundle: &TypeBundle,
        name: Option<Symbol>,
        ty: TypeId,
        bit_width: Option<u32>,
    ) -> Result<&mut Self, SemanticError> {
        if self.has_flexible {
            return Err(SemanticError::FlexibleMemberNotLast {
                name: member_name(bundle, name),
            });
        }
        if bundle.is_variably_modified(ty) {
            return Err(SemanticError::VariablyModifiedMember {
                ty: bundle.display_raw(ty),
            });
        }
        if !bundle.is_complete(ty) {
            let flexible = matches!(
                bundle.get(bundle.unqualified(ty)),
                CType::Array {
                    bound: ArrayBound::Unbounded,
                    ..
                }
            );
            if !flexible {
                return Err(SemanticError::IncompleteMember {
                    name: member_name(bundle, name),
                    ty: bundle.display_raw(ty),
                });
            }
            if self.kind == RecordKind::Union {
                return Err(SemanticError::FlexibleMemberInUnion);
            }
            if self.fields.is_empty() {
                return Err(SemanticError::FlexibleMemberAlone);
            }
            self.has_flexible = true;
        }
        if let Some(sym) = name {
            if self.index.contains_key(&sym) {
                return Err(SemanticError::DuplicateMember {
                    name: member_name(bundle, name),
                });
            }
            self.index.insert(sym, self.fields.len());
        }
        self.fields.push(Field {
            name,
            ty,
            bit_width,
        });
        Ok(self)
    }

    /// Allocate a complete record node in the bundle.
    pub fn build(self, bundle: &mut TypeBundle) -> TypeId {
        bundle.record(RecordType {
            kind: self.kind,
            tag: self.tag,
            complete: true,
            fields: self.fields,
            field_index: self.index,
        })
    }

    /// The accumulated field list, for completing an existing incomplete
    /// tag in place.
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

fn member_name(bundle: &TypeBundle, name: Option<Symbol>) -> String {
    match name {
        Some(sym) => bundle.symbol_hint(sym),
        None => "<anonymous>".to_string(),
    }
}

/// Accumulates enumerators. A missing explicit value continues from the
/// previous one (starting at zero).
#[derive(Debug)]
pub struct EnumBuilder {
    tag: Option<Symbol>,
    underlying: TypeId,
    enumerators: Vec<(Symbol, i64)>,
    index: FxHashMap<Symbol, i64>,
    next_value: i64,
}

impl EnumBuilder {
    pub fn new(tag: Option<Symbol>, underlying: TypeId) -> Self {
        EnumBuilder {
            tag,
            underlying,
            enumerators: Vec::new(),
            index: FxHashMap::default(),
            next_value: 0,
        }
    }

    pub fn enumerator(
        &mut self,
        name: Symbol,
        value: Option<i64>,
    ) -> Result<&mut Self, SemanticError> {
        if self.index.contains_key(&name) {
            return Err(SemanticError::EnumeratorMismatch {
                name: format!("enumerator#{}", name.0),
            });
        }
        let value = value.unwrap_or(self.next_value);
        self.next_value = value + 1;
        self.index.insert(name, value);
        self.enumerators.push((name, value));
        Ok(self)
    }

    /// Allocate a complete enum node in the bundle.
    pub fn build(self, bundle: &mut TypeBundle) -> TypeId {
        bundle.enumeration(EnumType {
            tag: self.tag,
            complete: true,
            underlying: self.underlying,
            enumerators: self.enumerators,
            value_index: self.index,
        })
    }

    pub fn into_parts(self) -> (Vec<(Symbol, i64)>, FxHashMap<Symbol, i64>) {
        (self.enumerators, self.index)
    }
}

/// A function must not return a function or an array.
pub fn validate_function(bundle: &TypeBundle, ty: TypeId) -> Result<(), SemanticError> {
    let func = match bundle.get(ty) {
        CType::Function(f) => f,
        _ => {
            return Err(SemanticError::internal(
                "validate_function called on a non-function type",
            ))
        }
    };
    match bundle.get(bundle.unqualified(func.return_type)) {
        CType::Function(_) => Err(SemanticError::InvalidReturnType {
            returned: "function",
            ty: bundle.display_raw(func.return_type),
        }),
        CType::Array { .. } => Err(SemanticError::InvalidReturnType {
            returned: "array",
            ty: bundle.display_raw(func.return_type),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifier_union() {
        let q = Qualifiers::CONST.union(Qualifiers::VOLATILE);
        assert!(q.constant && q.volatile && !q.restricted);
        assert!(Qualifiers::NONE.is_empty());
        assert!(!q.is_empty());
    }

    #[test]
    fn array_bound_queries() {
        assert_eq!(ArrayBound::Bounded(4).fixed_length(), Some(4));
        assert_eq!(ArrayBound::Unbounded.fixed_length(), None);
        assert!(ArrayBound::VlaStatic(ExprRef(1)).is_vla());
        assert!(ArrayBound::BoundedStatic(2).is_static());
        assert!(!ArrayBound::Bounded(2).is_static());
    }

    #[test]
    fn record_builder_rejects_incomplete_member() {
        let mut bundle = TypeBundle::new();
        let incomplete = bundle.incomplete_structure(Some(Symbol(0)));

        let mut builder = RecordBuilder::structure(None);
        let err = builder
            .field(&bundle, Some(Symbol(1)), incomplete)
            .unwrap_err();
        assert!(matches!(err, SemanticError::IncompleteMember { .. }));
    }

    #[test]
    fn record_builder_accepts_flexible_tail() {
        let mut bundle = TypeBundle::new();
        let tail = bundle.array(TypeId::SIGNED_INT, ArrayBound::Unbounded, Qualifiers::NONE);

        let mut builder = RecordBuilder::structure(None);
        builder
            .field(&bundle, Some(Symbol(0)), TypeId::SIGNED_INT)
            .unwrap();
        builder.field(&bundle, Some(Symbol(1)), tail).unwrap();
        let err = builder
            .field(&bundle, Some(Symbol(2)), TypeId::SIGNED_INT)
            .unwrap_err();
        assert!(matches!(err, SemanticError::FlexibleMemberNotLast { .. }));
    }

    #[test]
    fn record_builder_rejects_lone_flexible_member() {
        let mut bundle = TypeBundle::new();
        let tail = bundle.array(TypeId::SIGNED_INT, ArrayBound::Unbounded, Qualifiers::NONE);

        let mut builder = RecordBuilder::structure(None);
        let err = builder.field(&bundle, Some(Symbol(0)), tail).unwrap_err();
        assert!(matches!(err, SemanticError::FlexibleMemberAlone));
    }

    #[test]
    fn record_builder_rejects_flexible_member_in_union() {
        let mut bundle = TypeBundle::new();
        let tail = bundle.array(TypeId::SIGNED_INT, ArrayBound::Unbounded, Qualifiers::NONE);

        let mut builder = RecordBuilder::union(None);
        builder
            .field(&bundle, Some(Symbol(0)), TypeId::SIGNED_INT)
            .unwrap();
        let err = builder.field(&bundle, Some(Symbol(1)), tail).unwrap_err();
        assert!(matches!(err, SemanticError::FlexibleMemberInUnion));
    }

    #[test]
    fn record_builder_rejects_vla_member() {
        let mut bundle = TypeBundle::new();
        let vla = bundle.array(
            TypeId::SIGNED_INT,
            ArrayBound::Vla(ExprRef(7)),
            Qualifiers::NONE,
        );

        let mut builder = RecordBuilder::structure(None);
        let err = builder.field(&bundle, Some(Symbol(0)), vla).unwrap_err();
        assert!(matches!(err, SemanticError::VariablyModifiedMember { .. }));
    }

    #[test]
    fn record_builder_rejects_duplicate_member() {
        let bundle = TypeBundle::new();
        let mut builder = RecordBuilder::structure(None);
        builder
            .field(&bundle, Some(Symbol(0)), TypeId::SIGNED_INT)
            .unwrap();
        let err = builder
            .field(&bundle, Some(Symbol(0)), TypeId::FLOAT)
            .unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateMember { .. }));
    }

    #[test]
    fn bit_field_base_must_be_integral() {
        let bundle = TypeBundle::new();
        let mut builder = RecordBuilder::structure(None);
        let err = builder
            .bit_field(&bundle, Some(Symbol(0)), TypeId::FLOAT, 3)
            .unwrap_err();
        assert!(matches!(err, SemanticError::NonIntegralBitField { .. }));

        builder
            .bit_field(&bundle, Some(Symbol(1)), TypeId::UNSIGNED_INT, 3)
            .unwrap();
    }

    #[test]
    fn enum_builder_assigns_sequential_values() {
        let mut builder = EnumBuilder::new(None, TypeId::SIGNED_INT);
        builder.enumerator(Symbol(0), None).unwrap();
        builder.enumerator(Symbol(1), Some(10)).unwrap();
        builder.enumerator(Symbol(2), None).unwrap();

        let (enumerators, _) = builder.into_parts();
        assert_eq!(enumerators[0].1, 0);
        assert_eq!(enumerators[1].1, 10);
        assert_eq!(enumerators[2].1, 11);
    }

    #[test]
    fn function_cannot_return_array_or_function() {
        let mut bundle = TypeBundle::new();
        let arr = bundle.array(
            TypeId::SIGNED_INT,
            ArrayBound::Bounded(3),
            Qualifiers::NONE,
        );
        let bad = bundle.function(arr, ParameterMode::Empty, false);
        assert!(matches!(
            validate_function(&bundle, bad),
            Err(SemanticError::InvalidReturnType { .. })
        ));

        let inner = bundle.function(TypeId::SIGNED_INT, ParameterMode::Empty, false);
        let worse = bundle.function(inner, ParameterMode::Empty, false);
        assert!(matches!(
            validate_function(&bundle, worse),
            Err(SemanticError::InvalidReturnType { .. })
        ));

        let fine = bundle.function(TypeId::VOID, ParameterMode::Empty, false);
        assert!(validate_function(&bundle, fine).is_ok());
    }
}
