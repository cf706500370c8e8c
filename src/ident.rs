// src/ident.rs
//
// The entity stored per declared name in a namespace: objects, functions,
// type aliases, tags, enum constants and labels, plus the storage-class
// and linkage vocabulary their merge rules speak.

use crate::flow::FlowControlPoint;
use crate::types::TypeId;

/// Storage duration/class of an object or function as recorded after
/// declaration analysis. `typedef` is not a storage class here; aliases
/// are a separate [`ScopedIdentifier`] variant.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StorageClass {
    Extern,
    Static,
    ExternThreadLocal,
    StaticThreadLocal,
    Auto,
    Register,
}

impl StorageClass {
    pub fn is_thread_local(self) -> bool {
        matches!(
            self,
            StorageClass::ExternThreadLocal | StorageClass::StaticThreadLocal
        )
    }
}

/// Whether a name denotes the same entity across translation units
/// (`External`), within one only (`Internal`), or is private to its scope
/// (`None`).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Linkage {
    External,
    Internal,
    None,
}

/// `inline`/`_Noreturn` function specifiers. Redeclarations merge by
/// union.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FunctionSpecifier {
    None,
    Inline,
    Noreturn,
    InlineNoreturn,
}

impl FunctionSpecifier {
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            FunctionSpecifier::Inline | FunctionSpecifier::InlineNoreturn
        )
    }

    pub fn is_noreturn(self) -> bool {
        matches!(
            self,
            FunctionSpecifier::Noreturn | FunctionSpecifier::InlineNoreturn
        )
    }

    pub fn merge(self, other: FunctionSpecifier) -> FunctionSpecifier {
        match (
            self.is_inline() || other.is_inline(),
            self.is_noreturn() || other.is_noreturn(),
        ) {
            (false, false) => FunctionSpecifier::None,
            (true, false) => FunctionSpecifier::Inline,
            (false, true) => FunctionSpecifier::Noreturn,
            (true, true) => FunctionSpecifier::InlineNoreturn,
        }
    }
}

/// Opaque handle to a parser-owned initializer. Two definitions conflict
/// when both carry an initializer and the handles differ.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Initializer(pub u64);

/// Requested alignment in bytes; redeclarations merge by maximum.
pub fn merge_alignment(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

/// An object (variable) entry.
///
/// `external` is true while the entity is only declared: the first
/// external-linkage declaration in this translation unit, or a reference
/// to one defined elsewhere. A definition clears it forever.
#[derive(Clone, Debug)]
pub struct ObjectIdentifier {
    pub ty: TypeId,
    pub storage: StorageClass,
    pub linkage: Linkage,
    pub alignment: Option<u32>,
    pub external: bool,
    pub initializer: Option<Initializer>,
}

/// A function entry. `external` mirrors the object flag; `defined` flips
/// when a body is seen.
#[derive(Clone, Debug)]
pub struct FunctionIdentifier {
    pub ty: TypeId,
    pub specifier: FunctionSpecifier,
    pub storage: StorageClass,
    pub external: bool,
    pub defined: bool,
}

/// The resolved, typed record stored for a declared name in a namespace.
#[derive(Clone, Debug)]
pub enum ScopedIdentifier {
    Object(ObjectIdentifier),
    Function(FunctionIdentifier),
    TypeDefinition { ty: TypeId },
    TypeTag { ty: TypeId },
    EnumConstant { value: i64, ty: TypeId },
    /// `point` is None while the label is only referenced (forward
    /// placeholder); defining the label resolves it.
    Label { point: Option<FlowControlPoint> },
}

impl ScopedIdentifier {
    /// The declared type, for the variants that carry one.
    pub fn ty(&self) -> Option<TypeId> {
        match self {
            ScopedIdentifier::Object(obj) => Some(obj.ty),
            ScopedIdentifier::Function(func) => Some(func.ty),
            ScopedIdentifier::TypeDefinition { ty }
            | ScopedIdentifier::TypeTag { ty }
            | ScopedIdentifier::EnumConstant { ty, .. } => Some(*ty),
            ScopedIdentifier::Label { .. } => None,
        }
    }
}
