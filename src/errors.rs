// src/errors.rs
//! Semantic analysis errors (E3xxx).
//!
//! Every fallible operation in this crate returns exactly one
//! [`SemanticError`]. The engine does not accumulate diagnostics: the first
//! error aborts the declaration being analyzed, and the caller is expected
//! to abort the translation unit. Callers that need to branch on the class
//! of failure use [`SemanticError::kind`] rather than matching variants.
//!
//! No source spans: this core never sees source text (the parser is an
//! external collaborator), so diagnostics carry identifier names and
//! rendered types instead.

use miette::Diagnostic;
use thiserror::Error;

/// Coarse classification of a [`SemanticError`], for callers that branch
/// on the result tag.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// Type compatibility failed where it was required.
    Type,
    /// A declaration violates the storage/linkage merge rules or redefines
    /// an already-defined entity.
    Redeclaration,
    /// No visible declaration in any enclosing scope.
    NotFound,
    /// An illegally formed type (incomplete use, variably-modified member,
    /// function returning function/array, misplaced flexible member).
    MalformedType,
    /// Invariant violation or misuse of the API; not a language diagnostic.
    Internal,
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemanticError {
    #[error("conflicting types for '{name}': '{existing}' vs '{new_type}'")]
    #[diagnostic(code(E3001))]
    ConflictingTypes {
        name: String,
        existing: String,
        new_type: String,
    },

    #[error("redeclaration of '{name}' with incompatible storage class")]
    #[diagnostic(
        code(E3002),
        help("thread-local and non-thread-local declarations of one name cannot be mixed")
    )]
    StorageClassMismatch { name: String },

    #[error("redefinition of '{name}'")]
    #[diagnostic(code(E3003))]
    Redefinition { name: String },

    #[error("'{name}' redeclared as a different kind of symbol")]
    #[diagnostic(code(E3004))]
    KindMismatch { name: String },

    #[error("illegal storage class for '{name}' in this scope")]
    #[diagnostic(code(E3005))]
    IllegalStorage { name: String },

    #[error("redefinition of enumerator '{name}' with a different value")]
    #[diagnostic(code(E3006))]
    EnumeratorMismatch { name: String },

    #[error("use of undeclared identifier '{name}'")]
    #[diagnostic(code(E3010))]
    UndeclaredIdentifier { name: String },

    #[error("use of undeclared tag '{name}'")]
    #[diagnostic(code(E3011))]
    UndeclaredTag { name: String },

    #[error("label '{name}' used but not defined")]
    #[diagnostic(code(E3012))]
    UndefinedLabel { name: String },

    #[error("function cannot return {returned} type '{ty}'")]
    #[diagnostic(code(E3020))]
    InvalidReturnType {
        returned: &'static str,
        ty: String,
    },

    #[error("member '{name}' has incomplete type '{ty}'")]
    #[diagnostic(code(E3021))]
    IncompleteMember { name: String, ty: String },

    #[error("variably modified type '{ty}' cannot be a struct or union member")]
    #[diagnostic(code(E3022))]
    VariablyModifiedMember { ty: String },

    #[error("flexible array member '{name}' is not the last member")]
    #[diagnostic(code(E3023))]
    FlexibleMemberNotLast { name: String },

    #[error("flexible array member in an otherwise empty struct")]
    #[diagnostic(code(E3024))]
    FlexibleMemberAlone,

    #[error("flexible array member is not permitted in a union")]
    #[diagnostic(code(E3025))]
    FlexibleMemberInUnion,

    #[error("bit-field '{name}' has non-integral base type '{ty}'")]
    #[diagnostic(code(E3026))]
    NonIntegralBitField { name: String, ty: String },

    #[error("duplicate member '{name}'")]
    #[diagnostic(code(E3027))]
    DuplicateMember { name: String },

    #[error("variable '{name}' has incomplete type '{ty}'")]
    #[diagnostic(code(E3028), help("complete the type before defining an object of it"))]
    IncompleteObject { name: String, ty: String },

    #[error("block scope operations are not available at file scope")]
    #[diagnostic(code(E3030))]
    NoBlockScope,

    #[error("internal invariant violated: {message}")]
    #[diagnostic(code(E3099))]
    Internal { message: String },
}

impl SemanticError {
    pub fn internal(message: impl Into<String>) -> Self {
        SemanticError::Internal {
            message: message.into(),
        }
    }

    /// The coarse error class the caller branches on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SemanticError::ConflictingTypes { .. } | SemanticError::IllegalStorage { .. } => {
                ErrorKind::Type
            }
            SemanticError::StorageClassMismatch { .. }
            | SemanticError::Redefinition { .. }
            | SemanticError::KindMismatch { .. }
            | SemanticError::EnumeratorMismatch { .. }
            | SemanticError::DuplicateMember { .. } => ErrorKind::Redeclaration,
            SemanticError::UndeclaredIdentifier { .. }
            | SemanticError::UndeclaredTag { .. }
            | SemanticError::UndefinedLabel { .. } => ErrorKind::NotFound,
            SemanticError::InvalidReturnType { .. }
            | SemanticError::IncompleteMember { .. }
            | SemanticError::VariablyModifiedMember { .. }
            | SemanticError::FlexibleMemberNotLast { .. }
            | SemanticError::FlexibleMemberAlone
            | SemanticError::FlexibleMemberInUnion
            | SemanticError::NonIntegralBitField { .. }
            | SemanticError::IncompleteObject { .. } => ErrorKind::MalformedType,
            SemanticError::NoBlockScope | SemanticError::Internal { .. } => ErrorKind::Internal,
        }
    }
}
