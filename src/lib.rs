// src/lib.rs
//! Semantic core of a C11 compiler front end.
//!
//! Given a syntax tree produced by an external parser, this crate assigns
//! and merges types, resolves identifiers across nested scopes and the
//! three C namespaces (ordinary, tag, label), and enforces the
//! storage-duration/linkage rules that decide whether two declarations of
//! the same name refer to the same entity.
//!
//! Lexing/parsing, constant-expression evaluation, IR translation and
//! physical layout are external collaborators; they hand this crate opaque
//! handles ([`types::ExprRef`], [`ident::Initializer`], [`context::NodeRef`])
//! and consume the typed results read-only.

pub mod context;
pub mod errors;
pub mod flow;
pub mod ident;
pub mod intern;
pub mod scope;
pub mod target;
pub mod types;

pub use context::{
    AnalysisExtensions, DeclaredStorage, GlobalContext, LocalContext, NodeRef, SemanticContext,
    Temporary,
};
pub use errors::{ErrorKind, SemanticError};
pub use flow::FlowControlPoint;
pub use ident::{
    FunctionSpecifier, Initializer, Linkage, ObjectIdentifier, ScopedIdentifier, StorageClass,
};
pub use intern::{Interner, Symbol};
pub use target::TypeTraits;
pub use types::{
    ArrayBound, CType, EnumBuilder, ExprRef, ParameterMode, Qualifiers, RecordBuilder, RecordKind,
    TypeBundle, TypeId,
};
