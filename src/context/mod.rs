// src/context/mod.rs
//
// The context hierarchy: the abstract resolution/definition interface
// implemented by both the translation-unit (global) and function-body
// (local) contexts, plus the extension-hook mechanism the node-analysis
// driver invokes at fixed points.

pub mod global;
pub mod local;

pub use global::GlobalContext;
pub use local::{LocalContext, Temporary};

use crate::errors::SemanticError;
use crate::ident::{Initializer, ScopedIdentifier};
use crate::intern::Symbol;
use crate::types::TypeId;

/// Opaque handle to a parser-owned syntax node, forwarded to extension
/// hooks untouched.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct NodeRef(pub u64);

/// Storage class as written in a declaration, before the scope rules
/// assign duration and linkage. `Default` is a declaration with no
/// storage-class specifier.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DeclaredStorage {
    Default,
    Typedef,
    Extern,
    Static,
    ThreadLocal,
    ExternThreadLocal,
    StaticThreadLocal,
    Auto,
    Register,
}

/// Uniform resolution/definition interface over both context kinds.
///
/// The local context resolves through its block scopes and falls through
/// to the global file scope; the global context has no blocks and no
/// labels, so the block and label operations fail there.
pub trait SemanticContext {
    fn resolve_ordinary(&self, name: Symbol) -> Option<&ScopedIdentifier>;
    fn resolve_tag(&self, name: Symbol) -> Option<&ScopedIdentifier>;
    fn resolve_label(&self, name: Symbol) -> Option<&ScopedIdentifier>;

    /// Declare or define an ordinary identifier, applying the
    /// storage-class/linkage merge rules for this scope kind. On error the
    /// namespace is left exactly as before the call.
    fn define_identifier(
        &mut self,
        name: Symbol,
        ty: TypeId,
        storage: DeclaredStorage,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError>;

    /// Declare or define a struct/union/enum tag. Completing an existing
    /// incomplete tag mutates it in place; the returned handle is the
    /// canonical node for the tag in this scope.
    fn define_tag(&mut self, ty: TypeId) -> Result<TypeId, SemanticError>;

    /// Define an enumeration constant in the ordinary namespace.
    fn define_constant(&mut self, name: Symbol, value: i64, ty: TypeId)
        -> Result<(), SemanticError>;

    /// Reference a label, creating a forward placeholder if it is not
    /// defined yet.
    fn reference_label(&mut self, name: Symbol) -> Result<(), SemanticError>;

    fn push_block(&mut self) -> Result<(), SemanticError>;
    fn pop_block(&mut self) -> Result<(), SemanticError>;
}

/// Extension hooks a language extension injects at context construction.
///
/// The node-analysis driver invokes them at fixed points; every method
/// defaults to identity behavior, so the absence of hooks costs nothing.
/// State the extension needs lives on the implementing type itself.
pub trait AnalysisExtensions {
    fn on_init(&mut self, ctx: &mut dyn SemanticContext) -> Result<(), SemanticError> {
        let _ = ctx;
        Ok(())
    }

    fn on_free(&mut self, ctx: &mut dyn SemanticContext) {
        let _ = ctx;
    }

    /// Analyze a node kind this core does not know. Returns true when the
    /// extension handled the node.
    fn analyze_extension_node(
        &mut self,
        ctx: &mut dyn SemanticContext,
        node: NodeRef,
    ) -> Result<bool, SemanticError> {
        let _ = (ctx, node);
        Ok(false)
    }

    fn before_node_analysis(
        &mut self,
        ctx: &mut dyn SemanticContext,
        node: NodeRef,
    ) -> Result<(), SemanticError> {
        let _ = (ctx, node);
        Ok(())
    }

    fn after_node_analysis(
        &mut self,
        ctx: &mut dyn SemanticContext,
        node: NodeRef,
    ) -> Result<(), SemanticError> {
        let _ = (ctx, node);
        Ok(())
    }
}
