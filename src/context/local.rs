// src/context/local.rs
//
// Function-body scope: a stack of block scopes over a borrowed global
// context, plus the function-wide flat label namespace, the temporary
// registry and per-function flow-control state.

use rustc_hash::FxHashMap;

use crate::context::global::{merge_tag, tag_info, TagOutcome};
use crate::context::{AnalysisExtensions, DeclaredStorage, GlobalContext, NodeRef, SemanticContext};
use crate::errors::SemanticError;
use crate::flow::{FlowControl, FlowControlPoint};
use crate::ident::{
    FunctionSpecifier, Initializer, Linkage, ObjectIdentifier, ScopedIdentifier, StorageClass,
};
use crate::intern::Symbol;
use crate::types::{ArrayBound, CType, TypeId};

/// A function-local temporary slot, minted during expression analysis.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Temporary {
    pub index: u32,
}

/// Function-body semantic context. Borrows the translation-unit context
/// for the whole function analysis; resolution falls through block scopes
/// to the file scope.
pub struct LocalContext<'g> {
    pub global: &'g mut GlobalContext,
    scopes: crate::scope::ScopeStack,
    labels: FxHashMap<Symbol, ScopedIdentifier>,
    flow: FlowControl,
    temporaries: u32,
    extensions: Option<Box<dyn AnalysisExtensions>>,
}

impl std::fmt::Debug for LocalContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalContext")
            .field("depth", &self.scopes.depth())
            .field("labels", &self.labels.len())
            .finish_non_exhaustive()
    }
}

impl<'g> LocalContext<'g> {
    pub fn new(global: &'g mut GlobalContext) -> Self {
        LocalContext {
            global,
            scopes: crate::scope::ScopeStack::new(),
            labels: FxHashMap::default(),
            flow: FlowControl::new(),
            temporaries: 0,
            extensions: None,
        }
    }

    /// Construct with an injected extension strategy; runs its `on_init`
    /// hook before returning.
    pub fn with_extensions(
        global: &'g mut GlobalContext,
        extensions: Box<dyn AnalysisExtensions>,
    ) -> Result<Self, SemanticError> {
        let mut ctx = Self::new(global);
        ctx.extensions = Some(extensions);
        let mut ext = ctx.extensions.take().expect("just installed");
        let result = ext.on_init(&mut ctx);
        ctx.extensions = Some(ext);
        result?;
        Ok(ctx)
    }

    /// Tear down, running the `on_free` hook.
    pub fn close(mut self) {
        if let Some(mut ext) = self.extensions.take() {
            ext.on_free(&mut self);
        }
    }

    fn name_of(&self, sym: Symbol) -> String {
        self.global.interner.resolve(sym).to_string()
    }

    // ========================================================================
    // Extension hook invocation
    // ========================================================================

    pub fn before_node_analysis(&mut self, node: NodeRef) -> Result<(), SemanticError> {
        self.with_hooks(|ext, ctx| ext.before_node_analysis(ctx, node))
            .unwrap_or(Ok(()))
    }

    pub fn after_node_analysis(&mut self, node: NodeRef) -> Result<(), SemanticError> {
        self.with_hooks(|ext, ctx| ext.after_node_analysis(ctx, node))
            .unwrap_or(Ok(()))
    }

    pub fn analyze_extension_node(&mut self, node: NodeRef) -> Result<bool, SemanticError> {
        self.with_hooks(|ext, ctx| ext.analyze_extension_node(ctx, node))
            .unwrap_or(Ok(false))
    }

    fn with_hooks<R>(
        &mut self,
        f: impl FnOnce(&mut Box<dyn AnalysisExtensions>, &mut dyn SemanticContext) -> R,
    ) -> Option<R> {
        let mut ext = self.extensions.take()?;
        let result = f(&mut ext, self);
        self.extensions = Some(ext);
        Some(result)
    }

    // ========================================================================
    // Block-scope objects
    // ========================================================================

    pub fn define_auto(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        self.define_unlinked(name, ty, StorageClass::Auto, alignment, initializer)
    }

    pub fn define_register(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        self.define_unlinked(name, ty, StorageClass::Register, alignment, initializer)
    }

    pub fn define_static(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        self.define_unlinked(name, ty, StorageClass::Static, alignment, initializer)
    }

    pub fn define_static_thread_local(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        self.define_unlinked(
            name,
            ty,
            StorageClass::StaticThreadLocal,
            alignment,
            initializer,
        )
    }

    /// Block-scope objects without linkage. No merging happens here: a
    /// second declaration of the same name in the same block is a
    /// redefinition, full stop.
    fn define_unlinked(
        &mut self,
        name: Symbol,
        ty: TypeId,
        storage: StorageClass,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        if self.scopes.current().ordinary(name).is_some() {
            return Err(SemanticError::Redefinition {
                name: self.name_of(name),
            });
        }
        self.check_definable(name, ty, initializer.is_some())?;
        self.scopes.current_mut().insert_ordinary(
            name,
            ScopedIdentifier::Object(ObjectIdentifier {
                ty,
                storage,
                linkage: Linkage::None,
                alignment,
                external: false,
                initializer,
            }),
        );
        Ok(())
    }

    /// A block-scope object must have a complete type; an unbounded array
    /// is admitted only when an initializer will complete it.
    fn check_definable(
        &self,
        name: Symbol,
        ty: TypeId,
        has_initializer: bool,
    ) -> Result<(), SemanticError> {
        let types = &self.global.types;
        if types.is_complete(ty) {
            return Ok(());
        }
        if has_initializer {
            if let CType::Array {
                bound: ArrayBound::Unbounded,
                ..
            } = types.get(types.unqualified(ty))
            {
                return Ok(());
            }
        }
        Err(SemanticError::IncompleteObject {
            name: self.name_of(name),
            ty: types.display(&self.global.interner, ty),
        })
    }

    /// `extern` at block scope: merge into the file scope and leave a
    /// marker in the current block so lookup shadows correctly.
    pub fn declare_external(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
    ) -> Result<(), SemanticError> {
        self.check_relinkable(name)?;
        self.global.declare_external(name, ty, alignment)?;
        self.insert_marker(name)
    }

    pub fn declare_external_thread_local(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
    ) -> Result<(), SemanticError> {
        self.check_relinkable(name)?;
        self.global
            .declare_external_thread_local(name, ty, alignment)?;
        self.insert_marker(name)
    }

    /// Function declarations at block scope have external or (inherited)
    /// internal linkage; they merge into the file scope like `extern`
    /// objects do.
    pub fn declare_function(
        &mut self,
        name: Symbol,
        ty: TypeId,
        specifier: FunctionSpecifier,
        storage: DeclaredStorage,
    ) -> Result<(), SemanticError> {
        match storage {
            DeclaredStorage::Default | DeclaredStorage::Extern => {}
            _ => {
                return Err(SemanticError::IllegalStorage {
                    name: self.name_of(name),
                })
            }
        }
        self.check_relinkable(name)?;
        self.global
            .declare_function(name, ty, specifier, DeclaredStorage::Extern)?;
        self.insert_marker(name)
    }

    /// A name already declared in the current block may only be declared
    /// again if the prior entry itself has linkage.
    fn check_relinkable(&self, name: Symbol) -> Result<(), SemanticError> {
        match self.scopes.current().ordinary(name) {
            None => Ok(()),
            Some(ScopedIdentifier::Object(obj)) if obj.linkage != Linkage::None => Ok(()),
            Some(ScopedIdentifier::Function(_)) => Ok(()),
            Some(_) => Err(SemanticError::Redefinition {
                name: self.name_of(name),
            }),
        }
    }

    fn insert_marker(&mut self, name: Symbol) -> Result<(), SemanticError> {
        let entry = self
            .global
            .ordinary
            .get(&name)
            .cloned()
            .ok_or_else(|| SemanticError::internal("file-scope entry missing after merge"))?;
        self.scopes.current_mut().insert_ordinary(name, entry);
        Ok(())
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Define `name:` attached to the given flow-control point. Resolves a
    /// forward placeholder; a second definition is an error.
    pub fn define_label(
        &mut self,
        name: Symbol,
        point: FlowControlPoint,
    ) -> Result<(), SemanticError> {
        match self.labels.get_mut(&name) {
            None => {
                self.labels
                    .insert(name, ScopedIdentifier::Label { point: Some(point) });
                Ok(())
            }
            Some(ScopedIdentifier::Label { point: slot @ None }) => {
                *slot = Some(point);
                Ok(())
            }
            Some(ScopedIdentifier::Label { point: Some(_) }) => {
                Err(SemanticError::Redefinition {
                    name: self.name_of(name),
                })
            }
            Some(_) => Err(SemanticError::internal("non-label in label namespace")),
        }
    }

    /// Verify every referenced label was defined; call at end of function
    /// body.
    pub fn check_labels(&self) -> Result<(), SemanticError> {
        for (name, entry) in &self.labels {
            if matches!(entry, ScopedIdentifier::Label { point: None }) {
                return Err(SemanticError::UndefinedLabel {
                    name: self.name_of(*name),
                });
            }
        }
        Ok(())
    }

    /// Resolution that must succeed: expression analysis uses these when
    /// the name is required to be visible.
    pub fn require_ordinary(&self, name: Symbol) -> Result<&ScopedIdentifier, SemanticError> {
        self.resolve_ordinary(name)
            .ok_or_else(|| SemanticError::UndeclaredIdentifier {
                name: self.name_of(name),
            })
    }

    pub fn require_tag(&self, name: Symbol) -> Result<&ScopedIdentifier, SemanticError> {
        self.resolve_tag(name)
            .ok_or_else(|| SemanticError::UndeclaredTag {
                name: self.name_of(name),
            })
    }

    // ========================================================================
    // Temporaries and flow control
    // ========================================================================

    pub fn allocate_temporary(&mut self) -> Temporary {
        let temp = Temporary {
            index: self.temporaries,
        };
        self.temporaries += 1;
        temp
    }

    pub fn temporary_count(&self) -> u32 {
        self.temporaries
    }

    pub fn new_flow_control_point(&mut self) -> FlowControlPoint {
        self.flow.new_point()
    }

    pub fn current_flow_control_point(&self) -> Option<FlowControlPoint> {
        self.flow.current()
    }

    pub fn set_flow_control_point(&mut self, point: Option<FlowControlPoint>) {
        self.flow.set_current(point);
    }
}

impl SemanticContext for LocalContext<'_> {
    /// Walk block scopes innermost-first, then the file scope. A hit on a
    /// block-scope marker with linkage redirects to the live file-scope
    /// entry, so later file-scope merges are visible through the marker.
    fn resolve_ordinary(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        if let Some(found) = self.scopes.resolve_ordinary(name) {
            let live = match found {
                ScopedIdentifier::Object(obj) if obj.linkage != Linkage::None => {
                    self.global.ordinary.get(&name)
                }
                ScopedIdentifier::Function(_) => self.global.ordinary.get(&name),
                _ => None,
            };
            return live.or(Some(found));
        }
        self.global.ordinary.get(&name)
    }

    fn resolve_tag(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        self.scopes
            .resolve_tag(name)
            .or_else(|| self.global.tags.get(&name))
    }

    fn resolve_label(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        self.labels.get(&name)
    }

    fn define_identifier(
        &mut self,
        name: Symbol,
        ty: TypeId,
        storage: DeclaredStorage,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        match storage {
            DeclaredStorage::Typedef => self.define_type(name, ty),
            _ if self.global.types.is_function(ty) => {
                self.declare_function(name, ty, FunctionSpecifier::None, storage)
            }
            DeclaredStorage::Default | DeclaredStorage::Auto => {
                self.define_auto(name, ty, alignment, initializer)
            }
            DeclaredStorage::Register => self.define_register(name, ty, alignment, initializer),
            DeclaredStorage::Static => self.define_static(name, ty, alignment, initializer),
            DeclaredStorage::StaticThreadLocal => {
                self.define_static_thread_local(name, ty, alignment, initializer)
            }
            DeclaredStorage::Extern => {
                if initializer.is_some() {
                    Err(SemanticError::IllegalStorage {
                        name: self.name_of(name),
                    })
                } else {
                    self.declare_external(name, ty, alignment)
                }
            }
            DeclaredStorage::ExternThreadLocal => {
                if initializer.is_some() {
                    Err(SemanticError::IllegalStorage {
                        name: self.name_of(name),
                    })
                } else {
                    self.declare_external_thread_local(name, ty, alignment)
                }
            }
            // Plain _Thread_local at block scope needs static or extern.
            DeclaredStorage::ThreadLocal => Err(SemanticError::IllegalStorage {
                name: self.name_of(name),
            }),
        }
    }

    /// Tags declare into the current block; an outer-scope tag of the same
    /// name is shadowed, not completed.
    fn define_tag(&mut self, ty: TypeId) -> Result<TypeId, SemanticError> {
        let (_, tag, _) = tag_info(&self.global.types, ty)?;
        let existing = match self.scopes.current().tag(tag) {
            None => None,
            Some(ScopedIdentifier::TypeTag { ty }) => Some(*ty),
            Some(_) => {
                return Err(SemanticError::internal(
                    "tag namespace holds a non-tag identifier",
                ))
            }
        };
        match merge_tag(&mut self.global.types, &self.global.interner, existing, ty)? {
            TagOutcome::Insert(id) => {
                self.scopes
                    .current_mut()
                    .insert_tag(tag, ScopedIdentifier::TypeTag { ty: id });
                Ok(id)
            }
            TagOutcome::Keep(id) => Ok(id),
        }
    }

    fn define_constant(
        &mut self,
        name: Symbol,
        value: i64,
        ty: TypeId,
    ) -> Result<(), SemanticError> {
        match self.scopes.current().ordinary(name) {
            None => {
                self.scopes
                    .current_mut()
                    .insert_ordinary(name, ScopedIdentifier::EnumConstant { value, ty });
                Ok(())
            }
            Some(ScopedIdentifier::EnumConstant {
                value: existing_value,
                ty: existing_ty,
            }) => {
                if *existing_value == value && crate::types::same(&self.global.types, *existing_ty, ty)
                {
                    Ok(())
                } else {
                    Err(SemanticError::EnumeratorMismatch {
                        name: self.name_of(name),
                    })
                }
            }
            Some(_) => Err(SemanticError::KindMismatch {
                name: self.name_of(name),
            }),
        }
    }

    fn reference_label(&mut self, name: Symbol) -> Result<(), SemanticError> {
        self.labels
            .entry(name)
            .or_insert(ScopedIdentifier::Label { point: None });
        Ok(())
    }

    fn push_block(&mut self) -> Result<(), SemanticError> {
        self.scopes.push();
        Ok(())
    }

    fn pop_block(&mut self) -> Result<(), SemanticError> {
        if !self.scopes.pop() {
            return Err(SemanticError::internal(
                "attempted to pop the function-level scope",
            ));
        }
        Ok(())
    }
}

impl LocalContext<'_> {
    /// Typedefs declare into the current block and may shadow outer
    /// declarations of any kind.
    pub fn define_type(&mut self, name: Symbol, ty: TypeId) -> Result<(), SemanticError> {
        match self.scopes.current().ordinary(name) {
            None => {
                self.scopes
                    .current_mut()
                    .insert_ordinary(name, ScopedIdentifier::TypeDefinition { ty });
                Ok(())
            }
            Some(ScopedIdentifier::TypeDefinition { ty: existing }) => {
                if crate::types::same(&self.global.types, *existing, ty) {
                    Ok(())
                } else {
                    Err(SemanticError::ConflictingTypes {
                        name: self.name_of(name),
                        existing: self.global.types.display(&self.global.interner, *existing),
                        new_type: self.global.types.display(&self.global.interner, ty),
                    })
                }
            }
            Some(_) => Err(SemanticError::KindMismatch {
                name: self.name_of(name),
            }),
        }
    }
}
