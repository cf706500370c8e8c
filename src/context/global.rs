// src/context/global.rs
//
// Translation-unit scope: owns the interner, the type bundle and the
// target traits, holds the file-scope ordinary and tag namespaces, and
// applies the file-scope storage-class/linkage merge rules.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::context::{AnalysisExtensions, DeclaredStorage, NodeRef, SemanticContext};
use crate::errors::SemanticError;
use crate::ident::{
    merge_alignment, FunctionIdentifier, FunctionSpecifier, Initializer, Linkage,
    ObjectIdentifier, ScopedIdentifier, StorageClass,
};
use crate::intern::{Interner, Symbol};
use crate::target::TypeTraits;
use crate::types::{composite, same, validate_function, CType, TypeBundle, TypeId};

/// Tag namespace entry classification shared by the global and local
/// `define_tag` implementations.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum TagClass {
    Struct,
    Union,
    Enum,
}

pub(crate) fn tag_info(
    types: &TypeBundle,
    ty: TypeId,
) -> Result<(TagClass, Symbol, bool), SemanticError> {
    match types.get(ty) {
        CType::Record(record) => {
            let tag = record
                .tag
                .ok_or_else(|| SemanticError::internal("define_tag on an untagged record"))?;
            let class = match record.kind {
                crate::types::RecordKind::Struct => TagClass::Struct,
                crate::types::RecordKind::Union => TagClass::Union,
            };
            Ok((class, tag, record.complete))
        }
        CType::Enum(en) => {
            let tag = en
                .tag
                .ok_or_else(|| SemanticError::internal("define_tag on an untagged enum"))?;
            Ok((TagClass::Enum, tag, en.complete))
        }
        _ => Err(SemanticError::internal("define_tag on a non-tag type")),
    }
}

pub(crate) enum TagOutcome {
    /// No prior entry; insert the new node.
    Insert(TypeId),
    /// A prior entry is canonical (possibly just completed in place).
    Keep(TypeId),
}

/// Merge a tag declaration against the existing entry of the same scope,
/// completing an incomplete tag in place when the new declaration brings
/// the field list.
pub(crate) fn merge_tag(
    types: &mut TypeBundle,
    interner: &Interner,
    existing: Option<TypeId>,
    ty: TypeId,
) -> Result<TagOutcome, SemanticError> {
    let (class, tag, complete) = tag_info(types, ty)?;
    let existing_id = match existing {
        None => return Ok(TagOutcome::Insert(ty)),
        Some(id) => id,
    };
    if existing_id == ty {
        return Ok(TagOutcome::Keep(existing_id));
    }

    let (existing_class, _, existing_complete) = tag_info(types, existing_id)?;
    if existing_class != class {
        return Err(SemanticError::KindMismatch {
            name: interner.resolve(tag).to_string(),
        });
    }
    if !complete {
        return Ok(TagOutcome::Keep(existing_id));
    }
    if existing_complete {
        return Err(SemanticError::Redefinition {
            name: interner.resolve(tag).to_string(),
        });
    }

    // Complete the existing node in place; its identity is the tag's
    // identity for the rest of the translation unit.
    match types.get(ty).clone() {
        CType::Record(record) => types.complete_record(existing_id, record.fields)?,
        CType::Enum(en) => types.complete_enumeration(existing_id, en.enumerators, en.value_index)?,
        _ => unreachable!("tag_info admits only records and enums"),
    }
    Ok(TagOutcome::Keep(existing_id))
}

/// File-scope storage merge table. Thread-local and non-thread-local
/// declarations never mix; a `static` redeclaration of an `extern` entity
/// gives it internal linkage.
pub(crate) fn merge_storage(
    interner: &Interner,
    name: Symbol,
    existing: StorageClass,
    new: StorageClass,
) -> Result<StorageClass, SemanticError> {
    use StorageClass::*;
    match (existing, new) {
        (Extern, Extern) => Ok(Extern),
        (Extern, Static) | (Static, Extern) | (Static, Static) => Ok(Static),
        (ExternThreadLocal, ExternThreadLocal) => Ok(ExternThreadLocal),
        (StaticThreadLocal, StaticThreadLocal) => Ok(StaticThreadLocal),
        _ => Err(SemanticError::StorageClassMismatch {
            name: interner.resolve(name).to_string(),
        }),
    }
}

fn linkage_of(storage: StorageClass) -> Linkage {
    match storage {
        StorageClass::Extern | StorageClass::ExternThreadLocal => Linkage::External,
        StorageClass::Static | StorageClass::StaticThreadLocal => Linkage::Internal,
        StorageClass::Auto | StorageClass::Register => Linkage::None,
    }
}

/// Translation-unit semantic context.
///
/// Created once per translation unit; dropping it frees the type bundle
/// and the interner it owns. Local contexts borrow it and never outlive
/// it.
pub struct GlobalContext {
    pub interner: Interner,
    pub types: TypeBundle,
    pub traits: TypeTraits,
    pub(crate) ordinary: FxHashMap<Symbol, ScopedIdentifier>,
    pub(crate) tags: FxHashMap<Symbol, ScopedIdentifier>,
    pending_external: FxHashSet<Symbol>,
    extensions: Option<Box<dyn AnalysisExtensions>>,
}

impl std::fmt::Debug for GlobalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalContext")
            .field("ordinary_count", &self.ordinary.len())
            .field("tags_count", &self.tags.len())
            .finish_non_exhaustive()
    }
}

impl GlobalContext {
    pub fn new(traits: TypeTraits) -> Self {
        GlobalContext {
            interner: Interner::new(),
            types: TypeBundle::new(),
            traits,
            ordinary: FxHashMap::default(),
            tags: FxHashMap::default(),
            pending_external: FxHashSet::default(),
            extensions: None,
        }
    }

    /// Construct with an injected extension strategy; runs its `on_init`
    /// hook before returning.
    pub fn with_extensions(
        traits: TypeTraits,
        extensions: Box<dyn AnalysisExtensions>,
    ) -> Result<Self, SemanticError> {
        let mut ctx = Self::new(traits);
        ctx.extensions = Some(extensions);
        let mut ext = ctx.extensions.take().expect("just installed");
        let result = ext.on_init(&mut ctx);
        ctx.extensions = Some(ext);
        result?;
        Ok(ctx)
    }

    /// Tear down, running the `on_free` hook. Plain `Drop` also frees
    /// everything; this exists for extensions that must observe teardown.
    pub fn close(mut self) {
        if let Some(mut ext) = self.extensions.take() {
            ext.on_free(&mut self);
        }
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        self.interner.intern(s)
    }

    fn name_of(&self, sym: Symbol) -> String {
        self.interner.resolve(sym).to_string()
    }

    // ========================================================================
    // Extension hook invocation (called by the node-analysis driver)
    // ========================================================================

    pub fn before_node_analysis(&mut self, node: NodeRef) -> Result<(), SemanticError> {
        self.with_hooks(|ext, ctx| ext.before_node_analysis(ctx, node))
            .unwrap_or(Ok(()))
    }

    pub fn after_node_analysis(&mut self, node: NodeRef) -> Result<(), SemanticError> {
        self.with_hooks(|ext, ctx| ext.after_node_analysis(ctx, node))
            .unwrap_or(Ok(()))
    }

    /// Returns Ok(false) when no extension is installed or the installed
    /// one does not handle the node.
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
    // File-scope objects
    // ========================================================================

    pub fn declare_external(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
    ) -> Result<(), SemanticError> {
        self.declare_object(name, ty, StorageClass::Extern, alignment, None, true)
    }

    pub fn declare_external_thread_local(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
    ) -> Result<(), SemanticError> {
        self.declare_object(name, ty, StorageClass::ExternThreadLocal, alignment, None, true)
    }

    pub fn define_external(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        if initializer.is_some() {
            self.check_definable(name, ty)?;
        }
        self.declare_object(name, ty, StorageClass::Extern, alignment, initializer, false)
    }

    pub fn define_external_thread_local(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        if initializer.is_some() {
            self.check_definable(name, ty)?;
        }
        self.declare_object(
            name,
            ty,
            StorageClass::ExternThreadLocal,
            alignment,
            initializer,
            false,
        )
    }

    pub fn define_static(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        if initializer.is_some() {
            self.check_definable(name, ty)?;
        }
        self.declare_object(name, ty, StorageClass::Static, alignment, initializer, false)
    }

    pub fn define_static_thread_local(
        &mut self,
        name: Symbol,
        ty: TypeId,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
    ) -> Result<(), SemanticError> {
        if initializer.is_some() {
            self.check_definable(name, ty)?;
        }
        self.declare_object(
            name,
            ty,
            StorageClass::StaticThreadLocal,
            alignment,
            initializer,
            false,
        )
    }

    /// An initializer-carrying definition needs a complete object type;
    /// an unbounded array is admitted because the initializer completes it
    /// (the driver supplies the refined type).
    fn check_definable(&self, name: Symbol, ty: TypeId) -> Result<(), SemanticError> {
        if self.types.is_complete(ty) {
            return Ok(());
        }
        if let CType::Array {
            bound: crate::types::ArrayBound::Unbounded,
            ..
        } = self.types.get(self.types.unqualified(ty))
        {
            return Ok(());
        }
        Err(SemanticError::IncompleteObject {
            name: self.name_of(name),
            ty: self.types.display(&self.interner, ty),
        })
    }

    /// The shared file-scope object path. `declaration_only` marks the
    /// declare_* entry points, which leave the entity pending; the
    /// define_* entry points clear `external` even without an
    /// initializer (tentative definition).
    fn declare_object(
        &mut self,
        name: Symbol,
        ty: TypeId,
        storage: StorageClass,
        alignment: Option<u32>,
        initializer: Option<Initializer>,
        declaration_only: bool,
    ) -> Result<(), SemanticError> {
        let merged = match self.ordinary.get(&name) {
            None => {
                let external = declaration_only;
                ObjectIdentifier {
                    ty,
                    storage,
                    linkage: linkage_of(storage),
                    alignment,
                    external,
                    initializer,
                }
            }
            Some(ScopedIdentifier::Object(existing)) => {
                let existing = existing.clone();
                let merged_storage =
                    merge_storage(&self.interner, name, existing.storage, storage)?;
                let merged_ty = composite(&mut self.types, &self.traits, existing.ty, ty)
                    .ok_or_else(|| SemanticError::ConflictingTypes {
                        name: self.interner.resolve(name).to_string(),
                        existing: self.types.display(&self.interner, existing.ty),
                        new_type: self.types.display(&self.interner, ty),
                    })?;
                let merged_initializer = match (existing.initializer, initializer) {
                    (Some(old), Some(new)) if old != new => {
                        return Err(SemanticError::Redefinition {
                            name: self.name_of(name),
                        })
                    }
                    (old, new) => old.or(new),
                };
                let external = existing.external && declaration_only;
                ObjectIdentifier {
                    ty: merged_ty,
                    storage: merged_storage,
                    linkage: linkage_of(merged_storage),
                    alignment: merge_alignment(existing.alignment, alignment),
                    external: external && merged_initializer.is_none(),
                    initializer: merged_initializer,
                }
            }
            Some(_) => {
                return Err(SemanticError::KindMismatch {
                    name: self.name_of(name),
                })
            }
        };

        tracing::trace!(
            name = self.interner.resolve(name),
            storage = ?merged.storage,
            linkage = ?merged.linkage,
            external = merged.external,
            "file-scope object"
        );
        if merged.external {
            self.pending_external.insert(name);
        } else {
            self.pending_external.remove(&name);
        }
        self.ordinary.insert(name, ScopedIdentifier::Object(merged));
        Ok(())
    }

    // ========================================================================
    // Functions
    // ========================================================================

    pub fn declare_function(
        &mut self,
        name: Symbol,
        ty: TypeId,
        specifier: FunctionSpecifier,
        storage: DeclaredStorage,
    ) -> Result<(), SemanticError> {
        let storage = self.function_storage(name, storage)?;
        self.declare_function_impl(name, ty, specifier, storage, false)
    }

    #[tracing::instrument(skip(self, ty, specifier, storage), fields(name = name.0))]
    pub fn define_function(
        &mut self,
        name: Symbol,
        ty: TypeId,
        specifier: FunctionSpecifier,
        storage: DeclaredStorage,
    ) -> Result<(), SemanticError> {
        let storage = self.function_storage(name, storage)?;
        self.declare_function_impl(name, ty, specifier, storage, true)
    }

    fn function_storage(
        &self,
        name: Symbol,
        storage: DeclaredStorage,
    ) -> Result<StorageClass, SemanticError> {
        match storage {
            DeclaredStorage::Default | DeclaredStorage::Extern => Ok(StorageClass::Extern),
            DeclaredStorage::Static => Ok(StorageClass::Static),
            _ => Err(SemanticError::IllegalStorage {
                name: self.name_of(name),
            }),
        }
    }

    fn declare_function_impl(
        &mut self,
        name: Symbol,
        ty: TypeId,
        specifier: FunctionSpecifier,
        storage: StorageClass,
        define: bool,
    ) -> Result<(), SemanticError> {
        validate_function(&self.types, ty)?;

        let merged = match self.ordinary.get(&name) {
            None => FunctionIdentifier {
                ty,
                specifier,
                storage,
                external: !define,
                defined: define,
            },
            Some(ScopedIdentifier::Function(existing)) => {
                let existing = existing.clone();
                if define && existing.defined {
                    return Err(SemanticError::Redefinition {
                        name: self.name_of(name),
                    });
                }
                let merged_storage =
                    merge_storage(&self.interner, name, existing.storage, storage)?;
                let merged_ty = composite(&mut self.types, &self.traits, existing.ty, ty)
                    .ok_or_else(|| SemanticError::ConflictingTypes {
                        name: self.interner.resolve(name).to_string(),
                        existing: self.types.display(&self.interner, existing.ty),
                        new_type: self.types.display(&self.interner, ty),
                    })?;
                FunctionIdentifier {
                    ty: merged_ty,
                    specifier: existing.specifier.merge(specifier),
                    storage: merged_storage,
                    external: existing.external && !define,
                    defined: existing.defined || define,
                }
            }
            Some(_) => {
                return Err(SemanticError::KindMismatch {
                    name: self.name_of(name),
                })
            }
        };

        if merged.external {
            self.pending_external.insert(name);
        } else {
            self.pending_external.remove(&name);
        }
        self.ordinary
            .insert(name, ScopedIdentifier::Function(merged));
        Ok(())
    }

    // ========================================================================
    // Typedefs, constants, tags
    // ========================================================================

    pub fn define_type(&mut self, name: Symbol, ty: TypeId) -> Result<(), SemanticError> {
        match self.ordinary.get(&name) {
            None => {
                self.ordinary
                    .insert(name, ScopedIdentifier::TypeDefinition { ty });
                Ok(())
            }
            Some(ScopedIdentifier::TypeDefinition { ty: existing }) => {
                if same(&self.types, *existing, ty) {
                    Ok(())
                } else {
                    Err(SemanticError::ConflictingTypes {
                        name: self.name_of(name),
                        existing: self.types.display(&self.interner, *existing),
                        new_type: self.types.display(&self.interner, ty),
                    })
                }
            }
            Some(_) => Err(SemanticError::KindMismatch {
                name: self.name_of(name),
            }),
        }
    }

    /// Resolution that must succeed: expression analysis uses these when
    /// the name is required to be visible.
    pub fn require_ordinary(&self, name: Symbol) -> Result<&ScopedIdentifier, SemanticError> {
        self.ordinary
            .get(&name)
            .ok_or_else(|| SemanticError::UndeclaredIdentifier {
                name: self.name_of(name),
            })
    }

    pub fn require_tag(&self, name: Symbol) -> Result<&ScopedIdentifier, SemanticError> {
        self.tags
            .get(&name)
            .ok_or_else(|| SemanticError::UndeclaredTag {
                name: self.name_of(name),
            })
    }

    /// Registry of names declared with external linkage whose definition
    /// is still pending in this translation unit.
    pub fn has_pending_external(&self, name: Symbol) -> bool {
        self.pending_external.contains(&name)
    }

    pub fn pending_external_definitions(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.pending_external.iter().copied()
    }
}

impl SemanticContext for GlobalContext {
    fn resolve_ordinary(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        self.ordinary.get(&name)
    }

    fn resolve_tag(&self, name: Symbol) -> Option<&ScopedIdentifier> {
        self.tags.get(&name)
    }

    fn resolve_label(&self, _name: Symbol) -> Option<&ScopedIdentifier> {
        None
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
            _ if self.types.is_function(ty) => {
                self.declare_function(name, ty, FunctionSpecifier::None, storage)
            }
            DeclaredStorage::Extern => {
                if initializer.is_some() {
                    self.define_external(name, ty, alignment, initializer)
                } else {
                    self.declare_external(name, ty, alignment)
                }
            }
            DeclaredStorage::Default => self.define_external(name, ty, alignment, initializer),
            DeclaredStorage::Static => self.define_static(name, ty, alignment, initializer),
            DeclaredStorage::StaticThreadLocal => {
                self.define_static_thread_local(name, ty, alignment, initializer)
            }
            DeclaredStorage::ThreadLocal | DeclaredStorage::ExternThreadLocal => {
                if initializer.is_some() {
                    self.define_external_thread_local(name, ty, alignment, initializer)
                } else {
                    self.declare_external_thread_local(name, ty, alignment)
                }
            }
            DeclaredStorage::Auto | DeclaredStorage::Register => {
                Err(SemanticError::IllegalStorage {
                    name: self.name_of(name),
                })
            }
        }
    }

    fn define_tag(&mut self, ty: TypeId) -> Result<TypeId, SemanticError> {
        let (_, tag, _) = tag_info(&self.types, ty)?;
        let existing = match self.tags.get(&tag) {
            None => None,
            Some(ScopedIdentifier::TypeTag { ty }) => Some(*ty),
            Some(_) => {
                return Err(SemanticError::internal(
                    "tag namespace holds a non-tag identifier",
                ))
            }
        };
        match merge_tag(&mut self.types, &self.interner, existing, ty)? {
            TagOutcome::Insert(id) => {
                self.tags.insert(tag, ScopedIdentifier::TypeTag { ty: id });
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
        match self.ordinary.get(&name) {
            None => {
                self.ordinary
                    .insert(name, ScopedIdentifier::EnumConstant { value, ty });
                Ok(())
            }
            Some(ScopedIdentifier::EnumConstant {
                value: existing_value,
                ty: existing_ty,
            }) => {
                if *existing_value == value && same(&self.types, *existing_ty, ty) {
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

    fn reference_label(&mut self, _name: Symbol) -> Result<(), SemanticError> {
        Err(SemanticError::NoBlockScope)
    }

    fn push_block(&mut self) -> Result<(), SemanticError> {
        Err(SemanticError::NoBlockScope)
    }

    fn pop_block(&mut self) -> Result<(), SemanticError> {
        Err(SemanticError::NoBlockScope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GlobalContext {
        GlobalContext::new(TypeTraits::host())
    }

    #[test]
    fn extern_then_static_becomes_internal() {
        let mut ctx = ctx();
        let x = ctx.intern("x");
        ctx.declare_external(x, TypeId::SIGNED_INT, None).unwrap();
        assert!(ctx.has_pending_external(x));

        ctx.define_static(x, TypeId::SIGNED_INT, None, None).unwrap();
        match ctx.resolve_ordinary(x) {
            Some(ScopedIdentifier::Object(obj)) => {
                assert_eq!(obj.storage, StorageClass::Static);
                assert_eq!(obj.linkage, Linkage::Internal);
                assert!(!obj.external);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!ctx.has_pending_external(x));

        let err = ctx
            .declare_external_thread_local(x, TypeId::SIGNED_INT, None)
            .unwrap_err();
        assert!(matches!(err, SemanticError::StorageClassMismatch { .. }));
    }

    #[test]
    fn thread_local_rows_reject_mixing() {
        let mut ctx = ctx();
        let x = ctx.intern("x");
        ctx.declare_external_thread_local(x, TypeId::SIGNED_INT, None)
            .unwrap();

        assert!(ctx.declare_external(x, TypeId::SIGNED_INT, None).is_err());
        assert!(ctx
            .define_static(x, TypeId::SIGNED_INT, None, None)
            .is_err());
        assert!(ctx
            .define_static_thread_local(x, TypeId::SIGNED_INT, None, None)
            .is_err());
        ctx.define_external_thread_local(x, TypeId::SIGNED_INT, None, None)
            .unwrap();
    }

    #[test]
    fn redeclaration_composites_the_type() {
        let mut ctx = ctx();
        let a = ctx.intern("a");
        let unbounded = ctx.types.array(
            TypeId::SIGNED_INT,
            crate::types::ArrayBound::Unbounded,
            crate::types::Qualifiers::NONE,
        );
        let four = ctx.types.array(
            TypeId::SIGNED_INT,
            crate::types::ArrayBound::Bounded(4),
            crate::types::Qualifiers::NONE,
        );

        ctx.declare_external(a, unbounded, None).unwrap();
        ctx.declare_external(a, four, None).unwrap();

        let ty = ctx.resolve_ordinary(a).unwrap().ty().unwrap();
        assert_eq!(
            ctx.types.unwrap_array(ty).unwrap().1,
            crate::types::ArrayBound::Bounded(4)
        );
    }

    #[test]
    fn incompatible_redeclaration_is_rejected_without_mutation() {
        let mut ctx = ctx();
        let a = ctx.intern("a");
        ctx.declare_external(a, TypeId::SIGNED_INT, None).unwrap();

        let err = ctx.declare_external(a, TypeId::FLOAT, None).unwrap_err();
        assert!(matches!(err, SemanticError::ConflictingTypes { .. }));

        // Namespace untouched.
        let ty = ctx.resolve_ordinary(a).unwrap().ty().unwrap();
        assert_eq!(ty, TypeId::SIGNED_INT);
        assert!(ctx.has_pending_external(a));
    }

    #[test]
    fn conflicting_initializers_are_rejected() {
        let mut ctx = ctx();
        let x = ctx.intern("x");
        ctx.define_external(x, TypeId::SIGNED_INT, None, Some(Initializer(1)))
            .unwrap();

        // Same initializer handle: a repeat of the same definition.
        ctx.define_external(x, TypeId::SIGNED_INT, None, Some(Initializer(1)))
            .unwrap();

        let err = ctx
            .define_external(x, TypeId::SIGNED_INT, None, Some(Initializer(2)))
            .unwrap_err();
        assert!(matches!(err, SemanticError::Redefinition { .. }));

        // A plain declaration after the definition does not resurrect
        // the pending-external state.
        ctx.declare_external(x, TypeId::SIGNED_INT, None).unwrap();
        assert!(!ctx.has_pending_external(x));
    }

    #[test]
    fn definition_with_incomplete_type_is_rejected() {
        let mut ctx = ctx();
        let s_tag = ctx.intern("S");
        let x = ctx.intern("x");
        let incomplete = ctx.types.incomplete_structure(Some(s_tag));

        // Declaring is fine, defining with an initializer is not.
        ctx.declare_external(x, incomplete, None).unwrap();
        let err = ctx
            .define_external(x, incomplete, None, Some(Initializer(0)))
            .unwrap_err();
        assert!(matches!(err, SemanticError::IncompleteObject { .. }));
    }

    #[test]
    fn tag_completion_in_place() {
        let mut ctx = ctx();
        let s = ctx.intern("S");
        let member = ctx.intern("a");

        let incomplete = ctx.types.incomplete_structure(Some(s));
        let id1 = ctx.define_tag(incomplete).unwrap();
        assert_eq!(id1, incomplete);
        assert!(!ctx.types.is_complete(id1));

        let mut builder = crate::types::RecordBuilder::structure(Some(s));
        builder.field(&ctx.types, Some(member), TypeId::SIGNED_INT).unwrap();
        let complete = builder.build(&mut ctx.types);

        let id2 = ctx.define_tag(complete).unwrap();
        assert_eq!(id2, incomplete); // same node, completed in place
        assert!(ctx.types.is_complete(incomplete));

        // Redefining the now-complete tag is rejected.
        let mut builder = crate::types::RecordBuilder::structure(Some(s));
        builder.field(&ctx.types, Some(member), TypeId::FLOAT).unwrap();
        let again = builder.build(&mut ctx.types);
        assert!(matches!(
            ctx.define_tag(again),
            Err(SemanticError::Redefinition { .. })
        ));

        // A different kind with the same name is rejected too.
        let union_s = ctx.types.incomplete_union(Some(s));
        assert!(matches!(
            ctx.define_tag(union_s),
            Err(SemanticError::KindMismatch { .. })
        ));
    }

    #[test]
    fn typedef_redeclaration_must_name_same_type() {
        let mut ctx = ctx();
        let t = ctx.intern("word");
        ctx.define_type(t, TypeId::SIGNED_INT).unwrap();
        ctx.define_type(t, TypeId::SIGNED_INT).unwrap();
        assert!(matches!(
            ctx.define_type(t, TypeId::UNSIGNED_INT),
            Err(SemanticError::ConflictingTypes { .. })
        ));
    }

    #[test]
    fn enum_constants_live_in_ordinary_namespace() {
        let mut ctx = ctx();
        let red = ctx.intern("RED");
        ctx.define_constant(red, 0, TypeId::SIGNED_INT).unwrap();

        // Same value and type: harmless redeclaration.
        ctx.define_constant(red, 0, TypeId::SIGNED_INT).unwrap();

        // Different value: rejected.
        assert!(matches!(
            ctx.define_constant(red, 1, TypeId::SIGNED_INT),
            Err(SemanticError::EnumeratorMismatch { .. })
        ));

        // The name is taken in the ordinary namespace.
        assert!(matches!(
            ctx.declare_external(red, TypeId::SIGNED_INT, None),
            Err(SemanticError::KindMismatch { .. })
        ));
    }

    #[test]
    fn function_declare_then_define() {
        let mut ctx = ctx();
        let f = ctx.intern("f");
        let fty = ctx
            .types
            .function(TypeId::SIGNED_INT, crate::types::ParameterMode::Empty, false);

        ctx.declare_function(f, fty, FunctionSpecifier::None, DeclaredStorage::Default)
            .unwrap();
        assert!(ctx.has_pending_external(f));

        ctx.define_function(f, fty, FunctionSpecifier::Inline, DeclaredStorage::Default)
            .unwrap();
        match ctx.resolve_ordinary(f) {
            Some(ScopedIdentifier::Function(func)) => {
                assert!(func.defined);
                assert!(!func.external);
                assert_eq!(func.specifier, FunctionSpecifier::Inline);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!ctx.has_pending_external(f));

        // A second body is a redefinition.
        assert!(matches!(
            ctx.define_function(f, fty, FunctionSpecifier::None, DeclaredStorage::Default),
            Err(SemanticError::Redefinition { .. })
        ));
    }

    #[test]
    fn function_cannot_return_array() {
        let mut ctx = ctx();
        let f = ctx.intern("f");
        let arr = ctx.types.array(
            TypeId::SIGNED_INT,
            crate::types::ArrayBound::Bounded(2),
            crate::types::Qualifiers::NONE,
        );
        let fty = ctx
            .types
            .function(arr, crate::types::ParameterMode::Empty, false);
        assert!(matches!(
            ctx.declare_function(f, fty, FunctionSpecifier::None, DeclaredStorage::Default),
            Err(SemanticError::InvalidReturnType { .. })
        ));
    }

    #[test]
    fn global_context_has_no_blocks_or_labels() {
        let mut ctx = ctx();
        let l = ctx.intern("l");
        assert!(matches!(ctx.push_block(), Err(SemanticError::NoBlockScope)));
        assert!(matches!(ctx.pop_block(), Err(SemanticError::NoBlockScope)));
        assert!(matches!(
            ctx.reference_label(l),
            Err(SemanticError::NoBlockScope)
        ));
        assert!(ctx.resolve_label(l).is_none());
    }

    #[test]
    fn auto_storage_is_illegal_at_file_scope() {
        let mut ctx = ctx();
        let x = ctx.intern("x");
        assert!(matches!(
            ctx.define_identifier(x, TypeId::SIGNED_INT, DeclaredStorage::Auto, None, None),
            Err(SemanticError::IllegalStorage { .. })
        ));
    }
}
