// src/types/bundle.rs
//
// Arena ownership for every derived type of a translation unit.
//
// TypeId is a u32 handle; scalars occupy reserved indices interned once at
// construction, so scalar identity is handle equality and scalar lookup
// never allocates. Derived types are appended, never deduplicated: C tag
// types are nominal and complete in place, so two calls to a constructor
// produce two distinct nodes and `same`/`compatible` compare structurally.
// Dropping the bundle frees every owned node exactly once.

use crate::intern::{Interner, Symbol};
use crate::types::{
    ArrayBound, CType, EnumType, Field, FunctionType, ParameterMode, Qualifiers, RecordKind,
    RecordType,
};
use rustc_hash::FxHashMap;

use crate::errors::SemanticError;

/// Handle to a type owned by a [`TypeBundle`]. Copy, trivially comparable.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeId(u32);

impl TypeId {
    // Reserved ids, guaranteed by TypeBundle::new() to be interned at
    // these indices.
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const CHAR: TypeId = TypeId(2);
    pub const SIGNED_CHAR: TypeId = TypeId(3);
    pub const UNSIGNED_CHAR: TypeId = TypeId(4);
    pub const SIGNED_SHORT: TypeId = TypeId(5);
    pub const UNSIGNED_SHORT: TypeId = TypeId(6);
    pub const SIGNED_INT: TypeId = TypeId(7);
    pub const UNSIGNED_INT: TypeId = TypeId(8);
    pub const SIGNED_LONG: TypeId = TypeId(9);
    pub const UNSIGNED_LONG: TypeId = TypeId(10);
    pub const SIGNED_LONG_LONG: TypeId = TypeId(11);
    pub const UNSIGNED_LONG_LONG: TypeId = TypeId(12);
    pub const FLOAT: TypeId = TypeId(13);
    pub const DOUBLE: TypeId = TypeId(14);
    pub const LONG_DOUBLE: TypeId = TypeId(15);

    /// First non-reserved index (derived types).
    pub const FIRST_DERIVED: u32 = 16;

    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_scalar_id(self) -> bool {
        self.0 < Self::FIRST_DERIVED
    }
}

/// Per-translation-unit type storage.
pub struct TypeBundle {
    types: Vec<CType>,
}

impl std::fmt::Debug for TypeBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeBundle")
            .field("types_count", &self.types.len())
            .finish_non_exhaustive()
    }
}

impl TypeBundle {
    /// Create a bundle with every scalar pre-interned at its reserved id.
    pub fn new() -> Self {
        let mut bundle = TypeBundle { types: Vec::new() };

        // Order must match the TypeId constants; the debug_asserts verify.
        let scalars = [
            (CType::Void, TypeId::VOID),
            (CType::Bool, TypeId::BOOL),
            (CType::Char, TypeId::CHAR),
            (CType::SignedChar, TypeId::SIGNED_CHAR),
            (CType::UnsignedChar, TypeId::UNSIGNED_CHAR),
            (CType::SignedShort, TypeId::SIGNED_SHORT),
            (CType::UnsignedShort, TypeId::UNSIGNED_SHORT),
            (CType::SignedInt, TypeId::SIGNED_INT),
            (CType::UnsignedInt, TypeId::UNSIGNED_INT),
            (CType::SignedLong, TypeId::SIGNED_LONG),
            (CType::UnsignedLong, TypeId::UNSIGNED_LONG),
            (CType::SignedLongLong, TypeId::SIGNED_LONG_LONG),
            (CType::UnsignedLongLong, TypeId::UNSIGNED_LONG_LONG),
            (CType::Float, TypeId::FLOAT),
            (CType::Double, TypeId::DOUBLE),
            (CType::LongDouble, TypeId::LONG_DOUBLE),
        ];
        for (ty, expected) in scalars {
            let id = bundle.append(ty);
            debug_assert_eq!(id, expected);
        }

        bundle
    }

    fn append(&mut self, ty: CType) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &CType {
        &self.types[id.0 as usize]
    }

    fn get_mut(&mut self, id: TypeId) -> &mut CType {
        &mut self.types[id.0 as usize]
    }

    /// Number of nodes owned by the bundle (scalars included).
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ========================================================================
    // Constructors - each allocates exactly one owned node
    // ========================================================================

    pub fn pointer(&mut self, referenced: TypeId) -> TypeId {
        self.append(CType::Pointer(referenced))
    }

    pub fn qualified(&mut self, inner: TypeId, qualifiers: Qualifiers) -> TypeId {
        self.append(CType::Qualified { inner, qualifiers })
    }

    pub fn array(&mut self, element: TypeId, bound: ArrayBound, qualifiers: Qualifiers) -> TypeId {
        self.append(CType::Array {
            element,
            bound,
            qualifiers,
        })
    }

    pub(crate) fn record(&mut self, record: RecordType) -> TypeId {
        self.append(CType::Record(record))
    }

    pub(crate) fn enumeration(&mut self, en: EnumType) -> TypeId {
        self.append(CType::Enum(en))
    }

    pub fn incomplete_structure(&mut self, tag: Option<Symbol>) -> TypeId {
        self.record(RecordType {
            kind: RecordKind::Struct,
            tag,
            complete: false,
            fields: Vec::new(),
            field_index: FxHashMap::default(),
        })
    }

    pub fn incomplete_union(&mut self, tag: Option<Symbol>) -> TypeId {
        self.record(RecordType {
            kind: RecordKind::Union,
            tag,
            complete: false,
            fields: Vec::new(),
            field_index: FxHashMap::default(),
        })
    }

    pub fn incomplete_enumeration(&mut self, tag: Option<Symbol>, underlying: TypeId) -> TypeId {
        self.enumeration(EnumType {
            tag,
            complete: false,
            underlying,
            enumerators: Vec::new(),
            value_index: FxHashMap::default(),
        })
    }

    pub fn function(
        &mut self,
        return_type: TypeId,
        parameters: ParameterMode,
        variadic: bool,
    ) -> TypeId {
        self.append(CType::Function(FunctionType {
            return_type,
            parameters,
            variadic,
        }))
    }

    // ========================================================================
    // Completion in place - the flag flips exactly once
    // ========================================================================

    /// Complete an incomplete struct/union node in place, keeping its
    /// identity. The caller (`define_tag`) is responsible for rejecting
    /// redefinition of an already-complete tag before calling this.
    pub fn complete_record(
        &mut self,
        id: TypeId,
        fields: Vec<Field>,
    ) -> Result<(), SemanticError> {
        let mut index = FxHashMap::default();
        for (i, field) in fields.iter().enumerate() {
            if let Some(name) = field.name {
                index.insert(name, i);
            }
        }
        match self.get_mut(id) {
            CType::Record(record) if !record.complete => {
                record.fields = fields;
                record.field_index = index;
                record.complete = true;
                tracing::trace!(id = id.index(), "record completed in place");
                Ok(())
            }
            CType::Record(_) => Err(SemanticError::internal(
                "complete_record on an already complete record",
            )),
            _ => Err(SemanticError::internal(
                "complete_record on a non-record type",
            )),
        }
    }

    /// Complete an incomplete enum node in place.
    pub fn complete_enumeration(
        &mut self,
        id: TypeId,
        enumerators: Vec<(Symbol, i64)>,
        value_index: FxHashMap<Symbol, i64>,
    ) -> Result<(), SemanticError> {
        match self.get_mut(id) {
            CType::Enum(en) if !en.complete => {
                en.enumerators = enumerators;
                en.value_index = value_index;
                en.complete = true;
                tracing::trace!(id = id.index(), "enum completed in place");
                Ok(())
            }
            CType::Enum(_) => Err(SemanticError::internal(
                "complete_enumeration on an already complete enum",
            )),
            _ => Err(SemanticError::internal(
                "complete_enumeration on a non-enum type",
            )),
        }
    }

    // ========================================================================
    // Qualifier helpers
    // ========================================================================

    /// Peel every `Qualified` wrapper.
    pub fn unqualified(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let CType::Qualified { inner, .. } = self.get(current) {
            current = *inner;
        }
        current
    }

    /// Accumulated qualifier set of the wrapper chain (not array element
    /// qualifiers).
    pub fn qualifiers_of(&self, id: TypeId) -> Qualifiers {
        let mut q = Qualifiers::NONE;
        let mut current = id;
        while let CType::Qualified { inner, qualifiers } = self.get(current) {
            q = q.union(*qualifiers);
            current = *inner;
        }
        q
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    pub fn is_integral(&self, id: TypeId) -> bool {
        match self.get(self.unqualified(id)) {
            CType::Bool
            | CType::Char
            | CType::SignedChar
            | CType::UnsignedChar
            | CType::SignedShort
            | CType::UnsignedShort
            | CType::SignedInt
            | CType::UnsignedInt
            | CType::SignedLong
            | CType::UnsignedLong
            | CType::SignedLongLong
            | CType::UnsignedLongLong => true,
            CType::Enum(_) => true,
            _ => false,
        }
    }

    pub fn is_floating(&self, id: TypeId) -> bool {
        matches!(
            self.get(self.unqualified(id)),
            CType::Float | CType::Double | CType::LongDouble
        )
    }

    pub fn is_arithmetic(&self, id: TypeId) -> bool {
        self.is_integral(id) || self.is_floating(id)
    }

    pub fn is_scalar(&self, id: TypeId) -> bool {
        self.is_arithmetic(id) || self.is_pointer(id)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(self.unqualified(id)), CType::Pointer(_))
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(self.unqualified(id)), CType::Array { .. })
    }

    pub fn is_function(&self, id: TypeId) -> bool {
        matches!(self.get(self.unqualified(id)), CType::Function(_))
    }

    pub fn is_record(&self, id: TypeId) -> bool {
        matches!(self.get(self.unqualified(id)), CType::Record(_))
    }

    pub fn is_enum(&self, id: TypeId) -> bool {
        matches!(self.get(self.unqualified(id)), CType::Enum(_))
    }

    /// Completeness is derived, except records/enums which carry the flag.
    /// Void is never complete; an array is complete unless unbounded;
    /// function types are not object types and count as incomplete here.
    pub fn is_complete(&self, id: TypeId) -> bool {
        match self.get(self.unqualified(id)) {
            CType::Void => false,
            CType::Record(record) => record.complete,
            CType::Enum(en) => en.complete,
            CType::Array { bound, .. } => !matches!(bound, ArrayBound::Unbounded),
            CType::Function(_) => false,
            _ => true,
        }
    }

    /// A VLA anywhere in the derivation chain makes the type variably
    /// modified.
    pub fn is_variably_modified(&self, id: TypeId) -> bool {
        match self.get(id) {
            CType::Array { element, bound, .. } => {
                bound.is_vla() || self.is_variably_modified(*element)
            }
            CType::Pointer(inner) => self.is_variably_modified(*inner),
            CType::Qualified { inner, .. } => self.is_variably_modified(*inner),
            CType::Function(func) => {
                if self.is_variably_modified(func.return_type) {
                    return true;
                }
                match &func.parameters {
                    ParameterMode::Typed(params) => {
                        params.iter().any(|p| self.is_variably_modified(p.ty))
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    // ========================================================================
    // Unwrap helpers
    // ========================================================================

    pub fn unwrap_pointer(&self, id: TypeId) -> Option<TypeId> {
        match self.get(self.unqualified(id)) {
            CType::Pointer(referenced) => Some(*referenced),
            _ => None,
        }
    }

    pub fn unwrap_array(&self, id: TypeId) -> Option<(TypeId, ArrayBound)> {
        match self.get(self.unqualified(id)) {
            CType::Array { element, bound, .. } => Some((*element, *bound)),
            _ => None,
        }
    }

    pub fn unwrap_function(&self, id: TypeId) -> Option<&FunctionType> {
        match self.get(self.unqualified(id)) {
            CType::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn unwrap_record(&self, id: TypeId) -> Option<&RecordType> {
        match self.get(self.unqualified(id)) {
            CType::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn unwrap_enum(&self, id: TypeId) -> Option<&EnumType> {
        match self.get(self.unqualified(id)) {
            CType::Enum(en) => Some(en),
            _ => None,
        }
    }

    // ========================================================================
    // Display - approximate C syntax for error messages
    // ========================================================================

    /// Render with real tag/member names.
    pub fn display(&self, interner: &Interner, id: TypeId) -> String {
        self.render(Some(interner), id)
    }

    /// Render without an interner; tags fall back to `#N` hints.
    pub fn display_raw(&self, id: TypeId) -> String {
        self.render(None, id)
    }

    pub(crate) fn symbol_hint(&self, sym: Symbol) -> String {
        format!("#{}", sym.0)
    }

    fn render(&self, interner: Option<&Interner>, id: TypeId) -> String {
        let name = |sym: Option<Symbol>| -> String {
            match (sym, interner) {
                (Some(sym), Some(interner)) => interner.resolve(sym).to_string(),
                (Some(sym), None) => self.symbol_hint(sym),
                (None, _) => "<anonymous>".to_string(),
            }
        };

        match self.get(id) {
            CType::Void => "void".to_string(),
            CType::Bool => "_Bool".to_string(),
            CType::Char => "char".to_string(),
            CType::SignedChar => "signed char".to_string(),
            CType::UnsignedChar => "unsigned char".to_string(),
            CType::SignedShort => "short".to_string(),
            CType::UnsignedShort => "unsigned short".to_string(),
            CType::SignedInt => "int".to_string(),
            CType::UnsignedInt => "unsigned int".to_string(),
            CType::SignedLong => "long".to_string(),
            CType::UnsignedLong => "unsigned long".to_string(),
            CType::SignedLongLong => "long long".to_string(),
            CType::UnsignedLongLong => "unsigned long long".to_string(),
            CType::Float => "float".to_string(),
            CType::Double => "double".to_string(),
            CType::LongDouble => "long double".to_string(),
            CType::Pointer(referenced) => format!("{} *", self.render(interner, *referenced)),
            CType::Qualified { inner, qualifiers } => {
                let mut parts = Vec::new();
                if qualifiers.constant {
                    parts.push("const");
                }
                if qualifiers.restricted {
                    parts.push("restrict");
                }
                if qualifiers.volatile {
                    parts.push("volatile");
                }
                if parts.is_empty() {
                    self.render(interner, *inner)
                } else {
                    format!("{} {}", parts.join(" "), self.render(interner, *inner))
                }
            }
            CType::Array { element, bound, .. } => {
                let bound_str = match bound {
                    ArrayBound::Unbounded => String::new(),
                    ArrayBound::Bounded(n) => n.to_string(),
                    ArrayBound::BoundedStatic(n) => format!("static {}", n),
                    ArrayBound::Vla(_) => "*".to_string(),
                    ArrayBound::VlaStatic(_) => "static *".to_string(),
                };
                format!("{} [{}]", self.render(interner, *element), bound_str)
            }
            CType::Record(record) => format!("{} {}", record.kind.keyword(), name(record.tag)),
            CType::Enum(en) => format!("enum {}", name(en.tag)),
            CType::Function(func) => {
                let params = match &func.parameters {
                    ParameterMode::Empty => String::new(),
                    ParameterMode::IdentifiersOnly(names) => names
                        .iter()
                        .map(|&n| name(Some(n)))
                        .collect::<Vec<_>>()
                        .join(", "),
                    ParameterMode::Typed(params) => params
                        .iter()
                        .map(|p| self.render(interner, p.ty))
                        .collect::<Vec<_>>()
                        .join(", "),
                };
                let ellipsis = if func.variadic { ", ..." } else { "" };
                format!(
                    "{} ({}{})",
                    self.render(interner, func.return_type),
                    params,
                    ellipsis
                )
            }
        }
    }
}

impl Default for TypeBundle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExprRef;

    #[test]
    fn type_id_size() {
        assert_eq!(std::mem::size_of::<TypeId>(), 4);
    }

    #[test]
    fn scalars_preallocated_at_reserved_ids() {
        let bundle = TypeBundle::new();
        assert!(matches!(bundle.get(TypeId::VOID), CType::Void));
        assert!(matches!(bundle.get(TypeId::SIGNED_INT), CType::SignedInt));
        assert!(matches!(
            bundle.get(TypeId::LONG_DOUBLE),
            CType::LongDouble
        ));
        assert_eq!(bundle.len(), TypeId::FIRST_DERIVED as usize);
    }

    #[test]
    fn constructors_never_deduplicate() {
        let mut bundle = TypeBundle::new();
        let a = bundle.pointer(TypeId::SIGNED_INT);
        let b = bundle.pointer(TypeId::SIGNED_INT);
        assert_ne!(a, b);
    }

    #[test]
    fn unqualified_peels_nested_wrappers() {
        let mut bundle = TypeBundle::new();
        let inner = bundle.qualified(TypeId::SIGNED_INT, Qualifiers::CONST);
        let outer = bundle.qualified(inner, Qualifiers::VOLATILE);
        assert_eq!(bundle.unqualified(outer), TypeId::SIGNED_INT);

        let q = bundle.qualifiers_of(outer);
        assert!(q.constant && q.volatile);
    }

    #[test]
    fn completeness_is_derived() {
        let mut bundle = TypeBundle::new();
        assert!(!bundle.is_complete(TypeId::VOID));
        assert!(bundle.is_complete(TypeId::SIGNED_INT));

        let unbounded = bundle.array(TypeId::SIGNED_INT, ArrayBound::Unbounded, Qualifiers::NONE);
        assert!(!bundle.is_complete(unbounded));

        let bounded = bundle.array(TypeId::SIGNED_INT, ArrayBound::Bounded(4), Qualifiers::NONE);
        assert!(bundle.is_complete(bounded));

        let vla = bundle.array(
            TypeId::SIGNED_INT,
            ArrayBound::Vla(ExprRef(1)),
            Qualifiers::NONE,
        );
        assert!(bundle.is_complete(vla));

        let s = bundle.incomplete_structure(None);
        assert!(!bundle.is_complete(s));
    }

    #[test]
    fn record_completion_flips_flag_once() {
        let mut bundle = TypeBundle::new();
        let s = bundle.incomplete_structure(Some(Symbol(0)));
        assert!(!bundle.is_complete(s));

        bundle
            .complete_record(
                s,
                vec![Field {
                    name: Some(Symbol(1)),
                    ty: TypeId::SIGNED_INT,
                    bit_width: None,
                }],
            )
            .unwrap();
        assert!(bundle.is_complete(s));
        assert!(bundle.unwrap_record(s).unwrap().field(Symbol(1)).is_some());

        let err = bundle.complete_record(s, Vec::new()).unwrap_err();
        assert!(matches!(err, SemanticError::Internal { .. }));
    }

    #[test]
    fn variably_modified_propagates_through_derivation() {
        let mut bundle = TypeBundle::new();
        let vla = bundle.array(
            TypeId::SIGNED_INT,
            ArrayBound::Vla(ExprRef(9)),
            Qualifiers::NONE,
        );
        let ptr = bundle.pointer(vla);
        let qual = bundle.qualified(ptr, Qualifiers::CONST);
        assert!(bundle.is_variably_modified(vla));
        assert!(bundle.is_variably_modified(ptr));
        assert!(bundle.is_variably_modified(qual));
        assert!(!bundle.is_variably_modified(TypeId::SIGNED_INT));
    }

    #[test]
    fn display_renders_c_syntax() {
        let mut bundle = TypeBundle::new();
        let ptr = bundle.pointer(TypeId::SIGNED_INT);
        assert_eq!(bundle.display_raw(ptr), "int *");

        let arr = bundle.array(TypeId::DOUBLE, ArrayBound::Bounded(8), Qualifiers::NONE);
        assert_eq!(bundle.display_raw(arr), "double [8]");

        let cq = bundle.qualified(TypeId::CHAR, Qualifiers::CONST);
        assert_eq!(bundle.display_raw(cq), "const char");
    }

    #[test]
    fn integral_includes_enums() {
        let mut bundle = TypeBundle::new();
        let e = bundle.incomplete_enumeration(None, TypeId::SIGNED_INT);
        assert!(bundle.is_integral(e));
        assert!(bundle.is_integral(TypeId::BOOL));
        assert!(!bundle.is_integral(TypeId::FLOAT));
        assert!(bundle.is_arithmetic(TypeId::FLOAT));
    }
}
