// src/types/composite.rs
//
// Composite-type construction: the most specific type compatible with two
// given types. Allocates into the bundle; incompatibility is reported as
// None, never as an error - the caller decides whether that is fatal.

use crate::target::TypeTraits;
use crate::types::compat::{compatible, same, strip_zero_qualifiers};
use crate::types::{ArrayBound, CType, ParamVec, Parameter, ParameterMode, TypeBundle, TypeId};

/// Build the composite of `a` and `b`, or `None` if they are not
/// compatible.
///
/// Tie-breaks: a bounded/static array operand beats unbounded and VLA
/// bounds; a `Typed` parameter list beats `IdentifiersOnly`/`Empty`; an
/// enum beats its own underlying integer type; two compatible complete
/// records are equally specific and the first operand is returned.
pub fn composite(
    bundle: &mut TypeBundle,
    traits: &TypeTraits,
    a: TypeId,
    b: TypeId,
) -> Option<TypeId> {
    let a = strip_zero_qualifiers(bundle, a);
    let b = strip_zero_qualifiers(bundle, b);
    if !compatible(bundle, traits, a, b) {
        return None;
    }
    if same(bundle, a, b) {
        return Some(a);
    }

    // Compatible but not identical; the clones release the bundle borrow
    // so the recursive cases can allocate.
    let (va, vb) = (bundle.get(a).clone(), bundle.get(b).clone());
    let result = match (va, vb) {
        (
            CType::Qualified {
                inner: ia,
                qualifiers,
            },
            CType::Qualified { inner: ib, .. },
        ) => {
            // Compatibility guarantees the qualifier sets match.
            let inner = composite(bundle, traits, ia, ib)?;
            bundle.qualified(inner, qualifiers)
        }
        // Enum vs its underlying integer type: the enum is more specific.
        (CType::Enum(_), _) => a,
        (_, CType::Enum(_)) => b,
        (CType::Pointer(x), CType::Pointer(y)) => {
            let referenced = composite(bundle, traits, x, y)?;
            bundle.pointer(referenced)
        }
        (
            CType::Array {
                element: ea,
                bound: ba,
                qualifiers: qa,
            },
            CType::Array {
                element: eb,
                bound: bb,
                qualifiers: qb,
            },
        ) => {
            let element = composite(bundle, traits, ea, eb)?;
            bundle.array(element, merge_bounds(ba, bb), qa.union(qb))
        }
        // Two compatible records are equally specific.
        (CType::Record(_), CType::Record(_)) => a,
        (CType::Function(f), CType::Function(g)) => {
            let return_type = composite(bundle, traits, f.return_type, g.return_type)?;
            let parameters = match (f.parameters, g.parameters) {
                (ParameterMode::Typed(p), ParameterMode::Typed(q)) => {
                    let mut merged = ParamVec::new();
                    for (x, y) in p.iter().zip(q.iter()) {
                        let ty = composite(bundle, traits, x.ty, y.ty)?;
                        merged.push(Parameter { name: x.name, ty });
                    }
                    ParameterMode::Typed(merged)
                }
                // The typed prototype is the more specific mode.
                (ParameterMode::Typed(p), _) | (_, ParameterMode::Typed(p)) => {
                    ParameterMode::Typed(p)
                }
                (ParameterMode::IdentifiersOnly(n), _)
                | (_, ParameterMode::IdentifiersOnly(n)) => ParameterMode::IdentifiersOnly(n),
                (ParameterMode::Empty, ParameterMode::Empty) => ParameterMode::Empty,
            };
            bundle.function(return_type, parameters, f.variadic)
        }
        // Scalars and remaining shapes are compatible only when `same`,
        // which already returned above.
        _ => a,
    };
    tracing::trace!(
        a = a.index(),
        b = b.index(),
        result = result.index(),
        "composite type"
    );
    Some(result)
}

/// The bounded/static operand wins; fixed lengths agree by the time this
/// is called.
fn merge_bounds(a: ArrayBound, b: ArrayBound) -> ArrayBound {
    use ArrayBound::*;
    match (a, b) {
        (BoundedStatic(n), _) | (_, BoundedStatic(n)) => BoundedStatic(n),
        (Bounded(n), _) | (_, Bounded(n)) => Bounded(n),
        (VlaStatic(e), _) | (_, VlaStatic(e)) => VlaStatic(e),
        (Vla(e), _) | (_, Vla(e)) => Vla(e),
        (Unbounded, Unbounded) => Unbounded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Symbol;
    use crate::types::{EnumBuilder, Qualifiers, RecordBuilder};
    use smallvec::smallvec;

    fn setup() -> (TypeBundle, TypeTraits) {
        (TypeBundle::new(), TypeTraits::host())
    }

    #[test]
    fn incompatible_types_have_no_composite() {
        let (mut bundle, traits) = setup();
        assert_eq!(
            composite(&mut bundle, &traits, TypeId::SIGNED_INT, TypeId::FLOAT),
            None
        );
    }

    #[test]
    fn array_bound_narrowing() {
        let (mut bundle, traits) = setup();
        let unbounded = bundle.array(TypeId::SIGNED_INT, ArrayBound::Unbounded, Qualifiers::NONE);
        let four = bundle.array(TypeId::SIGNED_INT, ArrayBound::Bounded(4), Qualifiers::NONE);

        let merged = composite(&mut bundle, &traits, unbounded, four).unwrap();
        assert_eq!(
            bundle.unwrap_array(merged).unwrap().1,
            ArrayBound::Bounded(4)
        );

        let both_unbounded = composite(&mut bundle, &traits, unbounded, unbounded).unwrap();
        assert_eq!(
            bundle.unwrap_array(both_unbounded).unwrap().1,
            ArrayBound::Unbounded
        );
    }

    #[test]
    fn static_bound_wins_over_vla() {
        let (mut bundle, traits) = setup();
        let vla = bundle.array(
            TypeId::SIGNED_INT,
            ArrayBound::Vla(crate::types::ExprRef(1)),
            Qualifiers::NONE,
        );
        let fixed = bundle.array(
            TypeId::SIGNED_INT,
            ArrayBound::BoundedStatic(3),
            Qualifiers::NONE,
        );
        let merged = composite(&mut bundle, &traits, vla, fixed).unwrap();
        assert_eq!(
            bundle.unwrap_array(merged).unwrap().1,
            ArrayBound::BoundedStatic(3)
        );
    }

    #[test]
    fn array_qualifiers_are_unioned() {
        let (mut bundle, traits) = setup();
        let a = bundle.array(TypeId::SIGNED_INT, ArrayBound::Unbounded, Qualifiers::CONST);
        let b = bundle.array(TypeId::SIGNED_INT, ArrayBound::Bounded(2), Qualifiers::CONST);
        let merged = composite(&mut bundle, &traits, a, b).unwrap();
        match bundle.get(merged) {
            CType::Array { qualifiers, .. } => assert!(qualifiers.constant),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn zero_qualified_composites_to_unqualified() {
        let (mut bundle, traits) = setup();
        let zero = bundle.qualified(TypeId::SIGNED_INT, Qualifiers::NONE);
        let merged = composite(&mut bundle, &traits, zero, TypeId::SIGNED_INT).unwrap();
        assert!(compatible(&bundle, &traits, merged, TypeId::SIGNED_INT));
        assert!(same(&bundle, bundle.unqualified(merged), TypeId::SIGNED_INT));
    }

    #[test]
    fn enum_wins_over_underlying_type() {
        let (mut bundle, traits) = setup();
        let mut builder = EnumBuilder::new(Some(Symbol(0)), traits.enum_underlying);
        builder.enumerator(Symbol(1), Some(0)).unwrap();
        let e = builder.build(&mut bundle);

        let merged = composite(&mut bundle, &traits, e, TypeId::SIGNED_INT).unwrap();
        assert_eq!(merged, e);
        let merged = composite(&mut bundle, &traits, TypeId::SIGNED_INT, e).unwrap();
        assert_eq!(merged, e);
    }

    #[test]
    fn typed_parameter_list_wins() {
        let (mut bundle, traits) = setup();
        let identifiers = bundle.function(
            TypeId::SIGNED_INT,
            ParameterMode::IdentifiersOnly(vec![Symbol(0), Symbol(1)]),
            false,
        );
        let typed = bundle.function(
            TypeId::SIGNED_INT,
            ParameterMode::Typed(smallvec![
                Parameter {
                    name: Some(Symbol(0)),
                    ty: TypeId::SIGNED_INT,
                },
                Parameter {
                    name: Some(Symbol(1)),
                    ty: TypeId::DOUBLE,
                },
            ]),
            false,
        );

        let merged = composite(&mut bundle, &traits, identifiers, typed).unwrap();
        let func = bundle.unwrap_function(merged).unwrap();
        match &func.parameters {
            ParameterMode::Typed(params) => {
                assert_eq!(params.len(), 2);
                assert_eq!(params[0].ty, TypeId::SIGNED_INT);
                assert_eq!(params[1].ty, TypeId::DOUBLE);
            }
            other => panic!("expected typed parameters, got {:?}", other),
        }
    }

    #[test]
    fn composite_of_records_returns_first_operand() {
        let (mut bundle, traits) = setup();
        let tag = Symbol(0);
        let member = Symbol(1);

        let mut b1 = RecordBuilder::structure(Some(tag));
        b1.field(&bundle, Some(member), TypeId::SIGNED_INT).unwrap();
        let s1 = b1.build(&mut bundle);

        let mut b2 = RecordBuilder::structure(Some(tag));
        b2.field(&bundle, Some(member), TypeId::SIGNED_INT).unwrap();
        let s2 = b2.build(&mut bundle);

        assert_eq!(composite(&mut bundle, &traits, s1, s2), Some(s1));
    }

    #[test]
    fn composite_is_idempotent() {
        let (mut bundle, traits) = setup();
        let unbounded = bundle.array(TypeId::SIGNED_INT, ArrayBound::Unbounded, Qualifiers::NONE);
        let four = bundle.array(TypeId::SIGNED_INT, ArrayBound::Bounded(4), Qualifiers::NONE);

        let merged = composite(&mut bundle, &traits, unbounded, four).unwrap();
        assert!(compatible(&bundle, &traits, merged, unbounded));
        assert!(compatible(&bundle, &traits, merged, four));

        let again = composite(&mut bundle, &traits, unbounded, merged).unwrap();
        assert!(compatible(&bundle, &traits, again, merged));
    }

    #[test]
    fn pointer_composite_recurses() {
        let (mut bundle, traits) = setup();
        let unbounded = bundle.array(TypeId::SIGNED_INT, ArrayBound::Unbounded, Qualifiers::NONE);
        let four = bundle.array(TypeId::SIGNED_INT, ArrayBound::Bounded(4), Qualifiers::NONE);
        let pa = bundle.pointer(unbounded);
        let pb = bundle.pointer(four);

        let merged = composite(&mut bundle, &traits, pa, pb).unwrap();
        let referenced = bundle.unwrap_pointer(merged).unwrap();
        assert_eq!(
            bundle.unwrap_array(referenced).unwrap().1,
            ArrayBound::Bounded(4)
        );
    }
}
