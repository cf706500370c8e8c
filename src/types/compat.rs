// src/types/compat.rs
//
// Structural type identity (`same`) and C11 type compatibility
// (`compatible`). Pure functions over the bundle; the allocating
// composite-type operation lives in composite.rs.

use crate::target::TypeTraits;
use crate::types::{ArrayBound, CType, Field, ParameterMode, TypeBundle, TypeId};

/// Peel `Qualified` wrappers whose qualifier set is empty. A
/// zero-qualified type is indistinguishable from its unqualified form for
/// compatibility purposes.
pub(crate) fn strip_zero_qualifiers(bundle: &TypeBundle, id: TypeId) -> TypeId {
    let mut current = id;
    while let CType::Qualified { inner, qualifiers } = bundle.get(current) {
        if !qualifiers.is_empty() {
            break;
        }
        current = *inner;
    }
    current
}

/// Recursive structural identity.
///
/// Scalars compare by reserved-handle identity. Tagged records and enums
/// compare by node identity (the unique definition); untagged ones by
/// structure. Function types require identical parameter modes.
pub fn same(bundle: &TypeBundle, a: TypeId, b: TypeId) -> bool {
    if a == b {
        return true;
    }
    match (bundle.get(a), bundle.get(b)) {
        (CType::Pointer(x), CType::Pointer(y)) => same(bundle, *x, *y),
        (
            CType::Qualified {
                inner: ia,
                qualifiers: qa,
            },
            CType::Qualified {
                inner: ib,
                qualifiers: qb,
            },
        ) => qa == qb && same(bundle, *ia, *ib),
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
        ) => qa == qb && ba == bb && same(bundle, *ea, *eb),
        (CType::Record(x), CType::Record(y)) => {
            // Tagged types have a unique definition node; identity failed
            // above, so they are distinct types.
            if x.tag.is_some() || y.tag.is_some() {
                return false;
            }
            x.kind == y.kind && x.complete == y.complete && same_fields(bundle, &x.fields, &y.fields)
        }
        (CType::Enum(x), CType::Enum(y)) => {
            if x.tag.is_some() || y.tag.is_some() {
                return false;
            }
            x.complete == y.complete
                && same(bundle, x.underlying, y.underlying)
                && x.enumerators == y.enumerators
        }
        (CType::Function(f), CType::Function(g)) => {
            if f.variadic != g.variadic || !same(bundle, f.return_type, g.return_type) {
                return false;
            }
            match (&f.parameters, &g.parameters) {
                (ParameterMode::Empty, ParameterMode::Empty) => true,
                (ParameterMode::IdentifiersOnly(n), ParameterMode::IdentifiersOnly(m)) => n == m,
                (ParameterMode::Typed(p), ParameterMode::Typed(q)) => {
                    p.len() == q.len()
                        && p.iter().zip(q.iter()).all(|(x, y)| same(bundle, x.ty, y.ty))
                }
                _ => false,
            }
        }
        _ => false,
    }
}

fn same_fields(bundle: &TypeBundle, a: &[Field], b: &[Field]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| {
            x.name == y.name && x.bit_width == y.bit_width && same(bundle, x.ty, y.ty)
        })
}

/// C11 type compatibility. Symmetric: every relaxation below holds in
/// both argument orders.
pub fn compatible(bundle: &TypeBundle, traits: &TypeTraits, a: TypeId, b: TypeId) -> bool {
    let a = strip_zero_qualifiers(bundle, a);
    let b = strip_zero_qualifiers(bundle, b);
    if same(bundle, a, b) {
        return true;
    }
    match (bundle.get(a), bundle.get(b)) {
        (
            CType::Qualified {
                inner: ia,
                qualifiers: qa,
            },
            CType::Qualified {
                inner: ib,
                qualifiers: qb,
            },
        ) => qa == qb && compatible(bundle, traits, *ia, *ib),
        // Distinct enum definitions are never compatible, even with
        // identical enumerator lists.
        (CType::Enum(_), CType::Enum(_)) => false,
        // An enum is compatible with its own underlying integer type.
        (CType::Enum(e), _) => same(bundle, e.underlying, b),
        (_, CType::Enum(e)) => same(bundle, a, e.underlying),
        (CType::Pointer(x), CType::Pointer(y)) => compatible(bundle, traits, *x, *y),
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
            qa == qb && bounds_compatible(*ba, *bb) && compatible(bundle, traits, *ea, *eb)
        }
        (CType::Record(x), CType::Record(y)) => {
            if x.kind != y.kind || x.tag != y.tag || x.complete != y.complete {
                return false;
            }
            if !x.complete {
                return true;
            }
            x.fields.len() == y.fields.len()
                && x.fields.iter().zip(y.fields.iter()).all(|(f, g)| {
                    f.name == g.name
                        && f.bit_width == g.bit_width
                        && compatible(bundle, traits, f.ty, g.ty)
                })
        }
        (CType::Function(f), CType::Function(g)) => {
            if f.variadic != g.variadic
                || !compatible(bundle, traits, f.return_type, g.return_type)
            {
                return false;
            }
            match (f.parameters.arity(), g.parameters.arity()) {
                // An Empty mode imposes no constraint at all.
                (None, _) | (_, None) => true,
                (Some(n), Some(m)) => {
                    if n != m {
                        return false;
                    }
                    match (&f.parameters, &g.parameters) {
                        (ParameterMode::Typed(p), ParameterMode::Typed(q)) => p
                            .iter()
                            .zip(q.iter())
                            .all(|(x, y)| compatible(bundle, traits, x.ty, y.ty)),
                        // Identifier lists impose no type constraint.
                        _ => true,
                    }
                }
            }
        }
        _ => false,
    }
}

/// Fixed bounds must agree; an unbounded or VLA operand is compatible
/// with any bound.
fn bounds_compatible(a: ArrayBound, b: ArrayBound) -> bool {
    match (a.fixed_length(), b.fixed_length()) {
        (Some(n), Some(m)) => n == m,
        _ => true,
    }
}
