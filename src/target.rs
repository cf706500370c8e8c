// src/target.rs
//
// Target-dependent type traits, supplied by the embedding driver's target
// environment. Immutable for the life of a translation unit; the core
// treats it as an opaque read-only dependency.

use crate::types::{CType, TypeBundle, TypeId};

/// Target-dependent facts the compatibility engine and the contexts
/// consult: signedness of plain `char`, the identities of `wchar_t` and
/// the `charN_t` types, the enum underlying type, pointer-difference and
/// size types, plus the integral-fits predicate and the bit-field
/// promotion rule.
#[derive(Copy, Clone, Debug)]
pub struct TypeTraits {
    pub char_is_signed: bool,
    pub wchar: TypeId,
    pub char16: TypeId,
    pub char32: TypeId,
    pub enum_underlying: TypeId,
    pub ptrdiff: TypeId,
    pub size: TypeId,
}

impl TypeTraits {
    /// The common LP64 configuration: signed plain char, `int`-backed
    /// enums, `long` ptrdiff, `unsigned long` size.
    pub fn host() -> Self {
        TypeTraits {
            char_is_signed: true,
            wchar: TypeId::SIGNED_INT,
            char16: TypeId::UNSIGNED_SHORT,
            char32: TypeId::UNSIGNED_INT,
            enum_underlying: TypeId::SIGNED_INT,
            ptrdiff: TypeId::SIGNED_LONG,
            size: TypeId::UNSIGNED_LONG,
        }
    }

    /// Whether an integral type is signed on this target. Plain `char`
    /// signedness is the target's choice; enums follow their underlying
    /// type. Non-integral types answer false.
    pub fn is_signed(&self, bundle: &TypeBundle, ty: TypeId) -> bool {
        match bundle.get(bundle.unqualified(ty)) {
            CType::Char => self.char_is_signed,
            CType::SignedChar
            | CType::SignedShort
            | CType::SignedInt
            | CType::SignedLong
            | CType::SignedLongLong => true,
            CType::Enum(en) => self.is_signed(bundle, en.underlying),
            _ => false,
        }
    }

    /// Integral-fits predicate: whether `value` is representable in `ty`.
    pub fn fits_in(&self, bundle: &TypeBundle, value: i64, ty: TypeId) -> bool {
        match bundle.get(bundle.unqualified(ty)) {
            CType::Bool => value == 0 || value == 1,
            CType::Char => {
                if self.char_is_signed {
                    value >= i8::MIN as i64 && value <= i8::MAX as i64
                } else {
                    value >= 0 && value <= u8::MAX as i64
                }
            }
            CType::SignedChar => value >= i8::MIN as i64 && value <= i8::MAX as i64,
            CType::UnsignedChar => value >= 0 && value <= u8::MAX as i64,
            CType::SignedShort => value >= i16::MIN as i64 && value <= i16::MAX as i64,
            CType::UnsignedShort => value >= 0 && value <= u16::MAX as i64,
            CType::SignedInt => value >= i32::MIN as i64 && value <= i32::MAX as i64,
            CType::UnsignedInt => value >= 0 && value <= u32::MAX as i64,
            CType::SignedLong | CType::SignedLongLong => true,
            CType::UnsignedLong | CType::UnsignedLongLong => value >= 0,
            CType::Enum(en) => self.fits_in(bundle, value, en.underlying),
            _ => false,
        }
    }

    /// Bit-field promotion rule: `_Bool` stays `_Bool`, enums promote to
    /// their underlying type, every other integral base promotes to the
    /// `int` of matching signedness.
    pub fn bitfield_base(&self, bundle: &TypeBundle, ty: TypeId) -> TypeId {
        let stripped = bundle.unqualified(ty);
        match bundle.get(stripped) {
            CType::Bool => TypeId::BOOL,
            CType::Enum(en) => self.bitfield_base(bundle, en.underlying),
            _ if self.is_signed(bundle, stripped) => TypeId::SIGNED_INT,
            _ => TypeId::UNSIGNED_INT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Symbol;
    use crate::types::EnumBuilder;

    #[test]
    fn host_traits_are_lp64() {
        let traits = TypeTraits::host();
        assert!(traits.char_is_signed);
        assert_eq!(traits.enum_underlying, TypeId::SIGNED_INT);
        assert_eq!(traits.size, TypeId::UNSIGNED_LONG);
    }

    #[test]
    fn fits_in_respects_ranges() {
        let bundle = TypeBundle::new();
        let traits = TypeTraits::host();

        assert!(traits.fits_in(&bundle, 127, TypeId::SIGNED_CHAR));
        assert!(!traits.fits_in(&bundle, 128, TypeId::SIGNED_CHAR));
        assert!(traits.fits_in(&bundle, 255, TypeId::UNSIGNED_CHAR));
        assert!(!traits.fits_in(&bundle, -1, TypeId::UNSIGNED_CHAR));
        assert!(traits.fits_in(&bundle, i64::MAX, TypeId::SIGNED_LONG));
        assert!(!traits.fits_in(&bundle, 2, TypeId::BOOL));
        assert!(!traits.fits_in(&bundle, 0, TypeId::FLOAT));
    }

    #[test]
    fn fits_in_follows_enum_underlying() {
        let mut bundle = TypeBundle::new();
        let traits = TypeTraits::host();

        let mut builder = EnumBuilder::new(Some(Symbol(0)), traits.enum_underlying);
        builder.enumerator(Symbol(1), Some(1)).unwrap();
        let e = builder.build(&mut bundle);

        assert!(traits.fits_in(&bundle, i32::MAX as i64, e));
        assert!(!traits.fits_in(&bundle, i32::MAX as i64 + 1, e));
    }

    #[test]
    fn char_signedness_is_target_dependent() {
        let bundle = TypeBundle::new();
        let mut traits = TypeTraits::host();
        assert!(traits.is_signed(&bundle, TypeId::CHAR));
        assert!(traits.fits_in(&bundle, -1, TypeId::CHAR));

        traits.char_is_signed = false;
        assert!(!traits.is_signed(&bundle, TypeId::CHAR));
        assert!(!traits.fits_in(&bundle, -1, TypeId::CHAR));
    }

    #[test]
    fn bitfield_promotion() {
        let bundle = TypeBundle::new();
        let traits = TypeTraits::host();

        assert_eq!(traits.bitfield_base(&bundle, TypeId::BOOL), TypeId::BOOL);
        assert_eq!(
            traits.bitfield_base(&bundle, TypeId::SIGNED_SHORT),
            TypeId::SIGNED_INT
        );
        assert_eq!(
            traits.bitfield_base(&bundle, TypeId::UNSIGNED_LONG),
            TypeId::UNSIGNED_INT
        );
    }
}
