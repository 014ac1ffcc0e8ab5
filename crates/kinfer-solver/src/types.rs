//! Type representation for the inference engine.
//!
//! Types are interned: every distinct `TypeData` structure is stored once in
//! the `TypeInterner` and referred to by a `TypeId` handle. Equality of
//! handles is structural equality of types.
//!
//! The forms a type may take:
//! - intrinsics (`Any`, `Nothing`, `Unit`, `Error`) with fixed ids
//! - class types with argument projections
//! - type variables and their stub types
//! - captured types (existential wrappers around a projection)
//! - references to a class's own type parameters (inside declared supertypes)
//! - integer literal types, which default to a numeric class
//! - intersections

use bitflags::bitflags;
use serde::Serialize;

// =============================================================================
// Handles
// =============================================================================

/// Handle to an interned type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Unresolved or erroneous type. A subtype and supertype of everything.
    pub const ERROR: TypeId = TypeId(0);
    /// Top type.
    pub const ANY: TypeId = TypeId(1);
    /// Bottom type.
    pub const NOTHING: TypeId = TypeId(2);
    pub const UNIT: TypeId = TypeId(3);

    /// First id handed out for non-intrinsic types.
    pub const FIRST_USER: u32 = 16;

    #[inline]
    pub const fn is_intrinsic(self) -> bool {
        self.0 < Self::FIRST_USER
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }
}

/// Handle to a declared class or interface in the `ClassTable`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassId(pub u32);

/// Handle to a type variable in the `TypeVariableStore`.
///
/// Handles are allocated from the environment, so they are unique across
/// every constraint system that shares it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeVarId(pub u32);

/// Interned list of types (intersection members).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeListId(pub u32);

/// Interned list of type argument projections.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeArgListId(pub u32);

impl TypeArgListId {
    pub const EMPTY: TypeArgListId = TypeArgListId(0);
}

// =============================================================================
// Variance and projections
// =============================================================================

/// Declaration-site variance of a class type parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Variance {
    Invariant,
    In,
    Out,
}

impl Variance {
    pub fn opposite(self) -> Self {
        match self {
            Variance::Invariant => Variance::Invariant,
            Variance::In => Variance::Out,
            Variance::Out => Variance::In,
        }
    }

    /// Variance of a position nested at `inner` inside a position of `self`.
    pub fn compose(self, inner: Variance) -> Variance {
        match (self, inner) {
            (Variance::Invariant, _) | (_, Variance::Invariant) => Variance::Invariant,
            (Variance::Out, v) => v,
            (Variance::In, v) => v.opposite(),
        }
    }
}

/// Use-site projection of one type argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ProjectionKind {
    Invariant,
    In,
    Out,
    Star,
}

impl ProjectionKind {
    pub fn from_variance(variance: Variance) -> Self {
        match variance {
            Variance::Invariant => ProjectionKind::Invariant,
            Variance::In => ProjectionKind::In,
            Variance::Out => ProjectionKind::Out,
        }
    }
}

/// One type argument: a projection kind plus the projected type.
///
/// A star projection carries `TypeId::ANY` as its type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TypeArg {
    pub projection: ProjectionKind,
    pub ty: TypeId,
}

impl TypeArg {
    pub const STAR: TypeArg = TypeArg {
        projection: ProjectionKind::Star,
        ty: TypeId::ANY,
    };

    pub const fn invariant(ty: TypeId) -> Self {
        TypeArg {
            projection: ProjectionKind::Invariant,
            ty,
        }
    }

    pub const fn out(ty: TypeId) -> Self {
        TypeArg {
            projection: ProjectionKind::Out,
            ty,
        }
    }

    pub const fn contravariant(ty: TypeId) -> Self {
        TypeArg {
            projection: ProjectionKind::In,
            ty,
        }
    }

    pub fn is_star(self) -> bool {
        self.projection == ProjectionKind::Star
    }
}

/// Existential type captured from a projection.
///
/// `Captured(out X)` stands for an unknown subtype of `X`, `Captured(in X)`
/// for an unknown supertype of `X`. `Captured(*)` is fully unknown.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CapturedType {
    pub projection: ProjectionKind,
    pub ty: TypeId,
}

impl CapturedType {
    /// Upper bound of the existential.
    pub fn upper(self) -> TypeId {
        match self.projection {
            ProjectionKind::Out | ProjectionKind::Invariant => self.ty,
            ProjectionKind::In | ProjectionKind::Star => TypeId::ANY,
        }
    }

    /// Lower bound of the existential.
    pub fn lower(self) -> TypeId {
        match self.projection {
            ProjectionKind::In | ProjectionKind::Invariant => self.ty,
            ProjectionKind::Out | ProjectionKind::Star => TypeId::NOTHING,
        }
    }
}

// =============================================================================
// TypeData
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntrinsicKind {
    Error,
    Any,
    Nothing,
    Unit,
}

/// Structure of one type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Intrinsic(IntrinsicKind),
    Class {
        class: ClassId,
        args: TypeArgListId,
    },
    /// A type variable under inference.
    Variable(TypeVarId),
    /// Placeholder for a not-yet-inferred variable inside a builder lambda.
    Stub(TypeVarId),
    Captured(CapturedType),
    /// The `index`-th type parameter of `class`, as seen from its own body.
    Param {
        class: ClassId,
        index: u32,
    },
    IntegerLiteral(i64),
    Intersection(TypeListId),
}

bitflags! {
    /// Cached structural facts about an interned type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u16 {
        const CONTAINS_VARIABLE = 1 << 0;
        const CONTAINS_STUB = 1 << 1;
        const CONTAINS_CAPTURED = 1 << 2;
        const CONTAINS_ERROR = 1 << 3;
        const CONTAINS_PARAM = 1 << 4;
        const CONTAINS_INTEGER_LITERAL = 1 << 5;
        const CONTAINS_INTERSECTION = 1 << 6;

        /// Flags that make a type not writable in source code.
        const NON_DENOTABLE = Self::CONTAINS_VARIABLE.bits()
            | Self::CONTAINS_STUB.bits()
            | Self::CONTAINS_CAPTURED.bits()
            | Self::CONTAINS_INTEGER_LITERAL.bits()
            | Self::CONTAINS_INTERSECTION.bits();
    }
}
