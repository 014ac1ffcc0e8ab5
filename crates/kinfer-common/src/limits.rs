//! Centralized limits and thresholds for the inference engine.
//!
//! This module provides shared constants for recursion depths, operation counts,
//! and capacity limits used throughout the solver. Centralizing these values:
//! - Prevents duplicate definitions with inconsistent values
//! - Documents the rationale for each limit
//!
//! # Categories
//!
//! - **Recursion Depths**: Limits to prevent stack overflow in recursive algorithms
//! - **Operation Counts**: Limits to prevent infinite loops in iterative algorithms
//! - **Capacity Limits**: Pre-allocation sizes
//!
//! Common supertype computation and approximation bound their recursion by
//! type depth. The subtype checker also counts the pairs it visits.

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum nesting depth of a type the solver will construct or walk.
///
/// Substituting captured types into generic arguments can grow a type by one
/// level per incorporation round. Types deeper than this are treated as
/// unrepresentable and replaced by the error type.
///
/// # Kotlin example
///
/// ```kotlin
/// fun <T : Comparable<T>> f(x: T) = x
/// // incorporation keeps wrapping: Comparable<Captured(out Comparable<...>)>
/// ```
pub const MAX_TYPE_DEPTH: u32 = 64;

/// Maximum depth for common supertype (least upper bound) computation.
///
/// The LUB of two generic types recurses into their arguments. Beyond this
/// depth the argument is widened to a star projection.
pub const MAX_COMMON_SUPERTYPE_DEPTH: u32 = 8;

/// Maximum number of nested `sub <: sup` pairs the subtype checker follows.
///
/// Recursive bounds such as `T : Comparable<T>` can nest deeply before a
/// pair repeats. Past this depth the check answers `false`.
pub const MAX_SUBTYPE_DEPTH: u32 = 100;

/// Maximum number of pairs one subtype checker visits in total.
pub const MAX_SUBTYPE_CHECKS: u32 = 100_000;

/// Allowed growth in type depth for bounds generated by incorporation.
///
/// A derived bound whose constraining type is deeper than the deepest initial
/// constraint plus this delta is dropped. This is the termination policy for
/// recursive generic bounds like `T <: Comparable<T>`.
pub const ALLOWED_DEPTH_DELTA_FOR_INCORPORATION: u32 = 1;

// =============================================================================
// Operation Count Limits
// =============================================================================

/// Maximum number of bounds incorporated into one constraint system.
///
/// Incorporation is a worklist fixpoint; the derivedFrom and depth guards make
/// it terminate in practice. This is the hard stop when they do not. Hitting
/// it records an `IncorporationLimitExceeded` error on the system.
pub const MAX_INCORPORATION_STEPS: u32 = 10_000;

/// Maximum number of fixation rounds in one completion pass.
///
/// Each round fixes exactly one variable, so a system never needs more rounds
/// than it has variables. This caps runaway completion on corrupted state.
pub const MAX_COMPLETION_ITERATIONS: u32 = 1_000;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Inline capacity for `derivedFrom` sets on bounds.
///
/// Most derived bounds come from one or two substitutions.
pub const DERIVED_FROM_INLINE: usize = 4;

/// Inline capacity for type argument lists.
pub const TYPE_ARGS_INLINE: usize = 4;
