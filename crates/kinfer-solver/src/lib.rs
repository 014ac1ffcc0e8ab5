//! Constraint-Based Type Inference
//!
//! This crate infers type arguments of generic calls from subtyping
//! constraints, including calls whose type arguments are only known from the
//! body of a builder lambda. It uses:
//!
//! - **Interned types**: `TypeData` structures deduplicated into `TypeId` handles
//! - **Bounds and incorporation**: every new bound is combined with the
//!   existing ones until no new evidence appears
//! - **Transactions**: speculative constraints are rolled back by snapshot
//! - **Builder inference sessions**: stub types stand in for postponed
//!   variables until the lambda body has been analyzed
//!
//! Key entry points:
//! - [`TypeEnvironment`]: classes, variables and settings shared by everything
//! - [`ConstraintSystem`]: register variables, add constraints, fix variables
//! - [`ConstraintSystemCompleter`]: fix every variable that can be fixed
//! - [`SessionArena`]: builder inference sessions and their rewriting pass
pub mod recursion;
pub mod types;
mod intern;
pub mod env;
pub mod hierarchy;
pub mod visitor;
pub mod format;
pub mod substitution;
pub mod subtype;
pub mod common_supertype;
pub mod approximation;
pub mod bounds;
mod incorporation;
pub mod errors;
pub mod system;
pub mod completion;
pub mod atoms;
pub mod trace;
pub mod reporter;
pub mod builder_inference;

pub use atoms::{CallId, CallInfo, CalleeDescriptor, CalleeKind, ElementId, ResolvedAtom, ResolvedCallAtom};
pub use bounds::{Bound, BoundKind, ConstraintPosition, TypeBounds};
pub use builder_inference::{BuilderInferenceSession, SessionArena, SessionChain, SessionId};
pub use completion::{CompletionMode, ConstraintSystemCompleter};
pub use env::TypeEnvironment;
pub use errors::ConstraintSystemError;
pub use intern::TypeInterner;
pub use reporter::{CollectingReporter, DiagnosticsReporter};
pub use substitution::{Substitutor, TypeSlot};
pub use system::{ConstraintStorage, ConstraintSystem, ConstraintSystemState};
pub use trace::{BindingTrace, TemporaryTrace, Trace};
pub use types::{TypeArg, TypeData, TypeId, TypeVarId};
