//! The type environment: the explicit context object every inference
//! operation receives.
//!
//! It owns:
//! - name and type interners
//! - the `ClassTable` (declared classifiers, their type parameters and supertypes)
//! - the `TypeVariableStore` arena (one entry per type variable ever created)
//! - handles to the built-in classifiers
//! - the active `InferenceSettings`
//!
//! Nothing here is global, so independent environments never observe each
//! other and tests build a fresh one per case.

use crate::intern::TypeInterner;
use crate::types::{ClassId, TypeArg, TypeData, TypeId, TypeVarId, Variance};
use bitflags::bitflags;
use kinfer_common::{Atom, InferenceSettings, Interner};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::{Arc, RwLock};
use tracing::trace;

// =============================================================================
// Errors
// =============================================================================

/// Errors from building the class table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeEnvError {
    #[error("class `{0}` is already declared")]
    DuplicateClass(String),
    #[error("unknown class id {0:?}")]
    UnknownClass(ClassId),
    #[error("class `{name}` expects {expected} type arguments, got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("supertype of `{0}` must be a class type")]
    InvalidSupertype(String),
}

// =============================================================================
// Classes
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    /// A singleton `object` declaration.
    Object,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeParamInfo {
    pub name: Atom,
    pub variance: Variance,
}

#[derive(Clone, Debug)]
pub struct ClassInfo {
    pub name: Atom,
    pub kind: ClassKind,
    pub type_params: Vec<TypeParamInfo>,
    /// Direct supertypes; may mention this class's parameters as `TypeData::Param`.
    pub supertypes: Vec<TypeId>,
}

/// Declared classifiers, indexed by `ClassId`.
pub struct ClassTable {
    classes: RwLock<Vec<Arc<ClassInfo>>>,
    by_name: RwLock<FxHashMap<Atom, ClassId>>,
}

impl ClassTable {
    pub fn new() -> Self {
        ClassTable {
            classes: RwLock::new(Vec::new()),
            by_name: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn get(&self, class: ClassId) -> Option<Arc<ClassInfo>> {
        let classes = self.classes.read().expect("class table lock poisoned");
        classes.get(class.0 as usize).cloned()
    }

    pub fn lookup(&self, name: Atom) -> Option<ClassId> {
        let by_name = self.by_name.read().expect("class table lock poisoned");
        by_name.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.read().expect("class table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn declare(
        &self,
        name: Atom,
        display_name: &str,
        kind: ClassKind,
        type_params: Vec<TypeParamInfo>,
    ) -> Result<ClassId, TypeEnvError> {
        let mut by_name = self.by_name.write().expect("class table lock poisoned");
        if by_name.contains_key(&name) {
            return Err(TypeEnvError::DuplicateClass(display_name.to_string()));
        }
        let mut classes = self.classes.write().expect("class table lock poisoned");
        let id = ClassId(classes.len() as u32);
        classes.push(Arc::new(ClassInfo {
            name,
            kind,
            type_params,
            supertypes: Vec::new(),
        }));
        by_name.insert(name, id);
        Ok(id)
    }

    fn push_supertype(&self, class: ClassId, supertype: TypeId) -> Result<(), TypeEnvError> {
        let mut classes = self.classes.write().expect("class table lock poisoned");
        let info = classes
            .get_mut(class.0 as usize)
            .ok_or(TypeEnvError::UnknownClass(class))?;
        Arc::make_mut(info).supertypes.push(supertype);
        Ok(())
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Type variables
// =============================================================================

bitflags! {
    /// Annotations a type variable carries from its declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VariableAnnotations: u8 {
        /// Solutions are restricted to types mentioned in the variable's bounds.
        const ONLY_INPUT_TYPES = 1 << 0;
        /// Stands for the return type of a lambda that is not analyzed yet.
        const POSTPONED_LAMBDA_RETURN = 1 << 1;
    }
}

/// Where a type variable came from, for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VariableOrigin {
    /// Fresh variable for the `index`-th type parameter of a called function.
    TypeParameter { callee: Atom, index: u32 },
    LambdaReturn,
    LambdaReceiver,
    Synthetic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeVariableInfo {
    pub name: Atom,
    pub origin: VariableOrigin,
    pub annotations: VariableAnnotations,
    /// The variable's own type (`TypeData::Variable`).
    pub default_type: TypeId,
}

/// Arena of type variables, keyed by `TypeVarId`.
pub struct TypeVariableStore {
    variables: RwLock<Vec<TypeVariableInfo>>,
}

impl TypeVariableStore {
    pub fn new() -> Self {
        TypeVariableStore {
            variables: RwLock::new(Vec::new()),
        }
    }

    pub fn get(&self, var: TypeVarId) -> Option<TypeVariableInfo> {
        let variables = self.variables.read().expect("variable store lock poisoned");
        variables.get(var.0 as usize).copied()
    }

    pub fn annotations(&self, var: TypeVarId) -> VariableAnnotations {
        self.get(var).map(|info| info.annotations).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.variables.read().expect("variable store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeVariableStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Built-ins
// =============================================================================

/// Handles to the built-in classifiers.
#[derive(Clone, Debug)]
pub struct BuiltIns {
    pub comparable: ClassId,
    pub number: ClassId,
    pub int: ClassId,
    pub long: ClassId,
    pub short: ClassId,
    pub byte: ClassId,
    pub double: ClassId,
    pub char_sequence: ClassId,
    pub string: ClassId,
    pub collection: ClassId,
    pub list: ClassId,
    pub mutable_collection: ClassId,
    pub mutable_list: ClassId,

    pub number_type: TypeId,
    pub int_type: TypeId,
    pub long_type: TypeId,
    pub short_type: TypeId,
    pub byte_type: TypeId,
    pub double_type: TypeId,
    pub char_sequence_type: TypeId,
    pub string_type: TypeId,
}

// =============================================================================
// TypeEnvironment
// =============================================================================

pub struct TypeEnvironment {
    pub names: Interner,
    pub interner: TypeInterner,
    pub classes: ClassTable,
    pub variables: TypeVariableStore,
    pub builtins: BuiltIns,
    pub settings: InferenceSettings,
}

impl TypeEnvironment {
    pub fn new(settings: InferenceSettings) -> Self {
        let names = Interner::new();
        names.intern_common();
        let interner = TypeInterner::new();
        let classes = ClassTable::new();
        let builtins = declare_builtins(&names, &interner, &classes);
        TypeEnvironment {
            names,
            interner,
            classes,
            variables: TypeVariableStore::new(),
            builtins,
            settings,
        }
    }

    /// Declare a classifier with the given type parameters.
    pub fn declare_class(
        &self,
        name: &str,
        kind: ClassKind,
        type_params: &[(&str, Variance)],
    ) -> Result<ClassId, TypeEnvError> {
        let params = type_params
            .iter()
            .map(|&(param, variance)| TypeParamInfo {
                name: self.names.intern(param),
                variance,
            })
            .collect();
        let id = self
            .classes
            .declare(self.names.intern(name), name, kind, params)?;
        trace!(class = name, id = id.0, "declared class");
        Ok(id)
    }

    /// Add a direct supertype. It must be a class type of matching arity and
    /// may refer to `class`'s own parameters through [`Self::param`].
    pub fn add_supertype(&self, class: ClassId, supertype: TypeId) -> Result<(), TypeEnvError> {
        let info = self
            .classes
            .get(class)
            .ok_or(TypeEnvError::UnknownClass(class))?;
        let Some((super_class, args)) = self.interner.as_class(supertype) else {
            return Err(TypeEnvError::InvalidSupertype(
                self.names.resolve(info.name).to_string(),
            ));
        };
        let super_info = self
            .classes
            .get(super_class)
            .ok_or(TypeEnvError::UnknownClass(super_class))?;
        if super_info.type_params.len() != args.len() {
            return Err(TypeEnvError::ArityMismatch {
                name: self.names.resolve(super_info.name).to_string(),
                expected: super_info.type_params.len(),
                actual: args.len(),
            });
        }
        self.classes.push_supertype(class, supertype)
    }

    /// Build `class<args>`, checking the argument count.
    pub fn class_type(&self, class: ClassId, args: Vec<TypeArg>) -> Result<TypeId, TypeEnvError> {
        let info = self
            .classes
            .get(class)
            .ok_or(TypeEnvError::UnknownClass(class))?;
        if info.type_params.len() != args.len() {
            return Err(TypeEnvError::ArityMismatch {
                name: self.names.resolve(info.name).to_string(),
                expected: info.type_params.len(),
                actual: args.len(),
            });
        }
        Ok(self.interner.class_type(class, args))
    }

    /// The `index`-th type parameter of `class`, for use in its supertypes.
    pub fn param(&self, class: ClassId, index: u32) -> TypeId {
        self.interner.param(class, index)
    }

    /// Allocate a new type variable.
    pub fn new_type_variable(
        &self,
        name: &str,
        origin: VariableOrigin,
        annotations: VariableAnnotations,
    ) -> TypeVarId {
        let mut variables = self
            .variables
            .variables
            .write()
            .expect("variable store lock poisoned");
        let var = TypeVarId(variables.len() as u32);
        let default_type = self.interner.variable(var);
        variables.push(TypeVariableInfo {
            name: self.names.intern(name),
            origin,
            annotations,
            default_type,
        });
        trace!(var = var.0, name, "new type variable");
        var
    }

    pub fn variable_type(&self, var: TypeVarId) -> TypeId {
        self.interner.variable(var)
    }

    pub fn stub_type(&self, var: TypeVarId) -> TypeId {
        self.interner.stub(var)
    }

    pub fn variable_name(&self, var: TypeVarId) -> Arc<str> {
        self.variables
            .get(var)
            .map(|info| self.names.resolve(info.name))
            .unwrap_or_else(|| Arc::from("?"))
    }

    pub fn class_name(&self, class: ClassId) -> Arc<str> {
        self.classes
            .get(class)
            .map(|info| self.names.resolve(info.name))
            .unwrap_or_else(|| Arc::from("?"))
    }

    pub fn is_object_class(&self, class: ClassId) -> bool {
        self.classes
            .get(class)
            .is_some_and(|info| info.kind == ClassKind::Object)
    }

    // ----- Built-in shortcuts -----

    pub fn list_of(&self, element: TypeId) -> TypeId {
        self.interner
            .class_type(self.builtins.list, vec![TypeArg::invariant(element)])
    }

    pub fn mutable_list_of(&self, element: TypeId) -> TypeId {
        self.interner
            .class_type(self.builtins.mutable_list, vec![TypeArg::invariant(element)])
    }

    pub fn comparable_of(&self, ty: TypeId) -> TypeId {
        self.interner
            .class_type(self.builtins.comparable, vec![TypeArg::invariant(ty)])
    }

    /// Numeric classes an integer literal may default to, in preference order.
    pub fn integer_literal_candidates(&self, value: i64) -> SmallVec<[TypeId; 4]> {
        let b = &self.builtins;
        let mut out = SmallVec::new();
        if i32::try_from(value).is_ok() {
            out.push(b.int_type);
        }
        out.push(b.long_type);
        if i8::try_from(value).is_ok() {
            out.push(b.byte_type);
        }
        if i16::try_from(value).is_ok() {
            out.push(b.short_type);
        }
        out
    }

    /// Whether the type's outermost constructor can be written in source.
    pub fn is_denotable(&self, ty: TypeId) -> bool {
        match self.interner.lookup(ty) {
            Some(TypeData::Intrinsic(_) | TypeData::Class { .. } | TypeData::Param { .. }) => true,
            Some(
                TypeData::Variable(_)
                | TypeData::Stub(_)
                | TypeData::Captured(_)
                | TypeData::IntegerLiteral(_)
                | TypeData::Intersection(_),
            )
            | None => false,
        }
    }
}

impl Default for TypeEnvironment {
    fn default() -> Self {
        Self::new(InferenceSettings::default())
    }
}

fn declare_builtins(names: &Interner, interner: &TypeInterner, classes: &ClassTable) -> BuiltIns {
    // The built-in table is fixed and declared into an empty class table,
    // so none of these declarations can collide.
    let declare = |name: &str, kind: ClassKind, params: &[(&str, Variance)]| -> ClassId {
        let params = params
            .iter()
            .map(|&(param, variance)| TypeParamInfo {
                name: names.intern(param),
                variance,
            })
            .collect();
        let atom = names.intern(name);
        match classes.declare(atom, name, kind, params) {
            Ok(id) => id,
            Err(err) => panic!("built-in class table is inconsistent: {err}"),
        }
    };

    let comparable = declare("Comparable", ClassKind::Interface, &[("T", Variance::In)]);
    let number = declare("Number", ClassKind::Class, &[]);
    let int = declare("Int", ClassKind::Class, &[]);
    let long = declare("Long", ClassKind::Class, &[]);
    let short = declare("Short", ClassKind::Class, &[]);
    let byte = declare("Byte", ClassKind::Class, &[]);
    let double = declare("Double", ClassKind::Class, &[]);
    let char_sequence = declare("CharSequence", ClassKind::Interface, &[]);
    let string = declare("String", ClassKind::Class, &[]);
    let collection = declare("Collection", ClassKind::Interface, &[("E", Variance::Out)]);
    let list = declare("List", ClassKind::Interface, &[("E", Variance::Out)]);
    let mutable_collection = declare("MutableCollection", ClassKind::Interface, &[("E", Variance::Invariant)]);
    let mutable_list = declare("MutableList", ClassKind::Interface, &[("E", Variance::Invariant)]);

    let simple = |class: ClassId| interner.class_type(class, Vec::new());
    let comparable_of = |ty: TypeId| interner.class_type(comparable, vec![TypeArg::invariant(ty)]);
    let push = |class: ClassId, supertype: TypeId| {
        if let Err(err) = classes.push_supertype(class, supertype) {
            panic!("built-in class table is inconsistent: {err}");
        }
    };

    let number_type = simple(number);
    let numeric = |class: ClassId| -> TypeId {
        let ty = simple(class);
        push(class, number_type);
        push(class, comparable_of(ty));
        ty
    };
    let int_type = numeric(int);
    let long_type = numeric(long);
    let short_type = numeric(short);
    let byte_type = numeric(byte);
    let double_type = numeric(double);

    let char_sequence_type = simple(char_sequence);
    let string_type = simple(string);
    push(string, char_sequence_type);
    push(string, comparable_of(string_type));

    let element_of = |class: ClassId| interner.param(class, 0);
    push(list, interner.class_type(collection, vec![TypeArg::invariant(element_of(list))]));
    push(
        mutable_collection,
        interner.class_type(collection, vec![TypeArg::invariant(element_of(mutable_collection))]),
    );
    push(
        mutable_list,
        interner.class_type(list, vec![TypeArg::invariant(element_of(mutable_list))]),
    );
    push(
        mutable_list,
        interner.class_type(
            mutable_collection,
            vec![TypeArg::invariant(element_of(mutable_list))],
        ),
    );

    BuiltIns {
        comparable,
        number,
        int,
        long,
        short,
        byte,
        double,
        char_sequence,
        string,
        collection,
        list,
        mutable_collection,
        mutable_list,
        number_type,
        int_type,
        long_type,
        short_type,
        byte_type,
        double_type,
        char_sequence_type,
        string_type,
    }
}

#[cfg(test)]
#[path = "../tests/env_tests.rs"]
mod tests;
