//! Type interning for structural deduplication.
//!
//! This module implements the type interning engine that converts
//! `TypeData` structures into lightweight `TypeId` handles.
//!
//! Benefits:
//! - O(1) type equality (just compare `TypeId` values)
//! - Memory efficient (each unique structure stored once)
//! - Structural facts (`TypeFlags`, depth) computed once at intern time

use crate::types::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

struct SliceInterner<T> {
    items: Vec<Arc<[T]>>,
    map: FxHashMap<Arc<[T]>, u32>,
}

impl<T> SliceInterner<T>
where
    T: Eq + Hash,
{
    fn new() -> Self {
        let empty: Arc<[T]> = Arc::from(Vec::new());
        let mut map = FxHashMap::default();
        map.insert(empty.clone(), 0);
        SliceInterner {
            items: vec![empty],
            map,
        }
    }

    fn intern(&mut self, items: Vec<T>) -> u32 {
        if items.is_empty() {
            return 0;
        }

        if let Some(&id) = self.map.get(items.as_slice()) {
            return id;
        }

        let arc: Arc<[T]> = items.into();
        let id = self.items.len() as u32;
        self.items.push(arc.clone());
        self.map.insert(arc, id);
        id
    }

    fn get(&self, id: u32) -> Option<Arc<[T]>> {
        self.items.get(id as usize).cloned()
    }

    fn empty(&self) -> Arc<[T]> {
        self.items[0].clone()
    }
}

#[derive(Clone, Copy)]
struct TypeEntry {
    data: TypeData,
    flags: TypeFlags,
    depth: u32,
}

struct InternerState {
    key_to_id: FxHashMap<TypeData, TypeId>,
    entries: Vec<TypeEntry>,
    arg_lists: SliceInterner<TypeArg>,
    type_lists: SliceInterner<TypeId>,
}

impl InternerState {
    fn entry(&self, id: TypeId) -> Option<TypeEntry> {
        if id.is_intrinsic() {
            return intrinsic_kind(id).map(|kind| TypeEntry {
                data: TypeData::Intrinsic(kind),
                flags: if kind == IntrinsicKind::Error {
                    TypeFlags::CONTAINS_ERROR
                } else {
                    TypeFlags::empty()
                },
                depth: 1,
            });
        }
        self.entries
            .get((id.0 - TypeId::FIRST_USER) as usize)
            .copied()
    }

    fn flags_and_depth(&self, id: TypeId) -> (TypeFlags, u32) {
        self.entry(id)
            .map(|entry| (entry.flags, entry.depth))
            .unwrap_or((TypeFlags::CONTAINS_ERROR, 1))
    }

    /// Compute cached facts of a new type from its children.
    fn summarize(&self, data: &TypeData) -> (TypeFlags, u32) {
        match *data {
            TypeData::Intrinsic(IntrinsicKind::Error) => (TypeFlags::CONTAINS_ERROR, 1),
            TypeData::Intrinsic(_) => (TypeFlags::empty(), 1),
            TypeData::Variable(_) => (TypeFlags::CONTAINS_VARIABLE, 1),
            TypeData::Stub(_) => (TypeFlags::CONTAINS_STUB, 1),
            TypeData::Param { .. } => (TypeFlags::CONTAINS_PARAM, 1),
            TypeData::IntegerLiteral(_) => (TypeFlags::CONTAINS_INTEGER_LITERAL, 1),
            TypeData::Captured(captured) => {
                let (flags, depth) = self.flags_and_depth(captured.ty);
                (flags | TypeFlags::CONTAINS_CAPTURED, depth + 1)
            }
            TypeData::Class { args, .. } => {
                let mut flags = TypeFlags::empty();
                let mut depth = 0;
                if let Some(list) = self.arg_lists.get(args.0) {
                    for arg in list.iter() {
                        let (arg_flags, arg_depth) = self.flags_and_depth(arg.ty);
                        flags |= arg_flags;
                        depth = depth.max(arg_depth);
                    }
                }
                (flags, depth + 1)
            }
            TypeData::Intersection(members) => {
                let mut flags = TypeFlags::CONTAINS_INTERSECTION;
                let mut depth = 0;
                if let Some(list) = self.type_lists.get(members.0) {
                    for &member in list.iter() {
                        let (member_flags, member_depth) = self.flags_and_depth(member);
                        flags |= member_flags;
                        depth = depth.max(member_depth);
                    }
                }
                (flags, depth + 1)
            }
        }
    }
}

fn intrinsic_kind(id: TypeId) -> Option<IntrinsicKind> {
    match id {
        TypeId::ERROR => Some(IntrinsicKind::Error),
        TypeId::ANY => Some(IntrinsicKind::Any),
        TypeId::NOTHING => Some(IntrinsicKind::Nothing),
        TypeId::UNIT => Some(IntrinsicKind::Unit),
        _ => None,
    }
}

fn intrinsic_id(kind: IntrinsicKind) -> TypeId {
    match kind {
        IntrinsicKind::Error => TypeId::ERROR,
        IntrinsicKind::Any => TypeId::ANY,
        IntrinsicKind::Nothing => TypeId::NOTHING,
        IntrinsicKind::Unit => TypeId::UNIT,
    }
}

/// Type interning table.
///
/// All methods take `&self`; the interner lives inside the shared
/// `TypeEnvironment` and is appended to from every phase of inference.
pub struct TypeInterner {
    state: RwLock<InternerState>,
}

impl TypeInterner {
    pub fn new() -> Self {
        TypeInterner {
            state: RwLock::new(InternerState {
                key_to_id: FxHashMap::default(),
                entries: Vec::new(),
                arg_lists: SliceInterner::new(),
                type_lists: SliceInterner::new(),
            }),
        }
    }

    /// Intern a type structure and return its TypeId.
    /// If the structure already exists, returns the existing TypeId.
    pub fn intern(&self, data: TypeData) -> TypeId {
        if let TypeData::Intrinsic(kind) = data {
            return intrinsic_id(kind);
        }

        {
            let state = self.state.read().expect("type interner lock poisoned");
            if let Some(&id) = state.key_to_id.get(&data) {
                return id;
            }
        }

        let mut state = self.state.write().expect("type interner lock poisoned");
        if let Some(&id) = state.key_to_id.get(&data) {
            return id;
        }

        let (flags, depth) = state.summarize(&data);
        let id = TypeId(TypeId::FIRST_USER + state.entries.len() as u32);
        state.entries.push(TypeEntry { data, flags, depth });
        state.key_to_id.insert(data, id);
        id
    }

    /// Look up the structure of a type.
    pub fn lookup(&self, id: TypeId) -> Option<TypeData> {
        let state = self.state.read().expect("type interner lock poisoned");
        state.entry(id).map(|entry| entry.data)
    }

    pub fn flags(&self, id: TypeId) -> TypeFlags {
        let state = self.state.read().expect("type interner lock poisoned");
        state.flags_and_depth(id).0
    }

    /// Nesting depth of a type; intrinsics and variables have depth 1.
    pub fn depth(&self, id: TypeId) -> u32 {
        let state = self.state.read().expect("type interner lock poisoned");
        state.flags_and_depth(id).1
    }

    /// Number of non-intrinsic types interned so far.
    pub fn len(&self) -> usize {
        let state = self.state.read().expect("type interner lock poisoned");
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ----- List interning -----

    pub fn intern_type_args(&self, args: Vec<TypeArg>) -> TypeArgListId {
        let mut state = self.state.write().expect("type interner lock poisoned");
        TypeArgListId(state.arg_lists.intern(args))
    }

    pub fn type_args(&self, id: TypeArgListId) -> Arc<[TypeArg]> {
        let state = self.state.read().expect("type interner lock poisoned");
        state
            .arg_lists
            .get(id.0)
            .unwrap_or_else(|| state.arg_lists.empty())
    }

    pub fn type_list(&self, id: TypeListId) -> Arc<[TypeId]> {
        let state = self.state.read().expect("type interner lock poisoned");
        state
            .type_lists
            .get(id.0)
            .unwrap_or_else(|| state.type_lists.empty())
    }

    // ----- Constructors -----

    pub fn class_type(&self, class: ClassId, args: Vec<TypeArg>) -> TypeId {
        let args = self.intern_type_args(args);
        self.intern(TypeData::Class { class, args })
    }

    /// Class type with every argument invariant.
    pub fn class_type_of(&self, class: ClassId, args: &[TypeId]) -> TypeId {
        self.class_type(class, args.iter().map(|&ty| TypeArg::invariant(ty)).collect())
    }

    pub fn variable(&self, var: TypeVarId) -> TypeId {
        self.intern(TypeData::Variable(var))
    }

    pub fn stub(&self, var: TypeVarId) -> TypeId {
        self.intern(TypeData::Stub(var))
    }

    pub fn captured(&self, projection: ProjectionKind, ty: TypeId) -> TypeId {
        self.intern(TypeData::Captured(CapturedType { projection, ty }))
    }

    pub fn param(&self, class: ClassId, index: u32) -> TypeId {
        self.intern(TypeData::Param { class, index })
    }

    pub fn integer_literal(&self, value: i64) -> TypeId {
        self.intern(TypeData::IntegerLiteral(value))
    }

    /// Intersection of `members`, normalized: nested intersections are
    /// flattened, duplicates and `Any` dropped, members ordered by id.
    pub fn intersection(&self, members: Vec<TypeId>) -> TypeId {
        let mut flat: SmallVec<[TypeId; 4]> = SmallVec::new();
        for member in members {
            match self.lookup(member) {
                Some(TypeData::Intersection(list)) => flat.extend(self.type_list(list).iter().copied()),
                _ => flat.push(member),
            }
        }
        if flat.contains(&TypeId::ERROR) {
            return TypeId::ERROR;
        }
        if flat.contains(&TypeId::NOTHING) {
            return TypeId::NOTHING;
        }
        flat.retain(|ty| *ty != TypeId::ANY);
        flat.sort_unstable();
        flat.dedup();
        match flat.len() {
            0 => TypeId::ANY,
            1 => flat[0],
            _ => {
                let list = {
                    let mut state = self.state.write().expect("type interner lock poisoned");
                    TypeListId(state.type_lists.intern(flat.into_vec()))
                };
                self.intern(TypeData::Intersection(list))
            }
        }
    }

    // ----- Accessors -----

    pub fn as_variable(&self, id: TypeId) -> Option<TypeVarId> {
        match self.lookup(id) {
            Some(TypeData::Variable(var)) => Some(var),
            _ => None,
        }
    }

    pub fn as_stub(&self, id: TypeId) -> Option<TypeVarId> {
        match self.lookup(id) {
            Some(TypeData::Stub(var)) => Some(var),
            _ => None,
        }
    }

    pub fn as_class(&self, id: TypeId) -> Option<(ClassId, Arc<[TypeArg]>)> {
        match self.lookup(id) {
            Some(TypeData::Class { class, args }) => Some((class, self.type_args(args))),
            _ => None,
        }
    }

    pub fn as_captured(&self, id: TypeId) -> Option<CapturedType> {
        match self.lookup(id) {
            Some(TypeData::Captured(captured)) => Some(captured),
            _ => None,
        }
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../tests/intern_tests.rs"]
mod tests;
