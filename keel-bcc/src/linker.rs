//! Class linker: assigns constant-pool indices and resolves thunks.
//!
//! Emission works on names; this pass owns the single authoritative
//! numbering. Classes come first (primitives 0..5 implicit, the enclosing
//! class at 6, then extends, implements and imports in declaration order),
//! then methods, static fields and instance fields, each dense in
//! declaration order. Every thunk is then OR-ed into its recorded bit slot.

use crate::compiler::{CompiledMethod, Thunk, ThunkKind};
use crate::error::{CompileError, ErrorKind, SourcePos};
use crate::parse::{ClassAst, ImportedMember};
use keel_types::{PoolIndex, TypeTag, FIRST_USER_CLASS};
use std::collections::HashMap;
use strum::IntoEnumIterator;

/// An entry of the methods, statics or instances pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMember {
    /// Class-pool index of the owner.
    pub owner: PoolIndex,
    /// Member name as pooled.
    pub name: String,
}

/// A fully linked class, ready for layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedClass {
    /// Dotted class name.
    pub name: String,
    /// Number of superinterfaces among the leading class entries.
    pub implements_count: u32,
    /// Classes-pool names, index 6 first. Primitives are not materialized.
    pub classes: Vec<String>,
    /// Methods pool in index order.
    pub methods: Vec<PoolMember>,
    /// How many pooled methods dispatch statically.
    pub static_method_count: u32,
    /// Statics pool in index order.
    pub statics: Vec<PoolMember>,
    /// Static fields declared by this class itself.
    pub own_static_count: u32,
    /// Instances pool in index order.
    pub instances: Vec<PoolMember>,
    /// Instance fields declared by this class itself.
    pub own_instance_count: u32,
    /// Surviving methods with resolved instruction words.
    pub code: Vec<CompiledMethod>,
}

/// Build the pools from the class declarations and rewrite every thunk of
/// the surviving methods. Resolution failures leave a zero field.
pub fn link(ast: &ClassAst, mut code: Vec<CompiledMethod>) -> (LinkedClass, Vec<CompileError>) {
    let mut errors = Vec::new();
    let mut pools = Pools::new();

    pools.add_class(&ast.name, ast_pos(ast), &mut errors);
    if let Some(extends) = &ast.extends {
        pools.add_class(extends, ast_pos(ast), &mut errors);
    }
    for implemented in &ast.implements {
        pools.add_class(implemented, ast_pos(ast), &mut errors);
    }
    for (import, pos) in &ast.imported_classes {
        pools.add_class(import, *pos, &mut errors);
    }

    for member in &ast.imported_methods {
        pools.add_member(Pool::Methods, member, &mut errors);
    }
    let mut static_method_count = 0;
    for proc in &ast.procedures {
        if proc.is_static {
            static_method_count += 1;
        }
        pools.add_own(Pool::Methods, &proc.name, proc.pos, &mut errors);
    }

    for member in &ast.imported_statics {
        pools.add_member(Pool::Statics, member, &mut errors);
    }
    for field in &ast.static_fields {
        pools.add_own(Pool::Statics, &field.name, field.pos, &mut errors);
    }
    for member in &ast.imported_instances {
        pools.add_member(Pool::Instances, member, &mut errors);
    }
    for field in &ast.instance_fields {
        pools.add_own(Pool::Instances, &field.name, field.pos, &mut errors);
    }

    for method in &mut code {
        for thunk in &method.thunks {
            match pools.resolve(thunk) {
                Ok(index) => {
                    let word = &mut method.instructions[thunk.instruction as usize];
                    *word = thunk.slot.apply(*word, index);
                }
                Err(kind) => {
                    errors.push(CompileError::new(kind, thunk.pos).in_method(&method.name));
                }
            }
        }
    }

    let linked = LinkedClass {
        name: ast.name.clone(),
        implements_count: ast.implements.len() as u32,
        classes: pools.classes,
        methods: pools.methods,
        static_method_count,
        statics: pools.statics,
        own_static_count: ast.static_fields.len() as u32,
        instances: pools.instances,
        own_instance_count: ast.instance_fields.len() as u32,
        code,
    };
    (linked, errors)
}

enum Pool {
    Methods,
    Statics,
    Instances,
}

struct Pools {
    classes: Vec<String>,
    class_index: HashMap<String, PoolIndex>,
    methods: Vec<PoolMember>,
    method_index: HashMap<(PoolIndex, String), PoolIndex>,
    statics: Vec<PoolMember>,
    static_index: HashMap<(PoolIndex, String), PoolIndex>,
    instances: Vec<PoolMember>,
    instance_index: HashMap<(PoolIndex, String), PoolIndex>,
}

impl Pools {
    fn new() -> Self {
        let mut class_index = HashMap::new();
        for tag in TypeTag::iter().filter(|t| *t != TypeTag::Ref) {
            class_index.insert(tag.to_string(), tag as PoolIndex);
        }
        Self {
            classes: Vec::new(),
            class_index,
            methods: Vec::new(),
            method_index: HashMap::new(),
            statics: Vec::new(),
            static_index: HashMap::new(),
            instances: Vec::new(),
            instance_index: HashMap::new(),
        }
    }

    fn add_class(&mut self, name: &str, pos: SourcePos, errors: &mut Vec<CompileError>) {
        if self.class_index.contains_key(name) {
            errors.push(CompileError::new(
                ErrorKind::DuplicateImport(name.to_owned()),
                pos,
            ));
            return;
        }
        let index = FIRST_USER_CLASS + self.classes.len() as PoolIndex;
        self.class_index.insert(name.to_owned(), index);
        self.classes.push(name.to_owned());
    }

    fn add_member(&mut self, pool: Pool, member: &ImportedMember, errors: &mut Vec<CompileError>) {
        let owner = match &member.class {
            None => FIRST_USER_CLASS,
            Some(class) => match self.class_index.get(class) {
                Some(index) => *index,
                None => {
                    errors.push(CompileError::new(
                        ErrorKind::Unresolved {
                            kind: "class",
                            name: class.clone(),
                        },
                        member.pos,
                    ));
                    return;
                }
            },
        };
        self.insert(pool, owner, &member.name, member.pos, errors);
    }

    fn add_own(&mut self, pool: Pool, name: &str, pos: SourcePos, errors: &mut Vec<CompileError>) {
        self.insert(pool, FIRST_USER_CLASS, name, pos, errors);
    }

    fn insert(
        &mut self,
        pool: Pool,
        owner: PoolIndex,
        name: &str,
        pos: SourcePos,
        errors: &mut Vec<CompileError>,
    ) {
        let (members, index) = match pool {
            Pool::Methods => (&mut self.methods, &mut self.method_index),
            Pool::Statics => (&mut self.statics, &mut self.static_index),
            Pool::Instances => (&mut self.instances, &mut self.instance_index),
        };
        let key = (owner, name.to_owned());
        if index.contains_key(&key) {
            errors.push(CompileError::new(
                ErrorKind::DuplicateMember(name.to_owned()),
                pos,
            ));
            return;
        }
        index.insert(key, members.len() as PoolIndex);
        members.push(PoolMember {
            owner,
            name: name.to_owned(),
        });
    }

    fn resolve(&self, thunk: &Thunk) -> Result<PoolIndex, ErrorKind> {
        if thunk.kind == ThunkKind::Class {
            return self
                .class_index
                .get(&thunk.name)
                .copied()
                .ok_or_else(|| unresolved("class", None, &thunk.name));
        }
        let owner = match &thunk.class {
            None => FIRST_USER_CLASS,
            Some(class) => *self
                .class_index
                .get(class)
                .ok_or_else(|| unresolved("class", None, class))?,
        };
        let (index, what) = match thunk.kind {
            ThunkKind::Method => (&self.method_index, "method"),
            ThunkKind::StaticField => (&self.static_index, "static field"),
            ThunkKind::InstanceField => (&self.instance_index, "instance field"),
            ThunkKind::Class => unreachable!("handled above"),
        };
        index
            .get(&(owner, thunk.name.clone()))
            .copied()
            .ok_or_else(|| unresolved(what, thunk.class.as_deref(), &thunk.name))
    }
}

fn unresolved(kind: &'static str, class: Option<&str>, name: &str) -> ErrorKind {
    let name = match class {
        Some(class) => format!("{class}.{name}"),
        None => name.to_owned(),
    };
    ErrorKind::Unresolved { kind, name }
}

/// Header declarations carry no own anchor in the tree; anchor their
/// diagnostics at the top of the file.
fn ast_pos(_ast: &ClassAst) -> SourcePos {
    SourcePos::new(1, 1)
}
