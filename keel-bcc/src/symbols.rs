//! Per-method symbol table: local names to stack slots.
//!
//! Slots are 32-bit words handed out first-fit in definition order,
//! parameters first. A reference local is two slots wide and its offset is
//! recorded in the handle map so the collector can find frame roots.

use crate::error::ErrorKind;
use keel_types::{StackSlot, TypeTag};
use std::collections::HashMap;

/// A resolved local: slot offset plus type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Local {
    /// Offset of the first slot.
    pub slot: StackSlot,
    /// Value type.
    pub tag: TypeTag,
}

/// Local-variable table of one method under compilation.
#[derive(Debug, Default)]
pub struct Locals {
    by_name: HashMap<String, Local>,
    stack_size: StackSlot,
    handle_map: Vec<StackSlot>,
}

impl Locals {
    /// Allocate the next free slot for `name`. Fails when the name is
    /// already taken or the frame outgrows the 16-bit slot space.
    pub fn define(&mut self, name: &str, tag: TypeTag) -> Result<Local, ErrorKind> {
        if self.by_name.contains_key(name) {
            return Err(ErrorKind::RedefinedLocal(name.to_owned()));
        }
        let slot = self.stack_size;
        self.stack_size = self
            .stack_size
            .checked_add(tag.slot_width())
            .ok_or(ErrorKind::FrameTooLarge)?;
        if tag == TypeTag::Ref {
            self.handle_map.push(slot);
        }
        let local = Local { slot, tag };
        self.by_name.insert(name.to_owned(), local);
        Ok(local)
    }

    /// Look a name up.
    pub fn lookup(&self, name: &str) -> Result<Local, ErrorKind> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ErrorKind::UndefinedLocal(name.to_owned()))
    }

    /// Total frame size in slots.
    pub fn stack_size(&self) -> StackSlot {
        self.stack_size
    }

    /// Slots holding references, in definition order.
    pub fn handle_map(&self) -> &[StackSlot] {
        &self.handle_map
    }

    /// Consume the table, keeping only the handle map.
    pub fn into_handle_map(self) -> Vec<StackSlot> {
        self.handle_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_first_fit_by_width() {
        let mut locals = Locals::default();
        assert_eq!(locals.define("a", TypeTag::Int).unwrap().slot, 0);
        assert_eq!(locals.define("b", TypeTag::Long).unwrap().slot, 1);
        assert_eq!(locals.define("c", TypeTag::Ref).unwrap().slot, 3);
        assert_eq!(locals.define("d", TypeTag::Char).unwrap().slot, 5);
        assert_eq!(locals.stack_size(), 6);
        assert_eq!(locals.handle_map(), [3]);
    }

    #[test]
    fn redefinition_is_rejected_and_harmless() {
        let mut locals = Locals::default();
        locals.define("x", TypeTag::Int).unwrap();
        assert_eq!(
            locals.define("x", TypeTag::Long),
            Err(ErrorKind::RedefinedLocal("x".into()))
        );
        assert_eq!(locals.lookup("x").unwrap().tag, TypeTag::Int);
        assert_eq!(locals.stack_size(), 1);
    }

    #[test]
    fn lookup_of_missing_name_fails() {
        let locals = Locals::default();
        assert_eq!(
            locals.lookup("ghost"),
            Err(ErrorKind::UndefinedLocal("ghost".into()))
        );
    }
}
