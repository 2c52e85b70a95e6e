//! Calling contexts.
//!
//! A calling context is a chain of `(call site, caller)` frames from the
//! program entry point down to the current function. Contexts are interned
//! by a [`CallContextFactory`] as arena nodes holding the index of their
//! parent, so structurally equal contexts share one [`ContextId`] and the
//! empty context is always [`ContextId::EMPTY`].

use std::fmt;

use parking_lot::RwLock;

use crate::factory::Interner;
use crate::params::ContextSensitivity;
use crate::types::{CallId, ContextId, FunctionId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum ContextKey {
    Empty,
    Push {
        parent: ContextId,
        call: CallId,
        caller: FunctionId,
    },
}

/// One frame of a calling context: the call site and the function containing it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub call: CallId,
    pub caller: FunctionId,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.caller, self.call)
    }
}

/// A resolved calling context, outermost frame first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallContext {
    pub id: ContextId,
    pub frames: Vec<Frame>,
}

impl CallContext {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return write!(f, "<empty>");
        }
        let frames: Vec<String> = self.frames.iter().map(|fr| fr.to_string()).collect();
        write!(f, "{}", frames.join("/"))
    }
}

/// Interning factory of calling contexts.
#[derive(Debug)]
pub struct CallContextFactory {
    interner: RwLock<Interner<ContextKey>>,
}

impl Default for CallContextFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContextFactory {
    pub fn new() -> Self {
        let mut interner = Interner::default();
        let empty = interner.put(ContextKey::Empty);
        debug_assert_eq!(empty, 0);
        Self {
            interner: RwLock::new(interner),
        }
    }

    fn intern(&self, key: ContextKey) -> ContextId {
        if let Some(i) = self.interner.read().get(&key) {
            return ContextId::new(i);
        }
        ContextId::new(self.interner.write().put(key))
    }

    fn key(&self, ctx: ContextId) -> ContextKey {
        *self.interner.read().key(ctx.index() as u32)
    }

    pub fn empty(&self) -> ContextId {
        ContextId::EMPTY
    }

    /// The context `parent` extended with one frame.
    pub fn push(&self, parent: ContextId, call: CallId, caller: FunctionId) -> ContextId {
        self.intern(ContextKey::Push { parent, call, caller })
    }

    pub fn parent(&self, ctx: ContextId) -> Option<ContextId> {
        match self.key(ctx) {
            ContextKey::Empty => None,
            ContextKey::Push { parent, .. } => Some(parent),
        }
    }

    /// Innermost frame of `ctx`.
    pub fn frame(&self, ctx: ContextId) -> Option<Frame> {
        match self.key(ctx) {
            ContextKey::Empty => None,
            ContextKey::Push { call, caller, .. } => Some(Frame { call, caller }),
        }
    }

    /// Frames of `ctx`, outermost first.
    pub fn frames(&self, ctx: ContextId) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut cur = ctx;
        while let ContextKey::Push { parent, call, caller } = self.key(cur) {
            frames.push(Frame { call, caller });
            cur = parent;
        }
        frames.reverse();
        frames
    }

    pub fn get(&self, ctx: ContextId) -> CallContext {
        CallContext {
            id: ctx,
            frames: self.frames(ctx),
        }
    }

    /// Context of a callee reached from `caller` (in context `parent`) through `call`.
    pub fn callee_context(
        &self,
        parent: ContextId,
        call: CallId,
        caller: FunctionId,
        sensitivity: ContextSensitivity,
    ) -> ContextId {
        match sensitivity {
            ContextSensitivity::Insensitive => ContextId::EMPTY,
            ContextSensitivity::CallString { depth: 0 } => ContextId::EMPTY,
            ContextSensitivity::CallString { depth } => {
                let mut frames = self.frames(parent);
                frames.push(Frame { call, caller });
                let skip = frames.len().saturating_sub(depth);
                frames[skip..]
                    .iter()
                    .fold(ContextId::EMPTY, |ctx, fr| self.push(ctx, fr.call, fr.caller))
            }
        }
    }

    /// Number of interned contexts, including the empty one.
    pub fn len(&self) -> usize {
        self.interner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_interned() {
        let factory = CallContextFactory::new();
        let main = FunctionId(0);
        let c1 = factory.push(ContextId::EMPTY, CallId(1), main);
        let c2 = factory.push(ContextId::EMPTY, CallId(1), main);
        let c3 = factory.push(ContextId::EMPTY, CallId(2), main);
        assert_eq!(c1, c2);
        assert_ne!(c1, c3);
        assert_eq!(factory.len(), 3);
        assert_eq!(factory.parent(c1), Some(ContextId::EMPTY));
        assert_eq!(factory.parent(ContextId::EMPTY), None);
    }

    #[test]
    fn test_frames() {
        let factory = CallContextFactory::new();
        let c1 = factory.push(ContextId::EMPTY, CallId(1), FunctionId(0));
        let c2 = factory.push(c1, CallId(5), FunctionId(3));
        let ctx = factory.get(c2);
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.to_string(), "f0@call#1/f3@call#5");
        assert_eq!(factory.frame(c2), Some(Frame { call: CallId(5), caller: FunctionId(3) }));
        assert!(factory.get(ContextId::EMPTY).is_empty());
    }

    #[test]
    fn test_callee_context_sensitivity() {
        let factory = CallContextFactory::new();
        let c1 = factory.push(ContextId::EMPTY, CallId(1), FunctionId(0));
        let full = factory.callee_context(c1, CallId(2), FunctionId(1), ContextSensitivity::CallString { depth: usize::MAX });
        assert_eq!(factory.frames(full).len(), 2);

        let bounded = factory.callee_context(c1, CallId(2), FunctionId(1), ContextSensitivity::CallString { depth: 1 });
        assert_eq!(factory.frames(bounded), vec![Frame { call: CallId(2), caller: FunctionId(1) }]);

        let none = factory.callee_context(c1, CallId(2), FunctionId(1), ContextSensitivity::Insensitive);
        assert_eq!(none, ContextId::EMPTY);
    }
}
