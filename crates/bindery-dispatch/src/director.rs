//! Call direction tracking for host overrides of native methods.
//!
//! A native method may defer to a host-side override of itself (a director
//! call). The override commonly calls back into the native default, which
//! would defer to the override again. Every dispatch records which way it
//! crossed the boundary so that cycle is broken: while a `NativeToHost` frame
//! for a receiver and method is active, that method resolves to natives only.

use std::fmt;

use bindery_core::ObjectHandle;

/// Which side initiated a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallDirection {
    /// Host code calling a method.
    HostToNative,
    /// Native code calling a host override.
    NativeToHost,
}

/// One active call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub direction: CallDirection,
    pub receiver: Option<ObjectHandle>,
    pub name: String,
}

impl CallFrame {
    pub fn new(direction: CallDirection, receiver: Option<ObjectHandle>, name: &str) -> Self {
        Self {
            direction,
            receiver,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            CallDirection::HostToNative => "->",
            CallDirection::NativeToHost => "<-",
        };
        match self.receiver {
            Some(r) => write!(f, "{} {}#{}", arrow, r, self.name),
            None => write!(f, "{} {}", arrow, self.name),
        }
    }
}

/// Stack of active calls, innermost last.
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop every frame above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    pub fn current(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// True while native code is inside a host override of `name` on
    /// `receiver`.
    pub fn in_override(&self, receiver: Option<ObjectHandle>, name: &str) -> bool {
        self.frames.iter().any(|f| {
            f.direction == CallDirection::NativeToHost && f.receiver == receiver && f.name == name
        })
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
