// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use protocosm_compiler::{GlobalName, Label, Name, Program};
use protocosm_var::{Error, Obj, Var, v_list_iter, v_none, v_obj};

/// An active `try` block: where its handler starts, and how deep the value stack was on entry.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Handler {
    pub(crate) label: Label,
    pub(crate) valstack_pos: usize,
}

/// The execution state of one method activation.
#[derive(Clone, Debug)]
pub struct MethodFrame {
    pub(crate) program: Program,
    /// The program counter.
    pub(crate) pc: usize,
    /// Variable slots, indexed by `Name`. A slot that was never assigned is `None`.
    pub(crate) environment: Vec<Option<Var>>,
    /// The value stack.
    pub(crate) valstack: Vec<Var>,
    /// Scratch slot for indexed assignment.
    pub(crate) temp: Var,
    /// Active `try` blocks, innermost last.
    pub(crate) handlers: Vec<Handler>,
    /// An error handed in by the host that nothing in this frame catches; reported by the next
    /// `run`.
    pub(crate) uncaught: Option<Error>,
}

impl MethodFrame {
    pub fn new(program: Program, this: Obj, args: Vec<Var>) -> Self {
        let width = program.var_names().width();
        let mut frame = Self {
            program,
            pc: 0,
            environment: vec![None; width],
            valstack: vec![],
            temp: v_none(),
            handlers: vec![],
            uncaught: None,
        };
        frame.set_gvar(GlobalName::this, v_obj(this));
        frame.set_gvar(GlobalName::args, v_list_iter(args));
        frame
    }

    /// The source line of the instruction that last executed.
    pub fn line_number(&self) -> Option<usize> {
        self.program.line_num_for_position(self.pc.saturating_sub(1))
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Continue after a host request, with its answer.
    pub fn resume(&mut self, value: Var) {
        self.push(value);
    }

    /// Raise `error` at the point of the outstanding host request. Returns whether a handler in
    /// this frame caught it; if not, the next `run` reports it.
    pub fn resume_exception(&mut self, error: Error) -> bool {
        match self.catch(error) {
            Ok(()) => true,
            Err(error) => {
                self.uncaught = Some(error);
                false
            }
        }
    }

    /// Unwind to the innermost handler and jump to it with the error value on the stack, or hand
    /// the error back if there is none.
    pub(crate) fn catch(&mut self, error: Error) -> Result<(), Error> {
        let Some(handler) = self.handlers.pop() else {
            return Err(error);
        };
        self.valstack.truncate(handler.valstack_pos);
        self.push(error.to_var());
        self.jump(&handler.label);
        Ok(())
    }

    #[inline]
    pub fn set_gvar(&mut self, gname: GlobalName, value: Var) {
        self.environment[gname as usize] = Some(value);
    }

    #[inline]
    pub fn set_env(&mut self, id: &Name, v: Var) {
        self.environment[id.0 as usize] = Some(v);
    }

    /// Return the value of a local variable, if it has been assigned.
    #[inline]
    pub fn get_env(&self, id: &Name) -> Option<&Var> {
        self.environment.get(id.0 as usize).and_then(|v| v.as_ref())
    }

    #[inline]
    pub fn pop(&mut self) -> Var {
        self.valstack
            .pop()
            .unwrap_or_else(|| panic!("stack underflow @ PC: {}", self.pc))
    }

    #[inline]
    pub fn push(&mut self, v: Var) {
        self.valstack.push(v)
    }

    #[inline]
    pub fn peek_top(&self) -> &Var {
        self.valstack
            .last()
            .unwrap_or_else(|| panic!("stack underflow @ PC: {}", self.pc))
    }

    /// The top two values, top first.
    #[inline]
    pub fn peek2(&self) -> (&Var, &Var) {
        let l = self.valstack.len();
        (&self.valstack[l - 1], &self.valstack[l - 2])
    }

    #[inline]
    pub fn poke(&mut self, amt: usize, v: Var) {
        let l = self.valstack.len();
        self.valstack[l - amt - 1] = v;
    }

    #[inline]
    pub fn jump(&mut self, label_id: &Label) {
        let label = self
            .program
            .jump_label(*label_id)
            .unwrap_or_else(|| panic!("no jump label {} @ PC: {}", label_id.0, self.pc));
        self.pc = label.position.0 as usize;
    }
}
