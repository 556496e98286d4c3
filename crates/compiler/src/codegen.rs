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

/// Takes the AST and turns it into a list of opcodes.
use protocosm_common::model::CompileError;
use protocosm_var::{Var, Variant, v_str};
use tracing::trace;

use crate::ast::{BinaryOp, CatchCodes, Expr, Stmt, StmtNode, UnaryOp};
use crate::builtins::BUILTINS;
use crate::labels::{JumpLabel, Label};
use crate::opcode::Op;
use crate::parse::parse_program;
use crate::program::{PrgInner, Program};

pub struct Loop {
    top_label: Label,
    bottom_label: Label,
    /// How many try blocks were open when the loop started.
    try_depth: u16,
}

// Compiler code generation state.
pub struct CodegenState {
    pub(crate) ops: Vec<Op>,
    pub(crate) jumps: Vec<JumpLabel>,
    pub(crate) literals: Vec<Var>,
    pub(crate) loops: Vec<Loop>,
    pub(crate) try_depth: u16,
    pub(crate) line_number_spans: Vec<(usize, usize)>,
}

impl Default for CodegenState {
    fn default() -> Self {
        Self::new()
    }
}

impl CodegenState {
    pub fn new() -> Self {
        Self {
            ops: vec![],
            jumps: vec![],
            literals: vec![],
            loops: vec![],
            try_depth: 0,
            line_number_spans: vec![],
        }
    }

    // Create an anonymous jump label at the current position and return its unique ID.
    fn make_jump_label(&mut self) -> Label {
        let id = Label(self.jumps.len() as u16);
        let position = self.ops.len().into();
        self.jumps.push(JumpLabel { id, position });
        id
    }

    // Adjust the position of a jump label to the current position.
    fn commit_jump_label(&mut self, id: Label) {
        let position = self.ops.len().into();
        if let Some(jump) = self.jumps.get_mut(id.0 as usize) {
            jump.position = position;
        }
    }

    fn add_literal(&mut self, v: &Var) -> Label {
        let pos = self.literals.iter().position(|lv| lv == v).unwrap_or_else(|| {
            let idx = self.literals.len();
            self.literals.push(v.clone());
            idx
        });
        Label(pos as u16)
    }

    fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    fn generate_arg_list(&mut self, args: &[Expr]) -> Result<(), CompileError> {
        if args.is_empty() {
            self.emit(Op::ImmEmptyList);
            return Ok(());
        }
        for (i, arg) in args.iter().enumerate() {
            self.generate_expr(arg)?;
            self.emit(if i == 0 {
                Op::MakeSingletonList
            } else {
                Op::ListAddTail
            });
        }
        Ok(())
    }

    fn push_lvalue(&mut self, expr: &Expr, indexed_above: bool) -> Result<(), CompileError> {
        match expr {
            Expr::Index(lhs, rhs) => {
                self.push_lvalue(lhs.as_ref(), true)?;
                self.generate_expr(rhs.as_ref())?;
                if indexed_above {
                    self.emit(Op::PushRef);
                }
            }
            Expr::Id(id) => {
                if indexed_above {
                    self.emit(Op::Push(*id));
                }
            }
            Expr::Prop { property, location } => {
                self.generate_expr(location.as_ref())?;
                self.generate_expr(property.as_ref())?;
                if indexed_above {
                    self.emit(Op::PushGetProp);
                }
            }
            Expr::Registry => return Err(CompileError::RegistryMisuse),
            _ => return Err(CompileError::InvalidAssignment),
        }
        Ok(())
    }

    fn generate_assign(&mut self, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.push_lvalue(left, false)?;
        self.generate_expr(right)?;
        if let Expr::Index(..) = left {
            self.emit(Op::PutTemp);
        }
        let mut is_indexed = false;
        let mut e = left;
        loop {
            // Figure out the form of assignment, handle correctly, then walk through
            // chained assignments
            match e {
                Expr::Index(lhs, _) => {
                    self.emit(Op::IndexSet);
                    e = lhs;
                    is_indexed = true;
                    continue;
                }
                Expr::Id(name) => {
                    self.emit(Op::Put(*name));
                    break;
                }
                Expr::Prop { .. } => {
                    self.emit(Op::PutProp);
                    break;
                }
                _ => return Err(CompileError::InvalidAssignment),
            }
        }
        if is_indexed {
            self.emit(Op::Pop);
            self.emit(Op::PushTemp);
        }
        Ok(())
    }

    fn generate_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Value(v) => match v.variant() {
                Variant::None => self.emit(Op::ImmNone),
                Variant::Int(i) => self.emit(Op::ImmInt(*i)),
                Variant::List(l) if l.is_empty() => self.emit(Op::ImmEmptyList),
                Variant::Map(m) if m.is_empty() => self.emit(Op::ImmEmptyMap),
                _ => {
                    let literal = self.add_literal(v);
                    self.emit(Op::Imm(literal));
                }
            },
            Expr::Id(name) => self.emit(Op::Push(*name)),
            Expr::Alias(name) => {
                let literal = self.add_literal(&v_str(name));
                self.emit(Op::PushAlias(literal));
            }
            Expr::Registry => return Err(CompileError::RegistryMisuse),
            Expr::And(left, right) => {
                self.generate_expr(left.as_ref())?;
                let end_label = self.make_jump_label();
                self.emit(Op::And(end_label));
                self.generate_expr(right.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::Or(left, right) => {
                self.generate_expr(left.as_ref())?;
                let end_label = self.make_jump_label();
                self.emit(Op::Or(end_label));
                self.generate_expr(right.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::Binary(op, left, right) => {
                self.generate_expr(left.as_ref())?;
                self.generate_expr(right.as_ref())?;
                self.emit(match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    BinaryOp::Mod => Op::Mod,
                    BinaryOp::Exp => Op::Exp,
                    BinaryOp::Eq => Op::Eq,
                    BinaryOp::NEq => Op::Ne,
                    BinaryOp::Lt => Op::Lt,
                    BinaryOp::LtE => Op::Le,
                    BinaryOp::Gt => Op::Gt,
                    BinaryOp::GtE => Op::Ge,
                    BinaryOp::In => Op::In,
                });
            }
            Expr::Unary(op, expr) => {
                self.generate_expr(expr.as_ref())?;
                self.emit(match op {
                    UnaryOp::Neg => Op::UnaryMinus,
                    UnaryOp::Not => Op::Not,
                });
            }
            Expr::Prop { location, property } => {
                self.generate_expr(location.as_ref())?;
                self.generate_expr(property.as_ref())?;
                self.emit(Op::GetProp);
            }
            Expr::Call { function, args } => {
                let Some(id) = BUILTINS.find_builtin(function) else {
                    return Err(CompileError::UnknownBuiltinFunction(function.clone()));
                };
                self.generate_arg_list(args)?;
                self.emit(Op::FuncCall { id });
            }
            Expr::Method {
                location,
                method,
                args,
            } => {
                if let Expr::Registry = location.as_ref() {
                    self.generate_expr(method.as_ref())?;
                    self.generate_arg_list(args)?;
                    self.emit(Op::CallRegistry);
                } else {
                    self.generate_expr(location.as_ref())?;
                    self.generate_expr(method.as_ref())?;
                    self.generate_arg_list(args)?;
                    self.emit(Op::CallMethod);
                }
            }
            Expr::Range { base, from, to } => {
                self.generate_expr(base.as_ref())?;
                self.generate_expr(from.as_ref())?;
                self.generate_expr(to.as_ref())?;
                self.emit(Op::RangeRef);
            }
            Expr::Index(base, index) => {
                self.generate_expr(base.as_ref())?;
                self.generate_expr(index.as_ref())?;
                self.emit(Op::Ref);
            }
            Expr::Cond {
                condition,
                consequence,
                alternative,
            } => {
                self.generate_expr(condition.as_ref())?;
                let else_label = self.make_jump_label();
                self.emit(Op::IfQues(else_label));
                self.generate_expr(consequence.as_ref())?;
                let end_label = self.make_jump_label();
                self.emit(Op::Jump { label: end_label });
                self.commit_jump_label(else_label);
                self.generate_expr(alternative.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::List(elements) => self.generate_arg_list(elements)?,
            Expr::Map(entries) => {
                self.emit(Op::ImmEmptyMap);
                for (key, value) in entries {
                    self.generate_expr(key)?;
                    self.generate_expr(value)?;
                    self.emit(Op::MapInsert);
                }
            }
            Expr::Assign { left, right } => self.generate_assign(left, right)?,
        }
        Ok(())
    }

    fn generate_loop_body(
        &mut self,
        top_label: Label,
        bottom_label: Label,
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        self.loops.push(Loop {
            top_label,
            bottom_label,
            try_depth: self.try_depth,
        });
        for stmt in body {
            self.generate_stmt(stmt)?;
        }
        self.loops.pop();
        self.emit(Op::Jump { label: top_label });
        self.commit_jump_label(bottom_label);
        Ok(())
    }

    fn generate_loop_exit(&mut self, is_break: bool) -> Result<(), CompileError> {
        let Some(l) = self.loops.last() else {
            let what = if is_break { "break" } else { "continue" };
            return Err(CompileError::OutsideLoop(what.to_string()));
        };
        let label = if is_break { l.bottom_label } else { l.top_label };
        let handlers = self.try_depth - l.try_depth;
        if handlers == 0 {
            self.emit(Op::Jump { label });
        } else {
            self.emit(Op::Exit { label, handlers });
        }
        Ok(())
    }

    pub fn generate_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        self.line_number_spans.push((self.ops.len(), stmt.line_col.0));
        match &stmt.node {
            StmtNode::Cond { arms, otherwise } => {
                let end_label = self.make_jump_label();
                let mut is_else = false;
                for arm in arms {
                    self.generate_expr(&arm.condition)?;
                    let else_label = self.make_jump_label();
                    self.emit(if is_else {
                        Op::Eif(else_label)
                    } else {
                        Op::If(else_label)
                    });
                    is_else = true;
                    for stmt in &arm.statements {
                        self.generate_stmt(stmt)?;
                    }
                    self.emit(Op::Jump { label: end_label });
                    self.commit_jump_label(else_label);
                }
                if let Some(otherwise) = otherwise {
                    for stmt in otherwise {
                        self.generate_stmt(stmt)?;
                    }
                }
                self.commit_jump_label(end_label);
            }
            StmtNode::ForList {
                id,
                list_register,
                position_register,
                expr,
                body,
            } => {
                self.generate_expr(expr)?;
                self.emit(Op::Put(*list_register));
                self.emit(Op::Pop);
                self.emit(Op::ImmInt(0));
                self.emit(Op::Put(*position_register));
                self.emit(Op::Pop);
                let top_label = self.make_jump_label();
                let end_label = self.make_jump_label();
                self.emit(Op::ForList {
                    id: *id,
                    list: *list_register,
                    position: *position_register,
                    end_label,
                });
                self.generate_loop_body(top_label, end_label, body)?;
            }
            StmtNode::ForRange {
                id,
                position_register,
                end_register,
                from,
                to,
                body,
            } => {
                self.generate_expr(from)?;
                self.emit(Op::Put(*position_register));
                self.emit(Op::Pop);
                self.generate_expr(to)?;
                self.emit(Op::Put(*end_register));
                self.emit(Op::Pop);
                let top_label = self.make_jump_label();
                let end_label = self.make_jump_label();
                self.emit(Op::ForRange {
                    id: *id,
                    position: *position_register,
                    end: *end_register,
                    end_label,
                });
                self.generate_loop_body(top_label, end_label, body)?;
            }
            StmtNode::While { condition, body } => {
                let top_label = self.make_jump_label();
                self.generate_expr(condition)?;
                let end_label = self.make_jump_label();
                self.emit(Op::While(end_label));
                self.generate_loop_body(top_label, end_label, body)?;
            }
            StmtNode::TryExcept { body, excepts } => {
                let handler = self.make_jump_label();
                self.emit(Op::TryExcept { handler });
                self.try_depth += 1;
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.try_depth -= 1;
                let end_label = self.make_jump_label();
                self.emit(Op::EndExcept(end_label));
                self.commit_jump_label(handler);
                // The caught error is on the stack; each arm tests its codes against it in turn.
                for arm in excepts {
                    match &arm.codes {
                        CatchCodes::Any => self.emit(Op::ImmNone),
                        CatchCodes::Codes(codes) => self.generate_arg_list(codes)?,
                    }
                    let next_arm = self.make_jump_label();
                    self.emit(Op::ExceptMatch(next_arm));
                    if let Some(id) = arm.id {
                        self.emit(Op::Put(id));
                    }
                    self.emit(Op::Pop);
                    for stmt in &arm.statements {
                        self.generate_stmt(stmt)?;
                    }
                    self.emit(Op::Jump { label: end_label });
                    self.commit_jump_label(next_arm);
                }
                self.emit(Op::Reraise);
                self.commit_jump_label(end_label);
            }
            StmtNode::Break => self.generate_loop_exit(true)?,
            StmtNode::Continue => self.generate_loop_exit(false)?,
            StmtNode::Return(Some(expr)) => {
                self.generate_expr(expr)?;
                self.emit(Op::Return);
            }
            StmtNode::Return(None) => self.emit(Op::Return0),
            StmtNode::Expr(expr) => {
                self.generate_expr(expr)?;
                self.emit(Op::Pop);
            }
        }
        Ok(())
    }
}

/// Compile from a program string.
pub fn compile(program: &str) -> Result<Program, CompileError> {
    let parse = parse_program(program)?;

    let mut cg_state = CodegenState::new();
    for stmt in &parse.stmts {
        cg_state.generate_stmt(stmt)?;
    }
    cg_state.emit(Op::Done);

    trace!(
        ops = cg_state.ops.len(),
        literals = cg_state.literals.len(),
        "Compiled method"
    );

    Ok(Program::new(PrgInner {
        literals: cg_state.literals,
        jump_labels: cg_state.jumps,
        var_names: parse.names,
        main_vector: cg_state.ops,
        line_number_spans: cg_state.line_number_spans,
    }))
}
