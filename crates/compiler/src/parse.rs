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

/// Kicks off the Pest parser and converts it into our AST.
/// This is the main entry point for parsing.
use std::cell::RefCell;

use lazy_static::lazy_static;
use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use protocosm_common::model::CompileError;
use protocosm_var::{Obj, v_bool, v_float, v_int, v_none, v_obj, v_str, v_string};

use crate::ast::{BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, Stmt, StmtNode, UnaryOp};
use crate::builtins::BUILTINS;
use crate::names::Names;
use crate::parse::method::{MethodParser, Rule};

pub mod method {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "src/method.pest"]
    pub struct MethodParser;
}

/// The identifier that names the registry as a call target.
pub const REGISTRY_IDENT: &str = "registry";

lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        // Precedence from lowest to highest.
        // Assignment is lowest, then the ternary conditional.
        .op(Op::postfix(Rule::assign))
        .op(Op::postfix(Rule::cond_expr))
        .op(Op::infix(Rule::lor, Assoc::Left))
        .op(Op::infix(Rule::land, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left) | Op::infix(Rule::neq, Assoc::Left))
        .op(Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::gte, Assoc::Left)
            | Op::infix(Rule::lte, Assoc::Left))
        .op(Op::infix(Rule::in_op, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::modulus, Assoc::Left))
        // Exponent binds tighter than multiplication, and to the right.
        .op(Op::infix(Rule::pow, Assoc::Right))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
        // Indexing, property access and calls.
        .op(Op::postfix(Rule::index_range)
            | Op::postfix(Rule::index_single)
            | Op::postfix(Rule::method_call)
            | Op::postfix(Rule::method_expr_call)
            | Op::postfix(Rule::prop)
            | Op::postfix(Rule::prop_expr));
}

/// The emitted parse tree from the parse phase of the compiler.
#[derive(Debug)]
pub struct Parse {
    pub stmts: Vec<Stmt>,
    pub names: Names,
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_if
            | Rule::kw_elseif
            | Rule::kw_else
            | Rule::kw_endif
            | Rule::kw_while
            | Rule::kw_endwhile
            | Rule::kw_for
            | Rule::kw_in
            | Rule::kw_endfor
            | Rule::kw_try
            | Rule::kw_except
            | Rule::kw_endtry
            | Rule::kw_return
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_let
    )
}

/// The inner pairs of a statement, minus its keyword tokens.
fn significant(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn unquote_str(s: &str) -> Result<String, CompileError> {
    let mut output = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some(c) => output.push(c),
            None => {
                return Err(CompileError::StringLexError(format!(
                    "trailing backslash in string literal {s:?}"
                )));
            }
        }
    }
    Ok(output)
}

/// The root (variable, property owner or index base) an lvalue ultimately writes through.
fn lvalue_root(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::Id(_) | Expr::Prop { .. } => Some(expr),
        Expr::Index(base, _) => lvalue_root(base),
        _ => None,
    }
}

pub struct TreeTransformer {
    names: RefCell<Names>,
}

impl TreeTransformer {
    pub fn new() -> Self {
        Self {
            names: RefCell::new(Names::new()),
        }
    }

    fn bind_variable(&self, ident: &str) -> Result<crate::names::Name, CompileError> {
        let mut names = self.names.borrow_mut();
        let name = names.find_or_add_name(ident);
        if names.is_global(name) || ident == REGISTRY_IDENT {
            return Err(CompileError::AssignToConst(ident.to_string()));
        }
        Ok(name)
    }

    fn parse_atom(&self, pair: Pair<Rule>) -> Result<Expr, CompileError> {
        match pair.as_rule() {
            Rule::ident => {
                let ident = pair.as_str();
                if ident == REGISTRY_IDENT {
                    return Ok(Expr::Registry);
                }
                let name = self.names.borrow_mut().find_or_add_name(ident);
                Ok(Expr::Id(name))
            }
            Rule::object => {
                let ostr = &pair.as_str()[1..];
                let oid = ostr.parse::<i64>().map_err(|e| {
                    CompileError::StringLexError(format!("invalid object literal '{ostr}': {e}"))
                })?;
                Ok(Expr::Value(v_obj(Obj::mk_id(oid))))
            }
            Rule::integer => match pair.as_str().parse::<i64>() {
                Ok(int) => Ok(Expr::Value(v_int(int))),
                Err(e) => Err(CompileError::StringLexError(format!(
                    "invalid integer literal '{}': {e}",
                    pair.as_str()
                ))),
            },
            Rule::float => match pair.as_str().parse::<f64>() {
                Ok(float) => Ok(Expr::Value(v_float(float))),
                Err(e) => Err(CompileError::StringLexError(format!(
                    "invalid float literal '{}': {e}",
                    pair.as_str()
                ))),
            },
            Rule::string => {
                let inner = pair.into_inner().next().unwrap();
                Ok(Expr::Value(v_string(unquote_str(inner.as_str())?)))
            }
            Rule::boolean => Ok(Expr::Value(v_bool(pair.as_str() == "true"))),
            Rule::null => Ok(Expr::Value(v_none())),
            Rule::error_code => Ok(Expr::Value(v_str(pair.as_str()))),
            _ => unreachable!("unexpected atom: {:?}", pair.as_rule()),
        }
    }

    fn parse_exprlist(&self, pairs: Pairs<Rule>) -> Result<Vec<Expr>, CompileError> {
        pairs.map(|pair| self.parse_expr(pair.into_inner())).collect()
    }

    fn parse_arglist(&self, pair: Pair<Rule>) -> Result<Vec<Expr>, CompileError> {
        match pair.into_inner().next() {
            Some(exprlist) => self.parse_exprlist(exprlist.into_inner()),
            None => Ok(vec![]),
        }
    }

    fn parse_primary(&self, primary: Pair<Rule>) -> Result<Expr, CompileError> {
        match primary.as_rule() {
            Rule::paren => self.parse_expr(primary.into_inner().next().unwrap().into_inner()),
            Rule::list => match primary.into_inner().next() {
                Some(exprlist) => Ok(Expr::List(self.parse_exprlist(exprlist.into_inner())?)),
                None => Ok(Expr::List(vec![])),
            },
            Rule::map => {
                let mut entries = vec![];
                for entry in primary.into_inner() {
                    let mut parts = entry.into_inner();
                    let key = self.parse_expr(parts.next().unwrap().into_inner())?;
                    let value = self.parse_expr(parts.next().unwrap().into_inner())?;
                    entries.push((key, value));
                }
                Ok(Expr::Map(entries))
            }
            Rule::alias => {
                let name = primary.into_inner().next().unwrap().as_str();
                Ok(Expr::Alias(name.to_string()))
            }
            Rule::builtin_call => {
                let mut parts = primary.into_inner();
                let function = parts.next().unwrap().as_str();
                let args = self.parse_arglist(parts.next().unwrap())?;
                let Some(id) = BUILTINS.find_builtin(function) else {
                    return Err(CompileError::UnknownBuiltinFunction(function.to_string()));
                };
                if let Some(builtin) = BUILTINS.description_for(id) {
                    builtin.check_arity(args.len())?;
                }
                Ok(Expr::Call {
                    function: function.to_string(),
                    args,
                })
            }
            _ => self.parse_atom(primary),
        }
    }

    fn parse_expr(&self, pairs: Pairs<Rule>) -> Result<Expr, CompileError> {
        PRATT
            .map_primary(|primary| self.parse_primary(primary))
            .map_infix(|lhs, op, rhs| {
                let (lhs, rhs) = (Box::new(lhs?), Box::new(rhs?));
                let op = match op.as_rule() {
                    Rule::land => return Ok(Expr::And(lhs, rhs)),
                    Rule::lor => return Ok(Expr::Or(lhs, rhs)),
                    Rule::add => BinaryOp::Add,
                    Rule::sub => BinaryOp::Sub,
                    Rule::mul => BinaryOp::Mul,
                    Rule::div => BinaryOp::Div,
                    Rule::modulus => BinaryOp::Mod,
                    Rule::pow => BinaryOp::Exp,
                    Rule::eq => BinaryOp::Eq,
                    Rule::neq => BinaryOp::NEq,
                    Rule::lt => BinaryOp::Lt,
                    Rule::lte => BinaryOp::LtE,
                    Rule::gt => BinaryOp::Gt,
                    Rule::gte => BinaryOp::GtE,
                    Rule::in_op => BinaryOp::In,
                    _ => unreachable!("unexpected infix: {:?}", op.as_rule()),
                };
                Ok(Expr::Binary(op, lhs, rhs))
            })
            .map_prefix(|op, rhs| match op.as_rule() {
                Rule::not => Ok(Expr::Unary(UnaryOp::Not, Box::new(rhs?))),
                Rule::neg => Ok(Expr::Unary(UnaryOp::Neg, Box::new(rhs?))),
                _ => unreachable!("unexpected prefix: {:?}", op.as_rule()),
            })
            .map_postfix(|lhs, op| {
                let lhs = lhs?;
                match op.as_rule() {
                    Rule::method_call => {
                        let mut parts = op.into_inner();
                        let ident = parts.next().unwrap().as_str();
                        let args = self.parse_arglist(parts.next().unwrap())?;
                        Ok(Expr::Method {
                            location: Box::new(lhs),
                            method: Box::new(Expr::Value(v_str(ident))),
                            args,
                        })
                    }
                    Rule::method_expr_call => {
                        let mut parts = op.into_inner();
                        let method = self.parse_expr(parts.next().unwrap().into_inner())?;
                        let args = self.parse_arglist(parts.next().unwrap())?;
                        Ok(Expr::Method {
                            location: Box::new(lhs),
                            method: Box::new(method),
                            args,
                        })
                    }
                    Rule::prop => {
                        let ident = op.into_inner().next().unwrap().as_str();
                        Ok(Expr::Prop {
                            location: Box::new(lhs),
                            property: Box::new(Expr::Value(v_str(ident))),
                        })
                    }
                    Rule::prop_expr => {
                        let property = self.parse_expr(op.into_inner().next().unwrap().into_inner())?;
                        Ok(Expr::Prop {
                            location: Box::new(lhs),
                            property: Box::new(property),
                        })
                    }
                    Rule::index_single => {
                        let index = self.parse_expr(op.into_inner().next().unwrap().into_inner())?;
                        Ok(Expr::Index(Box::new(lhs), Box::new(index)))
                    }
                    Rule::index_range => {
                        let mut parts = op.into_inner();
                        let from = self.parse_expr(parts.next().unwrap().into_inner())?;
                        let to = self.parse_expr(parts.next().unwrap().into_inner())?;
                        Ok(Expr::Range {
                            base: Box::new(lhs),
                            from: Box::new(from),
                            to: Box::new(to),
                        })
                    }
                    Rule::cond_expr => {
                        let mut parts = op.into_inner();
                        let consequence = self.parse_expr(parts.next().unwrap().into_inner())?;
                        let alternative = self.parse_expr(parts.next().unwrap().into_inner())?;
                        Ok(Expr::Cond {
                            condition: Box::new(lhs),
                            consequence: Box::new(consequence),
                            alternative: Box::new(alternative),
                        })
                    }
                    Rule::assign => {
                        let right = self.parse_expr(op.into_inner().next().unwrap().into_inner())?;
                        match lvalue_root(&lhs) {
                            None => return Err(CompileError::InvalidAssignment),
                            Some(Expr::Id(name)) if self.names.borrow().is_global(*name) => {
                                let names = self.names.borrow();
                                let ident = names.name_of(name).unwrap_or_default();
                                return Err(CompileError::AssignToConst(ident.to_string()));
                            }
                            Some(_) => {}
                        }
                        Ok(Expr::Assign {
                            left: Box::new(lhs),
                            right: Box::new(right),
                        })
                    }
                    _ => unreachable!("unexpected postfix: {:?}", op.as_rule()),
                }
            })
            .parse(pairs)
    }

    fn parse_statements(&self, pairs: Pairs<Rule>) -> Result<Vec<Stmt>, CompileError> {
        pairs.map(|pair| self.parse_statement(pair)).collect()
    }

    fn parse_statement(&self, pair: Pair<Rule>) -> Result<Stmt, CompileError> {
        let line_col = pair.line_col();
        let node = match pair.as_rule() {
            Rule::expr_statement => {
                let expr = pair.into_inner().next().unwrap();
                StmtNode::Expr(self.parse_expr(expr.into_inner())?)
            }
            Rule::return_statement => {
                let expr = significant(pair)
                    .next()
                    .map(|e| self.parse_expr(e.into_inner()))
                    .transpose()?;
                StmtNode::Return(expr)
            }
            Rule::break_statement => StmtNode::Break,
            Rule::continue_statement => StmtNode::Continue,
            Rule::let_statement => {
                let mut parts = significant(pair);
                let id = self.bind_variable(parts.next().unwrap().as_str())?;
                let right = self.parse_expr(parts.next().unwrap().into_inner())?;
                StmtNode::Expr(Expr::Assign {
                    left: Box::new(Expr::Id(id)),
                    right: Box::new(right),
                })
            }
            Rule::if_statement => {
                let mut parts = significant(pair);
                let condition = self.parse_expr(parts.next().unwrap().into_inner())?;
                let statements = self.parse_statements(parts.next().unwrap().into_inner())?;
                let mut arms = vec![CondArm {
                    condition,
                    statements,
                }];
                let mut otherwise = None;
                for clause in parts {
                    match clause.as_rule() {
                        Rule::elseif_clause => {
                            let mut clause = significant(clause);
                            let condition = self.parse_expr(clause.next().unwrap().into_inner())?;
                            let statements =
                                self.parse_statements(clause.next().unwrap().into_inner())?;
                            arms.push(CondArm {
                                condition,
                                statements,
                            });
                        }
                        Rule::else_clause => {
                            let statements = significant(clause).next().unwrap();
                            otherwise = Some(self.parse_statements(statements.into_inner())?);
                        }
                        _ => unreachable!("unexpected if clause: {:?}", clause.as_rule()),
                    }
                }
                StmtNode::Cond { arms, otherwise }
            }
            Rule::while_statement => {
                let mut parts = significant(pair);
                let condition = self.parse_expr(parts.next().unwrap().into_inner())?;
                let body = self.parse_statements(parts.next().unwrap().into_inner())?;
                StmtNode::While { condition, body }
            }
            Rule::for_in_statement => {
                let mut parts = significant(pair);
                let id = self.bind_variable(parts.next().unwrap().as_str())?;
                let expr = self.parse_expr(parts.next().unwrap().into_inner())?;
                let body = self.parse_statements(parts.next().unwrap().into_inner())?;
                let (list_register, position_register) = {
                    let mut names = self.names.borrow_mut();
                    (names.declare_register(), names.declare_register())
                };
                StmtNode::ForList {
                    id,
                    list_register,
                    position_register,
                    expr,
                    body,
                }
            }
            Rule::for_range_statement => {
                let mut parts = significant(pair);
                let id = self.bind_variable(parts.next().unwrap().as_str())?;
                let from = self.parse_expr(parts.next().unwrap().into_inner())?;
                let to = self.parse_expr(parts.next().unwrap().into_inner())?;
                let body = self.parse_statements(parts.next().unwrap().into_inner())?;
                let (position_register, end_register) = {
                    let mut names = self.names.borrow_mut();
                    (names.declare_register(), names.declare_register())
                };
                StmtNode::ForRange {
                    id,
                    position_register,
                    end_register,
                    from,
                    to,
                    body,
                }
            }
            Rule::try_statement => {
                let mut parts = significant(pair);
                let body = self.parse_statements(parts.next().unwrap().into_inner())?;
                let mut excepts = vec![];
                for clause in parts {
                    excepts.push(self.parse_except_clause(clause)?);
                }
                StmtNode::TryExcept { body, excepts }
            }
            _ => unreachable!("unexpected statement: {:?}", pair.as_rule()),
        };
        Ok(Stmt::new(node, line_col))
    }

    fn parse_except_clause(&self, clause: Pair<Rule>) -> Result<ExceptArm, CompileError> {
        let mut id = None;
        let mut codes = CatchCodes::Any;
        let mut statements = vec![];
        for part in significant(clause) {
            match part.as_rule() {
                Rule::ident => id = Some(self.bind_variable(part.as_str())?),
                Rule::except_codes => {
                    let inner = part.into_inner().next().unwrap();
                    codes = match inner.as_rule() {
                        Rule::anycode => CatchCodes::Any,
                        _ => CatchCodes::Codes(self.parse_exprlist(inner.into_inner())?),
                    };
                }
                Rule::statements => statements = self.parse_statements(part.into_inner())?,
                _ => unreachable!("unexpected except clause part: {:?}", part.as_rule()),
            }
        }
        Ok(ExceptArm {
            id,
            codes,
            statements,
        })
    }

    fn transform_program(self, mut pairs: Pairs<Rule>) -> Result<Parse, CompileError> {
        let program = pairs.next().unwrap();
        let mut stmts = vec![];
        for pair in program.into_inner() {
            if pair.as_rule() == Rule::statements {
                stmts = self.parse_statements(pair.into_inner())?;
            }
        }
        Ok(Parse {
            stmts,
            names: self.names.into_inner(),
        })
    }
}

impl Default for TreeTransformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile from a program string, starting at the "program" rule.
pub fn parse_program(program_text: &str) -> Result<Parse, CompileError> {
    let pairs = match MethodParser::parse(Rule::program, program_text) {
        Ok(pairs) => pairs,
        Err(e) => {
            let ((line, column), end_line_col) = match e.line_col {
                LineColLocation::Pos(lc) => (lc, None),
                LineColLocation::Span(begin, end) => (begin, Some(end)),
            };
            return Err(CompileError::ParseError {
                line,
                column,
                context: e.line().to_string(),
                end_line_col,
                message: e.variant.message().to_string(),
            });
        }
    };
    TreeTransformer::new().transform_program(pairs)
}
