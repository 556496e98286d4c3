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

#[cfg(test)]
mod tests {
    use crate::builtins::BUILTINS;
    use crate::codegen::compile;
    use crate::labels::{Label, Offset};
    use crate::names::Name;
    use crate::opcode::Op::*;
    use pretty_assertions::assert_eq;
    use protocosm_common::model::CompileError;
    use protocosm_var::{Obj, v_obj, v_str};
    use test_case::test_case;

    fn label_position(program: &crate::Program, label: Label) -> Offset {
        program.jump_label(label).unwrap().position
    }

    #[test]
    fn test_simple_add_expr() {
        let binary = compile("1 + 2;").unwrap();
        assert_eq!(
            binary.main_vector(),
            &[ImmInt(1), ImmInt(2), Add, Pop, Done]
        );
    }

    #[test]
    fn test_var_assign_expr() {
        let binary = compile("a = 1 + 2;").unwrap();
        let a = binary.find_var("a").unwrap();
        assert_eq!(
            binary.main_vector(),
            &[ImmInt(1), ImmInt(2), Add, Put(a), Pop, Done],
        );
    }

    #[test]
    fn test_if_elseif_else() {
        let binary = compile("if (1) return 5; elseif (2) return 3; else return 6; endif").unwrap();
        assert_eq!(
            binary.main_vector(),
            &[
                ImmInt(1),
                If(Label(1)),
                ImmInt(5),
                Return,
                Jump { label: Label(0) },
                ImmInt(2),
                Eif(Label(2)),
                ImmInt(3),
                Return,
                Jump { label: Label(0) },
                ImmInt(6),
                Return,
                Done
            ]
        );
        assert_eq!(label_position(&binary, Label(0)), Offset(12));
        assert_eq!(label_position(&binary, Label(1)), Offset(5));
        assert_eq!(label_position(&binary, Label(2)), Offset(10));
    }

    #[test]
    fn test_while_with_break() {
        let binary = compile("while (1) break; endwhile").unwrap();
        assert_eq!(
            binary.main_vector(),
            &[
                ImmInt(1),
                While(Label(1)),
                Jump { label: Label(1) },
                Jump { label: Label(0) },
                Done
            ]
        );
        assert_eq!(label_position(&binary, Label(0)), Offset(0));
        assert_eq!(label_position(&binary, Label(1)), Offset(4));
    }

    #[test]
    fn test_for_list_uses_registers() {
        let binary = compile("for x in ({1, 2}) continue; endfor").unwrap();
        let x = binary.find_var("x").unwrap();
        let list = binary.find_var("*r0*").unwrap();
        let position = binary.find_var("*r1*").unwrap();
        assert_eq!(
            binary.main_vector(),
            &[
                ImmInt(1),
                MakeSingletonList,
                ImmInt(2),
                ListAddTail,
                Put(list),
                Pop,
                ImmInt(0),
                Put(position),
                Pop,
                ForList {
                    id: x,
                    list,
                    position,
                    end_label: Label(1)
                },
                Jump { label: Label(0) },
                Jump { label: Label(0) },
                Done
            ]
        );
        assert_eq!(label_position(&binary, Label(0)), Offset(9));
        assert_eq!(label_position(&binary, Label(1)), Offset(12));
    }

    #[test]
    fn test_break_inside_try_unwinds_handlers() {
        let binary =
            compile("for i in [1..3] try break; except (ANY) endtry endfor").unwrap();
        assert!(
            binary
                .main_vector()
                .iter()
                .any(|op| matches!(op, Exit { handlers: 1, .. }))
        );
    }

    #[test]
    fn test_try_except_layout() {
        let binary = compile("try return 1; except e (E_PERM) return e; endtry").unwrap();
        let e = binary.find_var("e").unwrap();
        let perm = Label(0);
        assert_eq!(binary.literal(perm), Some(&v_str("E_PERM")));
        assert_eq!(
            binary.main_vector(),
            &[
                TryExcept { handler: Label(0) },
                ImmInt(1),
                Return,
                EndExcept(Label(1)),
                Imm(perm),
                MakeSingletonList,
                ExceptMatch(Label(2)),
                Put(e),
                Pop,
                Push(e),
                Return,
                Jump { label: Label(1) },
                Reraise,
                Done
            ]
        );
        assert_eq!(label_position(&binary, Label(0)), Offset(4));
        assert_eq!(label_position(&binary, Label(1)), Offset(13));
        assert_eq!(label_position(&binary, Label(2)), Offset(12));
    }

    #[test]
    fn test_indexed_property_assignment() {
        let binary = compile("this.items[2] = #5;").unwrap();
        let this = Name(0);
        let items = Label(0);
        let five = Label(1);
        assert_eq!(binary.literal(items), Some(&v_str("items")));
        assert_eq!(binary.literal(five), Some(&v_obj(Obj::mk_id(5))));
        assert_eq!(
            binary.main_vector(),
            &[
                Push(this),
                Imm(items),
                PushGetProp,
                ImmInt(2),
                Imm(five),
                PutTemp,
                IndexSet,
                PutProp,
                Pop,
                PushTemp,
                Pop,
                Done
            ]
        );
    }

    #[test]
    fn test_registry_and_alias_calls() {
        let binary = compile("return registry:create($root):describe();").unwrap();
        let create = Label(0);
        let root = Label(1);
        let describe = Label(2);
        assert_eq!(
            binary.main_vector(),
            &[
                Imm(create),
                PushAlias(root),
                MakeSingletonList,
                CallRegistry,
                Imm(describe),
                ImmEmptyList,
                CallMethod,
                Return,
                Done
            ]
        );
    }

    #[test]
    fn test_builtin_call() {
        let binary = compile("return length({});").unwrap();
        let length = BUILTINS.find_builtin("length").unwrap();
        assert_eq!(
            binary.main_vector(),
            &[
                ImmEmptyList,
                MakeSingletonList,
                FuncCall { id: length },
                Return,
                Done
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let binary = compile("a = 1;\n\nb = 2;\nreturn a + b;").unwrap();
        assert_eq!(binary.line_num_for_position(0), Some(1));
        assert_eq!(binary.line_num_for_position(3), Some(3));
        assert_eq!(binary.line_num_for_position(6), Some(4));
    }

    #[test_case("registry;", CompileError::RegistryMisuse; "bare registry")]
    #[test_case("registry.x = 1;", CompileError::RegistryMisuse; "registry property")]
    #[test_case("break;", CompileError::OutsideLoop("break".to_string()); "break outside loop")]
    #[test_case("continue;", CompileError::OutsideLoop("continue".to_string()); "continue outside loop")]
    #[test_case("{1}[1..1] = 2;", CompileError::InvalidAssignment; "range assignment")]
    fn test_compile_errors(source: &str, expected: CompileError) {
        assert_eq!(compile(source).unwrap_err(), expected);
    }
}
