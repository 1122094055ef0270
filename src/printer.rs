use std::fmt::Write;

use crate::ast::{BinaryOp, Expression, Statement, UnaryOp};
use crate::runtime::value::display_number;

/// Render a statement block back to source text. The grammar has no
/// significant formatting beyond whitespace, so parsing the printed text
/// again yields a structurally identical AST.
pub fn print_block(block: &[Statement]) -> String {
    let mut out = String::new();
    write_block(&mut out, block, 0);
    out
}

fn write_block(out: &mut String, block: &[Statement], indent: usize) {
    for statement in block {
        write_statement(out, statement, indent);
    }
}

fn write_statement(out: &mut String, statement: &Statement, indent: usize) {
    let pad = "    ".repeat(indent);
    match statement {
        Statement::Dim {
            name,
            declared_type,
            initializer,
            ..
        } => {
            let _ = write!(out, "{pad}Dim {name} As {declared_type}");
            if let Some(init) = initializer {
                let _ = write!(out, " = {}", print_expression(init));
            }
            out.push('\n');
        }
        Statement::Assignment { target, value, .. } => {
            let _ = writeln!(
                out,
                "{pad}{} = {}",
                print_expression(target),
                print_expression(value)
            );
        }
        Statement::Call { target, args, .. } => {
            let rendered: Vec<String> = args.iter().map(print_expression).collect();
            let _ = writeln!(
                out,
                "{pad}{}({})",
                print_expression(target),
                rendered.join(", ")
            );
        }
        Statement::If {
            condition,
            then_block,
            else_if_clauses,
            else_block,
            ..
        } => {
            let _ = writeln!(out, "{pad}If {} Then", print_expression(condition));
            write_block(out, then_block, indent + 1);
            for clause in else_if_clauses {
                let _ = writeln!(out, "{pad}ElseIf {} Then", print_expression(&clause.condition));
                write_block(out, &clause.block, indent + 1);
            }
            if !else_block.is_empty() {
                let _ = writeln!(out, "{pad}Else");
                write_block(out, else_block, indent + 1);
            }
            let _ = writeln!(out, "{pad}End If");
        }
        Statement::For {
            variable,
            start,
            end,
            step,
            body,
            ..
        } => {
            let _ = write!(
                out,
                "{pad}For {variable} = {} To {}",
                print_expression(start),
                print_expression(end)
            );
            if let Some(step) = step {
                let _ = write!(out, " Step {}", print_expression(step));
            }
            out.push('\n');
            write_block(out, body, indent + 1);
            let _ = writeln!(out, "{pad}Next");
        }
        Statement::While {
            condition, body, ..
        } => {
            let _ = writeln!(out, "{pad}While {}", print_expression(condition));
            write_block(out, body, indent + 1);
            let _ = writeln!(out, "{pad}Wend");
        }
        Statement::DoLoop {
            body, condition, ..
        } => {
            let _ = writeln!(out, "{pad}Do");
            write_block(out, body, indent + 1);
            match condition {
                Some(condition) => {
                    let _ = writeln!(out, "{pad}Loop Until {}", print_expression(condition));
                }
                None => {
                    let _ = writeln!(out, "{pad}Loop");
                }
            }
        }
        Statement::Return { value, .. } => match value {
            Some(value) => {
                let _ = writeln!(out, "{pad}Return {}", print_expression(value));
            }
            None => {
                let _ = writeln!(out, "{pad}Return");
            }
        },
        Statement::Exit { what, .. } => {
            let _ = writeln!(out, "{pad}Exit {what}");
        }
    }
}

pub fn print_expression(expr: &Expression) -> String {
    match expr {
        Expression::Number(value) => display_number(*value),
        Expression::Str(value) => format!("\"{value}\""),
        Expression::Bool(true) => "True".to_string(),
        Expression::Bool(false) => "False".to_string(),
        Expression::Nothing => "Nothing".to_string(),
        Expression::Identifier(name) => name.clone(),
        Expression::Member { object, property } => {
            format!("{}.{property}", print_operand(object))
        }
        Expression::Index { object, index } => {
            format!("{}({})", print_operand(object), print_expression(index))
        }
        Expression::Call { target, args } => {
            let rendered: Vec<String> = args.iter().map(print_expression).collect();
            format!("{}({})", print_operand(target), rendered.join(", "))
        }
        Expression::Binary { op, left, right } => {
            format!(
                "{} {} {}",
                print_operand(left),
                binary_op_text(*op),
                print_operand(right)
            )
        }
        Expression::Unary { op, operand } => match op {
            UnaryOp::Neg => format!("-{}", print_operand(operand)),
            UnaryOp::Not => format!("Not {}", print_operand(operand)),
        },
    }
}

/// Operands of compound expressions are parenthesized whenever they are
/// compound themselves, which sidesteps precedence bookkeeping without
/// changing the parsed structure.
fn print_operand(expr: &Expression) -> String {
    match expr {
        Expression::Binary { .. } | Expression::Unary { .. } => {
            format!("({})", print_expression(expr))
        }
        _ => print_expression(expr),
    }
}

fn binary_op_text(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::IntDiv => "\\",
        BinaryOp::Mod => "Mod",
        BinaryOp::Pow => "^",
        BinaryOp::Concat => "&",
        BinaryOp::Eq => "=",
        BinaryOp::Ne => "<>",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::Le => "<=",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "And",
        BinaryOp::Or => "Or",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_handler_code;
    use indoc::indoc;

    fn assert_round_trips(source: &str) {
        let parsed = parse_handler_code(source).expect("initial parse failed");
        let printed = print_block(&parsed);
        let reparsed = parse_handler_code(&printed)
            .unwrap_or_else(|error| panic!("re-parse of {printed:?} failed: {error}"));
        assert_eq!(parsed, reparsed, "printed form was {printed:?}");
    }

    #[test]
    fn round_trips_declarations_and_assignments() {
        assert_round_trips(indoc! {r#"
            Dim total As Integer
            Dim name As String = "abc"
            Dim anything
            total = total + 1
            Label1.Text = name & "!"
        "#});
    }

    #[test]
    fn round_trips_control_flow() {
        assert_round_trips(indoc! {r#"
            If x > 10 Then
                y = 1
            ElseIf x > 5 Then
                y = 2
            Else
                y = 3
            End If
            For i = 1 To 5 Step 2
                total = total + i
            Next
            While total < 100
                total = total * 2
            Wend
            Do
                total = total - 1
            Loop Until total <= 0
        "#});
    }

    #[test]
    fn round_trips_calls_and_nested_expressions() {
        assert_round_trips(indoc! {r#"
            Console.WriteLine("total: " & total)
            MsgBox "hello", "title"
            result = (2 + 3) * -offset
            done = Not (a And b)
            Return result
            Exit sub
        "#});
    }
}
