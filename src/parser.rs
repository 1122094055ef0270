use thiserror::Error;

use crate::ast::{BinaryOp, ElseIfClause, Expression, Statement, UnaryOp};
use crate::lexer::tokenize;
use crate::token::{Keyword, Op, Punct, Token, TokenKind};

/// Raised when a construct is missing a required keyword or operator.
/// Everything else in the grammar is handled tolerantly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Expected '{expected}' but got '{found}' at line {line}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub line: usize,
}

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        // Comments are lexed for editor tooling but play no role in the
        // grammar, so they are stripped up front.
        let tokens = tokens
            .into_iter()
            .filter(|token| !matches!(token.kind, TokenKind::Comment(_)))
            .collect();
        Self { tokens, pos: 0 }
    }

    /// Parse at module level: class wrappers and `Sub`/`Function`
    /// declaration lines are skipped so a whole exported module can be run
    /// as one flat statement sequence.
    pub fn parse(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        self.skip_newlines();

        while !self.at_end() {
            if self.peek_is(Keyword::Public) || self.peek_is(Keyword::Private) {
                self.advance();
                if self.peek_is(Keyword::Class) {
                    self.skip_class_wrapper();
                    continue;
                }
                if self.peek_is(Keyword::Sub) || self.peek_is(Keyword::Function) {
                    self.skip_sub_declaration();
                    continue;
                }
            }
            if self.peek_is(Keyword::Class) {
                self.skip_class_wrapper();
                continue;
            }
            if self.peek_is(Keyword::Sub) || self.peek_is(Keyword::Function) {
                self.skip_sub_declaration();
                continue;
            }
            if self.peek_is(Keyword::End) {
                self.advance();
                self.skip_newlines();
                continue;
            }
            if let Some(statement) = self.parse_statement()? {
                statements.push(statement);
            }
            self.skip_newlines();
        }
        Ok(statements)
    }

    /// Parse an event-handler body: statements up to `End Sub` /
    /// `End Function` or end of input.
    pub fn parse_sub_body(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_end()
            && !(self.peek_is(Keyword::End) && self.peek_ahead_is(1, Keyword::Sub))
            && !(self.peek_is(Keyword::End) && self.peek_ahead_is(1, Keyword::Function))
        {
            if let Some(statement) = self.parse_statement()? {
                statements.push(statement);
            }
            self.skip_newlines();
        }
        Ok(statements)
    }

    fn skip_class_wrapper(&mut self) {
        while !self.at_end()
            && !(self.peek_is(Keyword::End) && self.peek_ahead_is(1, Keyword::Class))
        {
            self.advance();
        }
        if !self.at_end() {
            self.advance();
            self.advance();
        }
        self.skip_newlines();
    }

    fn skip_sub_declaration(&mut self) {
        while !self.at_end() && !matches!(self.peek().kind, TokenKind::Newline) {
            self.advance();
        }
        self.skip_newlines();
    }

    fn parse_statement(&mut self) -> Result<Option<Statement>, ParseError> {
        self.skip_newlines();
        if self.at_end() {
            return Ok(None);
        }

        match self.peek().kind {
            TokenKind::Keyword(Keyword::Dim) => Ok(Some(self.parse_dim()?)),
            TokenKind::Keyword(Keyword::If) => Ok(Some(self.parse_if()?)),
            TokenKind::Keyword(Keyword::For) => Ok(Some(self.parse_for()?)),
            TokenKind::Keyword(Keyword::While) => Ok(Some(self.parse_while()?)),
            TokenKind::Keyword(Keyword::Do) => Ok(Some(self.parse_do_loop()?)),
            TokenKind::Keyword(Keyword::Return) => Ok(Some(self.parse_return()?)),
            TokenKind::Keyword(Keyword::Exit) => Ok(Some(self.parse_exit())),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_dim(&mut self) -> Result<Statement, ParseError> {
        let line = self.peek().line;
        self.expect_keyword(Keyword::Dim)?;
        let name = self.advance().kind.text().to_string();
        let mut declared_type = "object".to_string();
        let mut initializer = None;

        if self.peek_is(Keyword::As) {
            self.advance();
            declared_type = self.advance().kind.text().to_string();
        }
        if self.peek_is_op(Op::Eq) {
            self.advance();
            initializer = Some(self.parse_expression());
        }

        Ok(Statement::Dim {
            name,
            declared_type,
            initializer,
            line,
        })
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let line = self.peek().line;
        self.expect_keyword(Keyword::If)?;
        let condition = self.parse_expression();
        self.expect_keyword(Keyword::Then)?;
        self.skip_newlines();

        let mut then_block = Vec::new();
        let mut else_if_clauses = Vec::new();
        let mut else_block = Vec::new();

        while !self.at_if_clause_end() {
            if let Some(statement) = self.parse_statement()? {
                then_block.push(statement);
            }
            self.skip_newlines();
        }

        while self.peek_is(Keyword::ElseIf) {
            self.advance();
            let condition = self.parse_expression();
            self.expect_keyword(Keyword::Then)?;
            self.skip_newlines();
            let mut block = Vec::new();
            while !self.at_if_clause_end() {
                if let Some(statement) = self.parse_statement()? {
                    block.push(statement);
                }
                self.skip_newlines();
            }
            else_if_clauses.push(ElseIfClause { condition, block });
        }

        if self.peek_is(Keyword::Else) {
            self.advance();
            self.skip_newlines();
            while !self.at_end()
                && !(self.peek_is(Keyword::End) && self.peek_ahead_is(1, Keyword::If))
            {
                if let Some(statement) = self.parse_statement()? {
                    else_block.push(statement);
                }
                self.skip_newlines();
            }
        }

        // Tolerate a missing or bare `End`; a well-formed script has `End If`.
        if self.peek_is(Keyword::End) {
            self.advance();
            if self.peek_is(Keyword::If) {
                self.advance();
            }
        }

        Ok(Statement::If {
            condition,
            then_block,
            else_if_clauses,
            else_block,
            line,
        })
    }

    fn at_if_clause_end(&self) -> bool {
        self.at_end()
            || self.peek_is(Keyword::Else)
            || self.peek_is(Keyword::ElseIf)
            || (self.peek_is(Keyword::End) && self.peek_ahead_is(1, Keyword::If))
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        let line = self.peek().line;
        self.expect_keyword(Keyword::For)?;
        let variable = self.advance().kind.text().to_string();
        self.expect_operator(Op::Eq)?;
        let start = self.parse_expression();
        self.expect_keyword(Keyword::To)?;
        let end = self.parse_expression();
        let mut step = None;
        if self.peek_is(Keyword::Step) {
            self.advance();
            step = Some(self.parse_expression());
        }
        self.skip_newlines();

        let mut body = Vec::new();
        while !self.at_end() && !self.peek_is(Keyword::Next) {
            if let Some(statement) = self.parse_statement()? {
                body.push(statement);
            }
            self.skip_newlines();
        }
        if self.peek_is(Keyword::Next) {
            self.advance();
            // `Next i` may repeat the counter name.
            if matches!(self.peek().kind, TokenKind::Identifier(_)) {
                self.advance();
            }
        }

        Ok(Statement::For {
            variable,
            start,
            end,
            step,
            body,
            line,
        })
    }

    fn parse_while(&mut self) -> Result<Statement, ParseError> {
        let line = self.peek().line;
        self.expect_keyword(Keyword::While)?;
        let condition = self.parse_expression();
        self.skip_newlines();

        let mut body = Vec::new();
        while !self.at_end() && !self.peek_is(Keyword::Wend) {
            if let Some(statement) = self.parse_statement()? {
                body.push(statement);
            }
            self.skip_newlines();
        }
        if self.peek_is(Keyword::Wend) {
            self.advance();
        }

        Ok(Statement::While {
            condition,
            body,
            line,
        })
    }

    fn parse_do_loop(&mut self) -> Result<Statement, ParseError> {
        let line = self.peek().line;
        self.expect_keyword(Keyword::Do)?;
        self.skip_newlines();

        let mut body = Vec::new();
        while !self.at_end() && !self.peek_is(Keyword::Loop) {
            if let Some(statement) = self.parse_statement()? {
                body.push(statement);
            }
            self.skip_newlines();
        }

        let mut condition = None;
        if self.peek_is(Keyword::Loop) {
            self.advance();
            if self.peek_is(Keyword::Until) || self.peek_is(Keyword::While) {
                self.advance();
                condition = Some(self.parse_expression());
            }
        }

        Ok(Statement::DoLoop {
            body,
            condition,
            line,
        })
    }

    fn parse_return(&mut self) -> Result<Statement, ParseError> {
        let line = self.peek().line;
        self.expect_keyword(Keyword::Return)?;
        let mut value = None;
        if !self.at_end() && !matches!(self.peek().kind, TokenKind::Newline) {
            value = Some(self.parse_expression());
        }
        Ok(Statement::Return { value, line })
    }

    fn parse_exit(&mut self) -> Statement {
        let line = self.peek().line;
        self.advance();
        let what = self.advance().kind.text().to_string();
        Statement::Exit { what, line }
    }

    /// Anything that does not start with a statement keyword: first try
    /// `<postfix> = <expr>` as an assignment, then fall back to a full
    /// expression, reinterpreting calls (with or without parentheses) as
    /// call statements. Other expressions are discarded.
    fn parse_expression_statement(&mut self) -> Result<Option<Statement>, ParseError> {
        self.skip_newlines();
        if self.at_end() {
            return Ok(None);
        }
        let line = self.peek().line;

        let saved_pos = self.pos;
        let lhs = self.parse_postfix();
        if matches!(lhs, Expression::Identifier(_) | Expression::Member { .. })
            && self.peek_is_op(Op::Eq)
        {
            self.advance();
            let value = self.parse_expression();
            return Ok(Some(Statement::Assignment {
                target: lhs,
                value,
                line,
            }));
        }

        self.pos = saved_pos;
        match self.parse_expression() {
            Expression::Call { target, args } => Ok(Some(Statement::Call {
                target: *target,
                args,
                line,
            })),
            expr @ (Expression::Identifier(_) | Expression::Member { .. })
                if !self.at_end()
                    && !matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) =>
            {
                // Classic parenless call syntax: `MsgBox "hello", "title"`.
                let mut args = vec![self.parse_expression()];
                while self.peek_is_punct(Punct::Comma) {
                    self.advance();
                    args.push(self.parse_expression());
                }
                Ok(Some(Statement::Call {
                    target: expr,
                    args,
                    line,
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn parse_expression(&mut self) -> Expression {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Expression {
        let mut left = self.parse_and();
        while self.peek_is(Keyword::Or) {
            self.advance();
            let right = self.parse_and();
            left = binary(BinaryOp::Or, left, right);
        }
        left
    }

    fn parse_and(&mut self) -> Expression {
        let mut left = self.parse_not();
        while self.peek_is(Keyword::And) {
            self.advance();
            let right = self.parse_not();
            left = binary(BinaryOp::And, left, right);
        }
        left
    }

    fn parse_not(&mut self) -> Expression {
        if self.peek_is(Keyword::Not) {
            self.advance();
            let operand = self.parse_comparison();
            return Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            };
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Expression {
        let mut left = self.parse_concat();
        loop {
            let op = match self.peek().kind {
                TokenKind::Operator(Op::Eq) => BinaryOp::Eq,
                TokenKind::Operator(Op::Ne) => BinaryOp::Ne,
                TokenKind::Operator(Op::Lt) => BinaryOp::Lt,
                TokenKind::Operator(Op::Gt) => BinaryOp::Gt,
                TokenKind::Operator(Op::Le) => BinaryOp::Le,
                TokenKind::Operator(Op::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_concat();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_concat(&mut self) -> Expression {
        let mut left = self.parse_add_sub();
        while self.peek_is_op(Op::Amp) {
            self.advance();
            let right = self.parse_add_sub();
            left = binary(BinaryOp::Concat, left, right);
        }
        left
    }

    fn parse_add_sub(&mut self) -> Expression {
        let mut left = self.parse_mul_div();
        loop {
            let op = match self.peek().kind {
                TokenKind::Operator(Op::Plus) => BinaryOp::Add,
                TokenKind::Operator(Op::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_mul_div();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_mul_div(&mut self) -> Expression {
        let mut left = self.parse_power();
        loop {
            let op = match self.peek().kind {
                TokenKind::Operator(Op::Star) => BinaryOp::Mul,
                TokenKind::Operator(Op::Slash) => BinaryOp::Div,
                TokenKind::Operator(Op::Backslash) => BinaryOp::IntDiv,
                TokenKind::Keyword(Keyword::Mod) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_power();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_power(&mut self) -> Expression {
        let mut left = self.parse_unary();
        while self.peek_is_op(Op::Caret) {
            self.advance();
            let right = self.parse_unary();
            left = binary(BinaryOp::Pow, left, right);
        }
        left
    }

    fn parse_unary(&mut self) -> Expression {
        if self.peek_is_op(Op::Minus) {
            self.advance();
            let operand = self.parse_postfix();
            return Expression::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            };
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expression {
        let mut expr = self.parse_primary();

        loop {
            if self.peek_is_punct(Punct::Dot) {
                self.advance();
                let property = self.advance().kind.text().to_string();
                expr = Expression::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.peek_is_punct(Punct::LParen) {
                self.advance();
                let mut args = Vec::new();
                if !self.peek_is_punct(Punct::RParen) {
                    args.push(self.parse_expression());
                    while self.peek_is_punct(Punct::Comma) {
                        self.advance();
                        args.push(self.parse_expression());
                    }
                }
                if self.peek_is_punct(Punct::RParen) {
                    self.advance();
                }
                expr = Expression::Call {
                    target: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }

        expr
    }

    fn parse_primary(&mut self) -> Expression {
        let token = self.peek();
        match token.kind {
            TokenKind::Number(text) => {
                self.advance();
                Expression::Number(text.parse().unwrap_or(0.0))
            }
            TokenKind::Str(text) => {
                self.advance();
                Expression::Str(text.to_string())
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Expression::Bool(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Expression::Bool(false)
            }
            TokenKind::Keyword(Keyword::Nothing) => {
                self.advance();
                Expression::Nothing
            }
            TokenKind::Keyword(Keyword::Me) => {
                self.advance();
                Expression::Identifier("Me".to_string())
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance();
                let type_name = self.advance().kind.text().to_string();
                // Constructor argument lists are discarded; dispatch happens
                // later by type name.
                if self.peek_is_punct(Punct::LParen) {
                    self.advance();
                    if self.peek_is_punct(Punct::RParen) {
                        self.advance();
                    }
                }
                Expression::Call {
                    target: Box::new(Expression::Identifier(type_name)),
                    args: Vec::new(),
                }
            }
            TokenKind::Punct(Punct::LParen) => {
                self.advance();
                let expr = self.parse_expression();
                if self.peek_is_punct(Punct::RParen) {
                    self.advance();
                }
                expr
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Expression::Identifier(name.to_string())
            }
            _ => {
                // Swallow the stray token so parsing always makes progress.
                self.advance();
                Expression::Str(String::new())
            }
        }
    }

    fn peek(&self) -> Token<'a> {
        self.tokens
            .get(self.pos)
            .copied()
            .unwrap_or(Token::new(TokenKind::Eof, 0, 0))
    }

    fn peek_ahead(&self, offset: usize) -> Token<'a> {
        self.tokens
            .get(self.pos + offset)
            .copied()
            .unwrap_or(Token::new(TokenKind::Eof, 0, 0))
    }

    fn peek_is(&self, keyword: Keyword) -> bool {
        matches!(self.peek().kind, TokenKind::Keyword(k) if k == keyword)
    }

    fn peek_ahead_is(&self, offset: usize, keyword: Keyword) -> bool {
        matches!(self.peek_ahead(offset).kind, TokenKind::Keyword(k) if k == keyword)
    }

    fn peek_is_op(&self, op: Op) -> bool {
        matches!(self.peek().kind, TokenKind::Operator(o) if o == op)
    }

    fn peek_is_punct(&self, punct: Punct) -> bool {
        matches!(self.peek().kind, TokenKind::Punct(p) if p == punct)
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len() || matches!(self.peek().kind, TokenKind::Eof)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token<'a>, ParseError> {
        if self.peek_is(keyword) {
            Ok(self.advance())
        } else {
            Err(self.error(keyword.as_str()))
        }
    }

    fn expect_operator(&mut self, op: Op) -> Result<Token<'a>, ParseError> {
        if self.peek_is_op(op) {
            Ok(self.advance())
        } else {
            Err(self.error(op.as_str()))
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError {
            expected: expected.to_string(),
            found: token.kind.text().to_string(),
            line: token.line,
        }
    }
}

fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Tokenize and parse one event-handler body.
pub fn parse_handler_code(source: &str) -> Result<Vec<Statement>, ParseError> {
    Parser::new(tokenize(source)).parse_sub_body()
}

/// Tokenize and parse a whole module.
pub fn parse_module(source: &str) -> Result<Vec<Statement>, ParseError> {
    Parser::new(tokenize(source)).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn ident(name: &str) -> Expression {
        Expression::Identifier(name.to_string())
    }

    fn num(value: f64) -> Expression {
        Expression::Number(value)
    }

    #[test]
    fn parses_dim_with_type_and_initializer() {
        let block = parse_handler_code("Dim count As Integer = 3").expect("parse failed");
        assert_eq!(
            block,
            vec![Statement::Dim {
                name: "count".to_string(),
                declared_type: "integer".to_string(),
                initializer: Some(num(3.0)),
                line: 1,
            }]
        );
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let block = parse_handler_code("x = 2 + 3 * 4").expect("parse failed");
        assert_eq!(
            block,
            vec![Statement::Assignment {
                target: ident("x"),
                value: Expression::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(num(2.0)),
                    right: Box::new(Expression::Binary {
                        op: BinaryOp::Mul,
                        left: Box::new(num(3.0)),
                        right: Box::new(num(4.0)),
                    }),
                },
                line: 1,
            }]
        );
    }

    #[test]
    fn comparison_applies_after_concatenation() {
        let block = parse_handler_code(r#"ok = "a" & "b" = "ab""#).expect("parse failed");
        let Statement::Assignment { value, .. } = &block[0] else {
            panic!("expected assignment, got {block:?}");
        };
        let Expression::Binary { op, left, .. } = value else {
            panic!("expected binary, got {value:?}");
        };
        assert_eq!(*op, BinaryOp::Eq);
        assert!(matches!(
            **left,
            Expression::Binary {
                op: BinaryOp::Concat,
                ..
            }
        ));
    }

    #[test]
    fn member_assignment_targets_parse_as_lvalues() {
        let block = parse_handler_code(r#"Label1.Text = "done""#).expect("parse failed");
        assert_eq!(
            block,
            vec![Statement::Assignment {
                target: Expression::Member {
                    object: Box::new(ident("Label1")),
                    property: "Text".to_string(),
                },
                value: Expression::Str("done".to_string()),
                line: 1,
            }]
        );
    }

    #[test]
    fn parenless_calls_collect_comma_separated_arguments() {
        let block = parse_handler_code(r#"MsgBox "hi", "there""#).expect("parse failed");
        assert_eq!(
            block,
            vec![Statement::Call {
                target: ident("MsgBox"),
                args: vec![
                    Expression::Str("hi".to_string()),
                    Expression::Str("there".to_string()),
                ],
                line: 1,
            }]
        );
    }

    #[test]
    fn call_expressions_become_call_statements() {
        let block = parse_handler_code(r#"Console.WriteLine("x")"#).expect("parse failed");
        assert_eq!(
            block,
            vec![Statement::Call {
                target: Expression::Member {
                    object: Box::new(ident("Console")),
                    property: "WriteLine".to_string(),
                },
                args: vec![Expression::Str("x".to_string())],
                line: 1,
            }]
        );
    }

    #[test]
    fn parses_if_elseif_else_chain() {
        let input = indoc! {r#"
            If x > 10 Then
                y = 1
            ElseIf x > 5 Then
                y = 2
            Else
                y = 3
            End If
        "#};
        let block = parse_handler_code(input).expect("parse failed");
        let Statement::If {
            then_block,
            else_if_clauses,
            else_block,
            ..
        } = &block[0]
        else {
            panic!("expected if, got {block:?}");
        };
        assert_eq!(then_block.len(), 1);
        assert_eq!(else_if_clauses.len(), 1);
        assert_eq!(else_block.len(), 1);
    }

    #[test]
    fn parses_for_with_step_and_named_next() {
        let input = indoc! {r#"
            For i = 10 To 1 Step -1
                total = total + i
            Next i
        "#};
        let block = parse_handler_code(input).expect("parse failed");
        let Statement::For {
            variable, step, body, ..
        } = &block[0]
        else {
            panic!("expected for, got {block:?}");
        };
        assert_eq!(variable, "i");
        assert!(matches!(
            step,
            Some(Expression::Unary {
                op: UnaryOp::Neg,
                ..
            })
        ));
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn parses_do_loop_with_trailing_condition() {
        let input = indoc! {r#"
            Do
                n = n + 1
            Loop Until n >= 3
        "#};
        let block = parse_handler_code(input).expect("parse failed");
        let Statement::DoLoop { body, condition, .. } = &block[0] else {
            panic!("expected do-loop, got {block:?}");
        };
        assert_eq!(body.len(), 1);
        assert!(condition.is_some());
    }

    #[test]
    fn new_expression_discards_constructor_arguments() {
        let block = parse_handler_code("conn = New SqlConnection()").expect("parse failed");
        assert_eq!(
            block,
            vec![Statement::Assignment {
                target: ident("conn"),
                value: Expression::Call {
                    target: Box::new(ident("SqlConnection")),
                    args: vec![],
                },
                line: 1,
            }]
        );
    }

    #[test]
    fn module_parse_skips_sub_wrappers() {
        let input = indoc! {r#"
            Public Sub Button1_Click()
                x = 1
            End Sub

            Private Sub Button2_Click()
                y = 2
            End Sub
        "#};
        let block = parse_module(input).expect("parse failed");
        assert_eq!(block.len(), 2);
        assert!(matches!(block[0], Statement::Assignment { .. }));
        assert!(matches!(block[1], Statement::Assignment { .. }));
    }

    #[test]
    fn missing_then_is_a_parse_error() {
        let error = parse_handler_code("If x > 1\ny = 2\nEnd If").expect_err("expected error");
        assert_eq!(error.expected, "then");
        assert_eq!(error.line, 1);
    }

    #[test]
    fn not_binds_below_comparison() {
        let block = parse_handler_code("ok = Not a > b").expect("parse failed");
        let Statement::Assignment { value, .. } = &block[0] else {
            panic!("expected assignment");
        };
        // `Not` negates the whole comparison on its right.
        assert!(matches!(
            value,
            Expression::Unary {
                op: UnaryOp::Not,
                ..
            }
        ));
    }

    #[test]
    fn bare_expression_statements_are_dropped() {
        let block = parse_handler_code("42\nx = 1").expect("parse failed");
        assert_eq!(block.len(), 1);
        assert!(matches!(block[0], Statement::Assignment { .. }));
    }
}
