use std::collections::HashMap;

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::lexer::{lex, Token};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("expected ')'")]
    UnmatchedParen,
    #[error("unexpected {0}, expression expected")]
    ExpectedExpression(String),
    #[error("expected keyword '{0}', found {1}")]
    ExpectedKeyword(&'static str, String),
    #[error("expected function name in prototype, found {0}")]
    ExpectedFunctionName(String),
    #[error("expected '(' in prototype, found {0}")]
    ExpectedOpenParen(String),
    #[error("expected ')' in prototype, found {0}")]
    ExpectedCloseParen(String),
    #[error("expected ')' or ',' in argument list, found {0}")]
    ExpectedArgDelimiter(String),
    #[error("duplicate parameter name '{0}' in prototype")]
    DuplicateParameter(String),
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
}

fn describe(token: Option<&Token>) -> String {
    match token {
        Some(tok) => tok.to_string(),
        None => "end of input".to_string(),
    }
}

pub type PartialParseResult = Result<Expression, ParserError>;

/// recursive descent for primary forms, precedence climbing for binary
/// operator chains
#[derive(Debug, Clone)]
pub struct Parser {
    pub operator_precedence: HashMap<String, u32>,
}

impl std::default::Default for Parser {
    fn default() -> Self {
        let mut operator_precedence = HashMap::new();
        operator_precedence.insert("<".to_string(), 10);
        operator_precedence.insert("+".to_string(), 20);
        operator_precedence.insert("-".to_string(), 20);
        operator_precedence.insert("*".to_string(), 40);
        Self {
            operator_precedence,
        }
    }
}

impl Parser {
    fn parse_number(&self, input: &mut Vec<Token>) -> PartialParseResult {
        match input.pop() {
            Some(Token::Number(num)) => Ok(Expression::Literal(num)),
            tok => Err(ParserError::ExpectedExpression(describe(tok.as_ref()))),
        }
    }

    /// a bare identifier is a variable reference; one followed by `(` starts
    /// a call argument list
    fn parse_identifier(&self, input: &mut Vec<Token>) -> PartialParseResult {
        let name = match input.pop() {
            Some(Token::Ident(name)) => name,
            tok => return Err(ParserError::ExpectedExpression(describe(tok.as_ref()))),
        };

        if input.last() != Some(&Token::OpenParen) {
            return Ok(Expression::Variable(name));
        }
        input.pop();

        let mut args = Vec::new();
        if input.last() != Some(&Token::CloseParen) {
            loop {
                args.push(self.parse_expr(input)?);
                match input.last() {
                    Some(Token::CloseParen) => break,
                    Some(Token::Comma) => {
                        input.pop();
                    }
                    tok => return Err(ParserError::ExpectedArgDelimiter(describe(tok))),
                }
            }
        }
        input.pop();

        Ok(Expression::Call(name, args))
    }

    fn parse_nested(&self, input: &mut Vec<Token>) -> PartialParseResult {
        input.pop();
        let res = self.parse_expr(input)?;
        if input.last() != Some(&Token::CloseParen) {
            return Err(ParserError::UnmatchedParen);
        }
        input.pop();
        Ok(res)
    }

    fn parse_primary(&self, input: &mut Vec<Token>) -> PartialParseResult {
        match input.last() {
            Some(Token::Number(_)) => self.parse_number(input),
            Some(Token::Ident(_)) => self.parse_identifier(input),
            Some(Token::OpenParen) => self.parse_nested(input),
            tok => Err(ParserError::ExpectedExpression(describe(tok))),
        }
    }

    /// precedence climbing: operators below `min_precedence` are left for the
    /// enclosing call; equal precedence chains combine left-associatively, and
    /// a tighter-binding follow-up operator pulls the right-hand side into a
    /// recursive parse at `precedence + 1`
    fn parse_rhs(
        &self,
        input: &mut Vec<Token>,
        min_precedence: u32,
        lhs: Expression,
    ) -> PartialParseResult {
        let mut result = lhs;

        loop {
            let (operator, precedence) = match input.last() {
                Some(Token::Operator(op)) => match self.operator_precedence.get(op) {
                    Some(pr) if *pr >= min_precedence => (op.clone(), *pr),
                    Some(_) => break,
                    None => return Err(ParserError::UnknownOperator(op.clone())),
                },
                _ => break,
            };
            input.pop();

            let mut rhs = self.parse_primary(input)?;

            if let Some(Token::Operator(op)) = input.last() {
                match self.operator_precedence.get(op) {
                    Some(next_precedence) if precedence < *next_precedence => {
                        rhs = self.parse_rhs(input, precedence + 1, rhs)?;
                    }
                    Some(_) => (),
                    None => return Err(ParserError::UnknownOperator(op.clone())),
                }
            }

            result = Expression::Binary(operator, Box::new(result), Box::new(rhs));
        }

        Ok(result)
    }

    fn parse_expr(&self, input: &mut Vec<Token>) -> PartialParseResult {
        let lhs = self.parse_primary(input)?;
        self.parse_rhs(input, 0, lhs)
    }

    /// `identifier '(' identifier* ')'` - parameters are space separated and
    /// must be pairwise distinct
    fn parse_prototype(&self, input: &mut Vec<Token>) -> Result<Prototype, ParserError> {
        let name = match input.pop() {
            Some(Token::Ident(name)) => name,
            tok => return Err(ParserError::ExpectedFunctionName(describe(tok.as_ref()))),
        };

        match input.pop() {
            Some(Token::OpenParen) => {}
            tok => return Err(ParserError::ExpectedOpenParen(describe(tok.as_ref()))),
        }

        let mut args: Vec<String> = Vec::new();
        while let Some(Token::Ident(_)) = input.last() {
            if let Some(Token::Ident(arg)) = input.pop() {
                if args.contains(&arg) {
                    return Err(ParserError::DuplicateParameter(arg));
                }
                args.push(arg);
            }
        }

        match input.pop() {
            Some(Token::CloseParen) => {}
            tok => return Err(ParserError::ExpectedCloseParen(describe(tok.as_ref()))),
        }

        Ok(Prototype { name, args })
    }

    pub fn parse_definition(&self, input: &mut Vec<Token>) -> Result<ASTNode, ParserError> {
        match input.pop() {
            Some(Token::Def) => {}
            tok => return Err(ParserError::ExpectedKeyword("def", describe(tok.as_ref()))),
        }
        let prototype = self.parse_prototype(input)?;
        let body = self.parse_expr(input)?;
        Ok(ASTNode::Function(Function { prototype, body }))
    }

    pub fn parse_extern(&self, input: &mut Vec<Token>) -> Result<ASTNode, ParserError> {
        match input.pop() {
            Some(Token::Extern) => {}
            tok => return Err(ParserError::ExpectedKeyword("extern", describe(tok.as_ref()))),
        }
        let prototype = self.parse_prototype(input)?;
        Ok(ASTNode::Extern(prototype))
    }

    /// a bare expression becomes the body of an anonymous wrapper function
    pub fn parse_toplevel_expr(&self, input: &mut Vec<Token>) -> Result<ASTNode, ParserError> {
        let body = self.parse_expr(input)?;
        let prototype = Prototype {
            name: String::new(),
            args: Vec::new(),
        };
        Ok(ASTNode::Function(Function { prototype, body }))
    }

    /// parse every top-level unit in the stream, stopping at the first error -
    /// callers that want to resynchronize use the per-unit entry points
    pub fn parse(&self, input: &mut Vec<Token>) -> Result<Vec<ASTNode>, ParserError> {
        let mut ast = Vec::new();

        while let Some(cur_tok) = input.last() {
            let node = match cur_tok {
                Token::Delimiter => {
                    input.pop();
                    continue;
                }
                Token::Def => self.parse_definition(input)?,
                Token::Extern => self.parse_extern(input)?,
                _ => self.parse_toplevel_expr(input)?,
            };
            ast.push(node);
        }

        Ok(ast)
    }

    pub fn parse_str(&self, input: &str) -> Result<Vec<ASTNode>, ParserError> {
        self.parse(&mut lex(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn binary(op: &str, lhs: Expression, rhs: Expression) -> Expression {
        Expression::Binary(op.to_string(), Box::new(lhs), Box::new(rhs))
    }

    #[test]
    fn parse_expr_works() {
        let input = "x + 1 * (2 - 3)";
        let parser = Parser::default();
        let mut tokens = lex(input);
        let res = parser.parse_expr(&mut tokens).unwrap();
        let target = binary(
            "+",
            Expression::Variable("x".to_string()),
            binary(
                "*",
                Expression::Literal(1.0),
                binary("-", Expression::Literal(2.0), Expression::Literal(3.0)),
            ),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn multiplication_binds_tighter() {
        let parser = Parser::default();
        let res = parser.parse_expr(&mut lex("1+2*3")).unwrap();
        let target = binary(
            "+",
            Expression::Literal(1.0),
            binary("*", Expression::Literal(2.0), Expression::Literal(3.0)),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn equal_precedence_is_left_associative() {
        let parser = Parser::default();
        let res = parser.parse_expr(&mut lex("1-2-3")).unwrap();
        let target = binary(
            "-",
            binary("-", Expression::Literal(1.0), Expression::Literal(2.0)),
            Expression::Literal(3.0),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn comparison_binds_loosest() {
        let parser = Parser::default();
        let res = parser.parse_expr(&mut lex("x < y + 1")).unwrap();
        let target = binary(
            "<",
            Expression::Variable("x".to_string()),
            binary(
                "+",
                Expression::Variable("y".to_string()),
                Expression::Literal(1.0),
            ),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn parse_call_args() {
        let parser = Parser::default();
        let res = parser.parse_expr(&mut lex("f(1, x + 2)")).unwrap();
        let target = Expression::Call(
            "f".to_string(),
            vec![
                Expression::Literal(1.0),
                binary("+", Expression::Variable("x".to_string()), Expression::Literal(2.0)),
            ],
        );
        assert_eq!(res, target);
    }

    #[test]
    fn parse_definition_works() {
        let parser = Parser::default();
        let res = parser.parse_str("def add(x y) x + y;").unwrap();
        let target = vec![ASTNode::Function(Function {
            prototype: Prototype {
                name: "add".to_string(),
                args: vec!["x".to_string(), "y".to_string()],
            },
            body: binary(
                "+",
                Expression::Variable("x".to_string()),
                Expression::Variable("y".to_string()),
            ),
        })];
        assert_eq!(res, target);
    }

    #[test]
    fn parse_extern_works() {
        let parser = Parser::default();
        let res = parser.parse_str("extern sin(x);").unwrap();
        let target = vec![ASTNode::Extern(Prototype {
            name: "sin".to_string(),
            args: vec!["x".to_string()],
        })];
        assert_eq!(res, target);
    }

    #[test]
    fn bare_expression_becomes_anonymous_function() {
        let parser = Parser::default();
        let res = parser.parse_str("1 + 2").unwrap();
        match &res[..] {
            [ASTNode::Function(func)] => {
                assert!(func.is_anonymous());
                assert_eq!(
                    func.body,
                    binary("+", Expression::Literal(1.0), Expression::Literal(2.0))
                );
            }
            other => panic!("expected a single anonymous function, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let parser = Parser::default();
        let res = parser.parse_str("def f(x x) x;");
        assert_eq!(
            res,
            Err(ParserError::DuplicateParameter("x".to_string()))
        );
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let parser = Parser::default();
        let res = parser.parse_expr(&mut lex("1 / 2"));
        assert_eq!(res, Err(ParserError::UnknownOperator("/".to_string())));
    }

    #[test]
    fn unmatched_paren_leaves_stream_recoverable() {
        let parser = Parser::default();
        let mut tokens = lex("(1+2; 3");

        let res = parser.parse_toplevel_expr(&mut tokens);
        assert_eq!(res, Err(ParserError::UnmatchedParen));

        // skip the offending token and the next unit parses cleanly
        tokens.pop();
        let res = parser.parse_toplevel_expr(&mut tokens).unwrap();
        match res {
            ASTNode::Function(func) => assert_eq!(func.body, Expression::Literal(3.0)),
            other => panic!("expected anonymous function, got {:?}", other),
        }
        assert!(tokens.is_empty());
    }

    #[test]
    fn missing_prototype_paren() {
        let parser = Parser::default();
        let res = parser.parse_str("def f x;");
        assert_eq!(
            res,
            Err(ParserError::ExpectedOpenParen(
                "identifier 'x'".to_string()
            ))
        );
    }
}
