// Formula parser - converts expression strings into AST
// Supports: numbers, cell refs (A1), basic math (+, -, *, /), unary +/-, parens
// The leading '=' is stripped by the cell layer before parsing.

use crate::position::Position;

/// Expression AST for a parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Cell reference. May lie outside the sheet bounds; such references
    /// survive parsing and evaluate to a #REF! error.
    CellRef(Position),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
}

/// Parse an expression (without the leading '=') into an AST.
pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty formula".to_string());
    }
    let (expr, pos) = parse_add_sub(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(format!("unexpected token after expression: {:?}", tokens[pos]));
    }
    Ok(expr)
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    CellRef(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            'A'..='Z' | 'a'..='z' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match Position::parse_a1(&ident) {
                    Some(pos) => tokens.push(Token::CellRef(pos)),
                    None => return Err(format!("invalid cell reference: {}", ident)),
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Exponent suffix, maximal munch: "1e308" is a number, not
                // the number 1 followed by cell E308.
                if matches!(chars.peek(), Some(&'e') | Some(&'E')) {
                    let mut lookahead = chars.clone();
                    let e = lookahead.next().unwrap_or('e');
                    let sign = match lookahead.peek() {
                        Some(&s) if s == '+' || s == '-' => {
                            lookahead.next();
                            Some(s)
                        }
                        _ => None,
                    };
                    if matches!(lookahead.peek(), Some(d) if d.is_ascii_digit()) {
                        num_str.push(e);
                        if let Some(s) = sign {
                            num_str.push(s);
                        }
                        while let Some(&d) = lookahead.peek() {
                            if d.is_ascii_digit() {
                                num_str.push(d);
                                lookahead.next();
                            } else {
                                break;
                            }
                        }
                        chars = lookahead;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Some(UnaryOp::Plus),
            Token::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            let (operand, new_pos) = parse_unary(tokens, pos + 1)?;
            return Ok((
                Expr::Unary {
                    op,
                    operand: Box::new(operand),
                },
                new_pos,
            ));
        }
    }
    parse_primary(tokens, pos)
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::CellRef(p) => Ok((Expr::CellRef(*p), pos + 1)),
        Token::LParen => {
            let (expr, new_pos) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(new_pos) {
                Some(Token::RParen) => Ok((expr, new_pos + 1)),
                _ => Err("expected closing parenthesis".to_string()),
            }
        }
        other => Err(format!("unexpected token: {:?}", other)),
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Format an expression without the leading '='.
///
/// Parentheses are inserted only where precedence or left-associativity
/// requires them, so rendering is canonical and re-parses to the same AST.
pub fn format_expr(expr: &Expr) -> String {
    format_prec(expr, 0)
}

/// Binding strength: additive 1, multiplicative 2, unary 3, atoms 4.
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Number(_) | Expr::CellRef(_) => 4,
        Expr::Unary { .. } => 3,
        Expr::BinaryOp { op: Op::Mul | Op::Div, .. } => 2,
        Expr::BinaryOp { op: Op::Add | Op::Sub, .. } => 1,
    }
}

fn format_prec(expr: &Expr, min_prec: u8) -> String {
    let rendered = match expr {
        Expr::Number(n) => format_number(*n),
        Expr::CellRef(p) => p.to_a1(),
        Expr::Unary { op, operand } => {
            let sign = match op {
                UnaryOp::Plus => '+',
                UnaryOp::Neg => '-',
            };
            format!("{}{}", sign, format_prec(operand, 3))
        }
        Expr::BinaryOp { op, left, right } => {
            let (sym, prec) = match op {
                Op::Add => ('+', 1),
                Op::Sub => ('-', 1),
                Op::Mul => ('*', 2),
                Op::Div => ('/', 2),
            };
            // Left-associative: the right operand needs strictly tighter binding.
            format!(
                "{}{}{}",
                format_prec(left, prec),
                sym,
                format_prec(right, prec + 1)
            )
        }
    };

    if precedence(expr) < min_prec {
        format!("({})", rendered)
    } else {
        rendered
    }
}

/// Canonical decimal: integers without a fractional part, shortest
/// round-trippable form otherwise.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(src: &str) -> String {
        format_expr(&parse(src).unwrap())
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse("3.5").unwrap(), Expr::Number(3.5));
        assert_eq!(parse(".5").unwrap(), Expr::Number(0.5));
    }

    #[test]
    fn test_parse_exponent() {
        assert_eq!(parse("1e3").unwrap(), Expr::Number(1000.0));
        assert_eq!(parse("2E-2").unwrap(), Expr::Number(0.02));
        assert_eq!(parse("1.5e2").unwrap(), Expr::Number(150.0));
        // A bare trailing exponent marker is not a number.
        assert!(parse("1e").is_err());
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse("B12").unwrap(), Expr::CellRef(Position::new(11, 1)));
        assert_eq!(parse("aa1").unwrap(), Expr::CellRef(Position::new(0, 26)));
    }

    #[test]
    fn test_precedence() {
        // 1+2*3 parses as 1+(2*3)
        let expr = parse("1+2*3").unwrap();
        match expr {
            Expr::BinaryOp { op: Op::Add, right, .. } => {
                assert!(matches!(*right, Expr::BinaryOp { op: Op::Mul, .. }));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_left_associativity() {
        // 1-2-3 parses as (1-2)-3
        let expr = parse("1-2-3").unwrap();
        match expr {
            Expr::BinaryOp { op: Op::Sub, left, .. } => {
                assert!(matches!(*left, Expr::BinaryOp { op: Op::Sub, .. }));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("1+").is_err());
        assert!(parse("(1+2").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("foo").is_err());
        assert!(parse("A0").is_err());
        assert!(parse("1.2.3").is_err());
        assert!(parse("#").is_err());
    }

    #[test]
    fn test_render_minimal_parens() {
        assert_eq!(roundtrip("1+2*3"), "1+2*3");
        assert_eq!(roundtrip("(1+2)*3"), "(1+2)*3");
        assert_eq!(roundtrip("1+(2*3)"), "1+2*3");
        assert_eq!(roundtrip("1-(2+3)"), "1-(2+3)");
        assert_eq!(roundtrip("(1-2)+3"), "1-2+3");
        assert_eq!(roundtrip("1/(2/3)"), "1/(2/3)");
        assert_eq!(roundtrip("-(1+2)"), "-(1+2)");
        assert_eq!(roundtrip("-1*2"), "-1*2");
        assert_eq!(roundtrip("( A1 )"), "A1");
    }

    #[test]
    fn test_render_reparses_to_same_ast() {
        for src in ["1+2*3", "(1+2)/(3-4)", "-A1+B2*2", "+1", "2*(B2-0.5)"] {
            let ast = parse(src).unwrap();
            let rendered = format_expr(&ast);
            assert_eq!(parse(&rendered).unwrap(), ast, "source: {}", src);
        }
    }

    #[test]
    fn test_out_of_bounds_ref_parses() {
        let expr = parse("ZZZZ99999+1").unwrap();
        match expr {
            Expr::BinaryOp { left, .. } => match *left {
                Expr::CellRef(p) => assert!(!p.is_valid()),
                other => panic!("unexpected AST: {:?}", other),
            },
            other => panic!("unexpected AST: {:?}", other),
        }
    }
}
